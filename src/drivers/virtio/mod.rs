//! # VirtIO 1.0 (PCI moderno)
//!
//! Transporte, filas split e os dois dispositivos usados pelo sistema:
//!
//! | Tipo | Dispositivo | Módulo  | Uso                                  |
//! |------|-------------|---------|--------------------------------------|
//! | 16   | GPU         | `gpu`   | scanout 2D + contexto 3D (Virgl)     |
//! | 18   | Input       | `input` | teclado → ring de `kbd_getchar`      |
//!
//! Sem interrupções: as conclusões são lidas por polling (`wait` cede a
//! CPU entre tentativas e desiste após `VIRTIO_WAIT_TICKS`).

pub mod caps;
pub mod dma;
pub mod gpu;
pub mod gpu3d;
pub mod input;
pub mod transport;
pub mod virtqueue;

use bitflags::bitflags;
use spin::Mutex;

use crate::drivers::pci::{self, PciDevice, VENDOR_REDHAT};

pub use transport::VirtioDevice;
pub use virtqueue::{Buffer, UsedElem, Virtqueue};

/// Timeout de `wait`, em ticks (≈500 ms a 100 Hz).
pub const VIRTIO_WAIT_TICKS: u64 = 50;

pub const DEVICE_TYPE_GPU: u16 = 16;
pub const DEVICE_TYPE_INPUT: u16 = 18;

/// Bit de feature VERSION_1 (dispositivo moderno).
pub const F_VERSION_1: u64 = 1 << 32;

bitflags! {
    /// Registrador `device_status`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u8 {
        const ACKNOWLEDGE = 1;
        const DRIVER = 2;
        const DRIVER_OK = 4;
        const FEATURES_OK = 8;
        const NEEDS_RESET = 64;
        const FAILED = 128;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtioError {
    NotFound,
    MissingCapability,
    FeaturesRejected,
    QueueUnavailable,
    QueueFull,
    Timeout,
    /// Resposta do dispositivo na faixa de erro
    DeviceError(u32),
}

impl core::fmt::Display for VirtioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => f.write_str("dispositivo não encontrado"),
            Self::MissingCapability => f.write_str("capability VirtIO ausente"),
            Self::FeaturesRejected => f.write_str("features recusadas"),
            Self::QueueUnavailable => f.write_str("fila indisponível"),
            Self::QueueFull => f.write_str("fila cheia"),
            Self::Timeout => f.write_str("timeout"),
            Self::DeviceError(code) => write!(f, "erro do dispositivo {:#x}", code),
        }
    }
}

/// Features aceitas: interseção com as desejadas, mais VERSION_1 se oferecido.
pub fn negotiate(offered: u64, wanted: u64) -> u64 {
    (offered & wanted) | (offered & F_VERSION_1)
}

/// Aceita o id moderno (0x1040 + tipo) ou o transicional com subsystem igual.
pub fn matches(dev: &PciDevice, device_type: u16) -> bool {
    if dev.vendor_id != VENDOR_REDHAT {
        return false;
    }
    if dev.device_id == 0x1040 + device_type {
        return true;
    }
    (0x1000..=0x103F).contains(&dev.device_id) && dev.subsystem_id == device_type
}

pub fn find(device_type: u16) -> Option<PciDevice> {
    pci::find(|d| matches(d, device_type))
}

pub static GPU: Mutex<Option<gpu::GpuDevice<gpu::ControlQueue>>> = Mutex::new(None);
pub static INPUT: Mutex<Option<input::InputDevice>> = Mutex::new(None);

/// Procura e inicializa GPU e input. Devolve quantos subiram.
pub fn init() -> usize {
    let mut count = 0;

    match find(DEVICE_TYPE_GPU).ok_or(VirtioError::NotFound).and_then(gpu::probe) {
        Ok(dev) => {
            let (w, h) = dev.resolution();
            crate::kinfo!("(VirtIO) GPU pronta, largura=", w);
            crate::kinfo!("(VirtIO) GPU pronta, altura=", h);
            *GPU.lock() = Some(dev);
            count += 1;
        }
        Err(VirtioError::NotFound) => crate::kdebug!("(VirtIO) Sem GPU"),
        Err(e) => crate::kwarn!("(VirtIO) Falha na GPU: ", error_code(e)),
    }

    match find(DEVICE_TYPE_INPUT).ok_or(VirtioError::NotFound).and_then(input::probe) {
        Ok(dev) => {
            *INPUT.lock() = Some(dev);
            crate::kinfo!("(VirtIO) Input pronto");
            count += 1;
        }
        Err(VirtioError::NotFound) => crate::kdebug!("(VirtIO) Sem input"),
        Err(e) => crate::kwarn!("(VirtIO) Falha no input: ", error_code(e)),
    }
    count
}

/// Drena eventos de teclado pendentes.
pub fn poll_input() -> usize {
    match INPUT.lock().as_mut() {
        Some(dev) => dev.drain(),
        None => 0,
    }
}

/// Código numérico para o log serial (sem `core::fmt`).
fn error_code(e: VirtioError) -> u32 {
    match e {
        VirtioError::NotFound => 1,
        VirtioError::MissingCapability => 2,
        VirtioError::FeaturesRejected => 3,
        VirtioError::QueueUnavailable => 4,
        VirtioError::QueueFull => 5,
        VirtioError::Timeout => 6,
        VirtioError::DeviceError(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pci::PciAddress;

    fn device(device_id: u16, subsystem_id: u16) -> PciDevice {
        PciDevice {
            addr: PciAddress::new(0, 3, 0),
            vendor_id: VENDOR_REDHAT,
            device_id,
            class_code: 0x03,
            subclass: 0,
            prog_if: 0,
            header_type: 0,
            subsystem_id,
            bars: [0; 6],
            irq_line: 11,
        }
    }

    #[test]
    fn negotiation_keeps_version_1_only_if_offered() {
        let wanted = 0b11;
        assert_eq!(negotiate(0b10 | F_VERSION_1, wanted), 0b10 | F_VERSION_1);
        assert_eq!(negotiate(0b01, wanted), 0b01);
        assert_eq!(negotiate(0b100, wanted), 0);
    }

    #[test]
    fn modern_and_transitional_ids() {
        assert!(matches(&device(0x1050, 0), DEVICE_TYPE_GPU));
        assert!(!matches(&device(0x1052, 0), DEVICE_TYPE_GPU));
        assert!(matches(&device(0x1012, DEVICE_TYPE_INPUT), DEVICE_TYPE_INPUT));
        assert!(!matches(&device(0x1012, 1), DEVICE_TYPE_INPUT));

        let mut other = device(0x1050, 0);
        other.vendor_id = 0x8086;
        assert!(!matches(&other, DEVICE_TYPE_GPU));
    }
}
