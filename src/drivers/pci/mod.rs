//! # Barramento PCI
//!
//! Enumeração pelo mecanismo de configuração #1 e acesso às capabilities.
//!
//! ## Offsets do Espaço de Configuração (header tipo 0)
//!
//! | Offset | Tamanho | Descrição           |
//! |--------|---------|---------------------|
//! | 0x00   | 2       | Vendor ID           |
//! | 0x02   | 2       | Device ID           |
//! | 0x04   | 2       | Command             |
//! | 0x06   | 2       | Status              |
//! | 0x09   | 3       | Class Code          |
//! | 0x0E   | 1       | Header Type         |
//! | 0x10   | 24      | BAR0..BAR5          |
//! | 0x2E   | 2       | Subsystem ID        |
//! | 0x34   | 1       | Capabilities Ptr    |
//! | 0x3C   | 1       | Interrupt Line      |

pub mod config;

use alloc::vec::Vec;

pub use config::{ConfigAccess, PciAddress, PortConfig};

use crate::sync::Spinlock;

const VENDOR_INVALID: u16 = 0xFFFF;

/// Vendor ID da Red Hat (VirtIO)
pub const VENDOR_REDHAT: u16 = 0x1AF4;
pub const VENDOR_REALTEK: u16 = 0x10EC;
pub const DEVICE_RTL8139: u16 = 0x8139;

const REG_COMMAND: u8 = 0x04;
const REG_STATUS: u8 = 0x06;
const REG_BAR0: u8 = 0x10;
const REG_SUBSYSTEM_ID: u8 = 0x2E;
const REG_CAP_PTR: u8 = 0x34;
const REG_INTERRUPT_LINE: u8 = 0x3C;

const CMD_IO_SPACE: u16 = 1 << 0;
const CMD_MEMORY_SPACE: u16 = 1 << 1;
const CMD_BUS_MASTER: u16 = 1 << 2;
const STATUS_CAP_LIST: u16 = 1 << 4;

#[derive(Debug, Clone)]
pub struct PciDevice {
    pub addr: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub header_type: u8,
    pub subsystem_id: u16,
    pub bars: [u32; 6],
    pub irq_line: u8,
}

/// Uma entrada da lista de capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Offset da capability no espaço de configuração
    pub offset: u8,
    pub id: u8,
}

impl PciDevice {
    /// Lê o header; `None` se a função não existe.
    pub fn probe<C: ConfigAccess>(cfg: &C, addr: PciAddress) -> Option<Self> {
        let vendor_id = cfg.read16(addr, 0x00);
        if vendor_id == VENDOR_INVALID {
            return None;
        }

        let mut bars = [0u32; 6];
        for (i, bar) in bars.iter_mut().enumerate() {
            *bar = cfg.read32(addr, REG_BAR0 + (i as u8) * 4);
        }

        Some(Self {
            addr,
            vendor_id,
            device_id: cfg.read16(addr, 0x02),
            prog_if: cfg.read8(addr, 0x09),
            subclass: cfg.read8(addr, 0x0A),
            class_code: cfg.read8(addr, 0x0B),
            header_type: cfg.read8(addr, 0x0E),
            subsystem_id: cfg.read16(addr, REG_SUBSYSTEM_ID),
            bars,
            irq_line: cfg.read8(addr, REG_INTERRUPT_LINE),
        })
    }

    pub fn is_multifunction(&self) -> bool {
        self.header_type & 0x80 != 0
    }

    /// Bus master + memory space (+ I/O space, inofensivo para MMIO puro).
    pub fn enable_bus_master<C: ConfigAccess>(&self, cfg: &C) {
        let command = cfg.read16(self.addr, REG_COMMAND);
        cfg.write16(
            self.addr,
            REG_COMMAND,
            command | CMD_BUS_MASTER | CMD_MEMORY_SPACE | CMD_IO_SPACE,
        );
    }

    /// Endereço físico de um BAR de memória (64-bit só se a parte alta for 0).
    pub fn memory_bar(&self, bar: usize) -> Option<u32> {
        let value = *self.bars.get(bar)?;
        if value & 1 != 0 {
            return None;
        }
        match (value >> 1) & 0x3 {
            0 => Some(value & 0xFFFF_FFF0),
            2 => match self.bars.get(bar + 1) {
                Some(0) => Some(value & 0xFFFF_FFF0),
                _ => None,
            },
            _ => None,
        }
    }

    /// Base de um BAR de I/O.
    pub fn io_bar(&self, bar: usize) -> Option<u16> {
        let value = *self.bars.get(bar)?;
        if value & 1 == 1 {
            Some((value & 0xFFFC) as u16)
        } else {
            None
        }
    }

    /// Lista de capabilities, seguindo os ponteiros `next`.
    pub fn capabilities<C: ConfigAccess>(&self, cfg: &C) -> Vec<Capability> {
        let mut caps = Vec::new();
        if cfg.read16(self.addr, REG_STATUS) & STATUS_CAP_LIST == 0 {
            return caps;
        }
        let mut offset = cfg.read8(self.addr, REG_CAP_PTR) & 0xFC;
        // no máximo 48 capabilities cabem em 192 bytes
        while offset >= 0x40 && caps.len() < 48 {
            let id = cfg.read8(self.addr, offset);
            caps.push(Capability { offset, id });
            offset = cfg.read8(self.addr, offset + 1) & 0xFC;
        }
        caps
    }
}

static PCI_DEVICES: Spinlock<Vec<PciDevice>> = Spinlock::new(Vec::new());

/// Percorre todos os barramentos com `cfg`.
pub fn enumerate<C: ConfigAccess>(cfg: &C) -> Vec<PciDevice> {
    let mut found = Vec::new();
    for bus in 0..=255u8 {
        for device in 0..32u8 {
            let Some(dev) = PciDevice::probe(cfg, PciAddress::new(bus, device, 0)) else {
                continue;
            };
            let multi = dev.is_multifunction();
            found.push(dev);
            if multi {
                for function in 1..8u8 {
                    if let Some(dev) = PciDevice::probe(cfg, PciAddress::new(bus, device, function)) {
                        found.push(dev);
                    }
                }
            }
        }
        // barramento 0 vazio: não há ponte para outros
        if bus == 0 && found.is_empty() {
            break;
        }
    }
    found
}

/// Escaneia o barramento real e guarda a lista.
pub fn scan() -> usize {
    let devices = enumerate(&PortConfig);
    for dev in &devices {
        crate::kdebug!("(PCI) Vendor=", dev.vendor_id);
        crate::kdebug!("(PCI)   Device=", dev.device_id);
    }
    let count = devices.len();
    *PCI_DEVICES.lock() = devices;
    crate::kinfo!("(PCI) Dispositivos encontrados=", count);
    count
}

pub fn find_device(vendor_id: u16, device_id: u16) -> Option<PciDevice> {
    PCI_DEVICES
        .lock()
        .iter()
        .find(|d| d.vendor_id == vendor_id && d.device_id == device_id)
        .cloned()
}

/// Primeiro dispositivo que satisfaz `pred`.
pub fn find(pred: impl Fn(&PciDevice) -> bool) -> Option<PciDevice> {
    PCI_DEVICES.lock().iter().find(|d| pred(d)).cloned()
}

pub fn all_devices() -> Vec<PciDevice> {
    PCI_DEVICES.lock().clone()
}

#[cfg(test)]
mod tests {
    use super::config::fake::FakeConfig;
    use super::*;

    fn virtio_gpu(cfg: &FakeConfig, addr: PciAddress) {
        cfg.set(addr, 0x00, 0x1050_1AF4);
        cfg.set(addr, 0x04, (STATUS_CAP_LIST as u32) << 16);
        cfg.set(addr, 0x08, 0x0380_0001);
        cfg.set(addr, 0x10, 0xFEB0_0000);
        cfg.set(addr, 0x20, 0xFE00_000C);
        cfg.set(addr, 0x24, 0);
        cfg.set(addr, 0x2C, 0x0010_1AF4);
        cfg.set(addr, 0x34, 0x98);
        cfg.set(addr, 0x3C, 0x0000_010B);
        // cadeia 0x98 -> 0x84 -> 0x70 -> fim
        cfg.set(addr, 0x98, 0x0000_8409);
        cfg.set(addr, 0x84, 0x0000_7009);
        cfg.set(addr, 0x70, 0x0000_0011);
    }

    #[test]
    fn probe_reads_header_fields() {
        let cfg = FakeConfig::default();
        let addr = PciAddress::new(0, 2, 0);
        virtio_gpu(&cfg, addr);
        let dev = PciDevice::probe(&cfg, addr).unwrap();
        assert_eq!(dev.vendor_id, VENDOR_REDHAT);
        assert_eq!(dev.device_id, 0x1050);
        assert_eq!(dev.class_code, 0x03);
        assert_eq!(dev.subclass, 0x80);
        assert_eq!(dev.subsystem_id, 0x0010);
        assert_eq!(dev.irq_line, 11);
        assert_eq!(dev.memory_bar(0), Some(0xFEB0_0000));
        // BAR4 de 64 bits com parte alta zero
        assert_eq!(dev.memory_bar(4), Some(0xFE00_0000));
        assert_eq!(dev.io_bar(0), None);
    }

    #[test]
    fn capability_walk_follows_next_pointers() {
        let cfg = FakeConfig::default();
        let addr = PciAddress::new(0, 2, 0);
        virtio_gpu(&cfg, addr);
        let dev = PciDevice::probe(&cfg, addr).unwrap();
        let caps = dev.capabilities(&cfg);
        assert_eq!(
            caps,
            vec![
                Capability { offset: 0x98, id: 0x09 },
                Capability { offset: 0x84, id: 0x09 },
                Capability { offset: 0x70, id: 0x11 },
            ]
        );
    }

    #[test]
    fn enumerate_finds_devices_and_functions() {
        let cfg = FakeConfig::default();
        virtio_gpu(&cfg, PciAddress::new(0, 2, 0));
        let host = PciAddress::new(0, 0, 0);
        cfg.set(host, 0x00, 0x1237_8086);
        cfg.set(host, 0x0C, 0x0080_0000);
        cfg.set(PciAddress::new(0, 0, 3), 0x00, 0x7000_8086);

        let devices = enumerate(&cfg);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].addr, host);
        assert_eq!(devices[1].addr, PciAddress::new(0, 0, 3));
        assert_eq!(devices[2].device_id, 0x1050);
    }

    #[test]
    fn bus_master_sets_command_bits() {
        let cfg = FakeConfig::default();
        let addr = PciAddress::new(0, 2, 0);
        virtio_gpu(&cfg, addr);
        let dev = PciDevice::probe(&cfg, addr).unwrap();
        dev.enable_bus_master(&cfg);
        let command = cfg.read16(addr, REG_COMMAND);
        assert_eq!(command & 0x7, 0x7);
        // status preservado
        assert_eq!(cfg.read16(addr, REG_STATUS), STATUS_CAP_LIST);
    }
}
