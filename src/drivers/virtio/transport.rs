//! # Transporte VirtIO PCI moderno
//!
//! Registradores do `common_cfg` (offsets):
//!
//! | Offset | Campo                  | Offset | Campo              |
//! |--------|------------------------|--------|--------------------|
//! | 0x00   | device_feature_select  | 0x16   | queue_select       |
//! | 0x04   | device_feature         | 0x18   | queue_size         |
//! | 0x08   | driver_feature_select  | 0x1A   | queue_msix_vector  |
//! | 0x0C   | driver_feature         | 0x1C   | queue_enable       |
//! | 0x10   | msix_config            | 0x1E   | queue_notify_off   |
//! | 0x12   | num_queues             | 0x20   | queue_desc         |
//! | 0x14   | device_status          | 0x28   | queue_driver       |
//! | 0x15   | config_generation      | 0x30   | queue_device       |

use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use volatile::VolatilePtr;

use super::caps::{self, CapRegion, VirtioCaps};
use super::virtqueue::{choose_size, Buffer, UsedElem, Virtqueue};
use super::{negotiate, DeviceStatus, VirtioError, VIRTIO_WAIT_TICKS};
use crate::drivers::pci::{PciDevice, PortConfig};
use crate::drivers::timer;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{GPU_MMIO_BASE, GPU_MMIO_END, PAGE_SIZE, TEMP_PD_VA};
use crate::mm::vmm::{self, PageFlags};

const DEVICE_FEATURE_SELECT: usize = 0x00;
const DEVICE_FEATURE: usize = 0x04;
const DRIVER_FEATURE_SELECT: usize = 0x08;
const DRIVER_FEATURE: usize = 0x0C;
const MSIX_CONFIG: usize = 0x10;
const NUM_QUEUES: usize = 0x12;
const DEVICE_STATUS: usize = 0x14;
const QUEUE_SELECT: usize = 0x16;
const QUEUE_SIZE: usize = 0x18;
const QUEUE_MSIX_VECTOR: usize = 0x1A;
const QUEUE_ENABLE: usize = 0x1C;
const QUEUE_NOTIFY_OFF: usize = 0x1E;
const QUEUE_DESC: usize = 0x20;
const QUEUE_DRIVER: usize = 0x28;
const QUEUE_DEVICE: usize = 0x30;

/// Vetor MSI-X "nenhum".
const NO_VECTOR: u16 = 0xFFFF;

/// Próximo endereço livre da janela de MMIO.
static NEXT_MMIO_VA: AtomicU32 = AtomicU32::new(GPU_MMIO_BASE);

/// Janela de registradores mapeada no kernel.
#[derive(Clone, Copy)]
pub struct Mmio {
    base: NonNull<u8>,
}

// SAFETY: registradores de hardware; o acesso é serializado pelo dono
unsafe impl Send for Mmio {}

impl Mmio {
    /// # Safety
    /// `base` precisa apontar para uma janela MMIO mapeada.
    pub unsafe fn new(base: NonNull<u8>) -> Self {
        Self { base }
    }

    fn ptr<T: Copy>(&self, offset: usize) -> VolatilePtr<'_, T> {
        // SAFETY: offset dentro da janela mapeada (garantido pelos chamadores)
        unsafe { VolatilePtr::new(NonNull::new_unchecked(self.base.as_ptr().add(offset) as *mut T)) }
    }

    pub fn read<T: Copy>(&self, offset: usize) -> T {
        self.ptr::<T>(offset).read()
    }

    pub fn write<T: Copy>(&self, offset: usize, value: T) {
        self.ptr::<T>(offset).write(value)
    }

    /// Campo de 64 bits como duas metades (baixa primeiro).
    pub fn write_u64(&self, offset: usize, value: u64) {
        self.write::<u32>(offset, value as u32);
        self.write::<u32>(offset + 4, (value >> 32) as u32);
    }

    pub fn addr(&self) -> usize {
        self.base.as_ptr() as usize
    }
}

/// Mapeia `region` do BAR na janela MMIO (cache desligado).
fn map_region(dev: &PciDevice, region: CapRegion) -> Result<Mmio, VirtioError> {
    let bar_phys = dev
        .memory_bar(region.bar as usize)
        .ok_or(VirtioError::MissingCapability)?;
    let phys = bar_phys + region.offset;
    let page = phys & !(PAGE_SIZE as u32 - 1);
    let span = ((phys - page) as usize + region.length.max(1) as usize + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);

    let va = NEXT_MMIO_VA.fetch_add(span as u32, Ordering::SeqCst);
    // a última página da janela é das janelas temporárias do VMM
    if va as u64 + span as u64 > TEMP_PD_VA.min(GPU_MMIO_END) as u64 {
        return Err(VirtioError::QueueUnavailable);
    }
    vmm::map_range(
        VirtAddr::new(va),
        PhysAddr::new(page),
        span,
        PageFlags::WRITABLE | PageFlags::CACHE_DISABLE,
    )
    .map_err(|_| VirtioError::QueueUnavailable)?;

    let base = (va + (phys - page)) as usize as *mut u8;
    // SAFETY: recém mapeado, `span` bytes válidos a partir de `va`
    Ok(unsafe { Mmio::new(NonNull::new(base).ok_or(VirtioError::QueueUnavailable)?) })
}

struct QueueSlot {
    vq: Virtqueue,
    notify_off: u16,
}

/// Dispositivo VirtIO moderno já negociado.
pub struct VirtioDevice {
    pub pci: PciDevice,
    common: Mmio,
    notify: Mmio,
    notify_multiplier: u32,
    device_cfg: Option<Mmio>,
    queues: Vec<Option<QueueSlot>>,
    features: u64,
}

impl VirtioDevice {
    /// Capability walk, mapeamento dos BARs e negociação até FEATURES_OK.
    pub fn init(pci: PciDevice, wanted: u64) -> Result<Self, VirtioError> {
        pci.enable_bus_master(&PortConfig);
        let VirtioCaps {
            common,
            notify,
            notify_off_multiplier,
            isr,
            device,
        } = caps::parse(&PortConfig, &pci)?;
        if isr.is_none() {
            crate::kdebug!("(VirtIO) Sem capability ISR, usando polling");
        }

        let common = map_region(&pci, common)?;
        let notify = map_region(&pci, notify)?;
        let device_cfg = match device {
            Some(region) => Some(map_region(&pci, region)?),
            None => None,
        };

        let mut dev = Self {
            pci,
            common,
            notify,
            notify_multiplier: notify_off_multiplier,
            device_cfg,
            queues: Vec::new(),
            features: 0,
        };

        dev.set_status(DeviceStatus::empty());
        dev.set_status(DeviceStatus::ACKNOWLEDGE);
        dev.set_status(DeviceStatus::ACKNOWLEDGE | DeviceStatus::DRIVER);

        let offered = dev.device_features();
        let accepted = negotiate(offered, wanted);
        dev.common.write::<u32>(DRIVER_FEATURE_SELECT, 0);
        dev.common.write::<u32>(DRIVER_FEATURE, accepted as u32);
        dev.common.write::<u32>(DRIVER_FEATURE_SELECT, 1);
        dev.common.write::<u32>(DRIVER_FEATURE, (accepted >> 32) as u32);
        dev.features = accepted;

        let status = DeviceStatus::ACKNOWLEDGE | DeviceStatus::DRIVER | DeviceStatus::FEATURES_OK;
        dev.set_status(status);
        if !dev.status().contains(DeviceStatus::FEATURES_OK) {
            dev.set_status(DeviceStatus::FAILED);
            return Err(VirtioError::FeaturesRejected);
        }

        dev.common.write::<u16>(MSIX_CONFIG, NO_VECTOR);
        let count = dev.common.read::<u16>(NUM_QUEUES) as usize;
        dev.queues = (0..count).map(|_| None).collect();
        crate::kdebug!("(VirtIO) Filas oferecidas=", count);
        Ok(dev)
    }

    fn status(&self) -> DeviceStatus {
        DeviceStatus::from_bits_truncate(self.common.read::<u8>(DEVICE_STATUS))
    }

    fn set_status(&self, status: DeviceStatus) {
        self.common.write::<u8>(DEVICE_STATUS, status.bits());
    }

    fn device_features(&self) -> u64 {
        self.common.write::<u32>(DEVICE_FEATURE_SELECT, 0);
        let low = self.common.read::<u32>(DEVICE_FEATURE) as u64;
        self.common.write::<u32>(DEVICE_FEATURE_SELECT, 1);
        let high = self.common.read::<u32>(DEVICE_FEATURE) as u64;
        (high << 32) | low
    }

    pub fn features(&self) -> u64 {
        self.features
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Janela de configuração específica do dispositivo.
    pub fn device_config(&self) -> Option<Mmio> {
        self.device_cfg
    }

    /// Cria e programa a fila `index`.
    pub fn setup_queue(&mut self, index: u16) -> Result<u16, VirtioError> {
        if index as usize >= self.queues.len() {
            return Err(VirtioError::QueueUnavailable);
        }
        self.common.write::<u16>(QUEUE_SELECT, index);
        let max = self.common.read::<u16>(QUEUE_SIZE);
        let size = choose_size(max).ok_or(VirtioError::QueueUnavailable)?;
        let vq = Virtqueue::new(size)?;

        self.common.write::<u16>(QUEUE_SIZE, size);
        self.common.write_u64(QUEUE_DESC, vq.desc_phys());
        self.common.write_u64(QUEUE_DRIVER, vq.avail_phys());
        self.common.write_u64(QUEUE_DEVICE, vq.used_phys());
        self.common.write::<u16>(QUEUE_MSIX_VECTOR, NO_VECTOR);
        let notify_off = self.common.read::<u16>(QUEUE_NOTIFY_OFF);
        self.common.write::<u16>(QUEUE_ENABLE, 1);

        self.queues[index as usize] = Some(QueueSlot { vq, notify_off });
        crate::kdebug!("(VirtIO) Fila pronta, tamanho=", size);
        Ok(size)
    }

    /// Fim da inicialização: o dispositivo passa a processar as filas.
    pub fn driver_ok(&self) {
        self.set_status(
            DeviceStatus::ACKNOWLEDGE | DeviceStatus::DRIVER | DeviceStatus::FEATURES_OK | DeviceStatus::DRIVER_OK,
        );
    }

    fn slot(&mut self, queue: u16) -> Result<&mut QueueSlot, VirtioError> {
        self.queues
            .get_mut(queue as usize)
            .and_then(Option::as_mut)
            .ok_or(VirtioError::QueueUnavailable)
    }

    pub fn submit(&mut self, queue: u16, buffers: &[Buffer]) -> Result<u16, VirtioError> {
        self.slot(queue)?.vq.submit(buffers)
    }

    pub fn send(&mut self, queue: u16, out: Buffer, input: Option<Buffer>) -> Result<u16, VirtioError> {
        self.slot(queue)?.vq.send(out, input)
    }

    /// Escreve o índice da fila em `notify_base + off * multiplier`.
    pub fn notify(&mut self, queue: u16) -> Result<(), VirtioError> {
        let off = self.slot(queue)?.notify_off as usize * self.notify_multiplier as usize;
        self.notify.write::<u16>(off, queue);
        Ok(())
    }

    pub fn poll(&mut self, queue: u16) -> Option<UsedElem> {
        self.slot(queue).ok()?.vq.poll()
    }

    /// Espera uma conclusão cedendo a CPU entre tentativas.
    pub fn wait(&mut self, queue: u16) -> Result<UsedElem, VirtioError> {
        let deadline = timer::ticks() + VIRTIO_WAIT_TICKS;
        loop {
            if let Some(used) = self.poll(queue) {
                return Ok(used);
            }
            if timer::ticks() >= deadline {
                crate::kwarn!("(VirtIO) Timeout na fila ", queue);
                return Err(VirtioError::Timeout);
            }
            crate::sched::task_yield();
        }
    }
}
