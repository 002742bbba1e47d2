//! # Dispositivos de Bloco
//!
//! | Driver   | Descrição                                 |
//! |----------|-------------------------------------------|
//! | ATA PIO  | drives 0 (0x1F0) e 1 (0x170), LBA28       |
//! | RamDisk  | volumes em memória (testes, formatação)   |
//!
//! Os drives ATA ficam numa tabela fixa indexada pelo número usado nas
//! syscalls `ata_*` e no VFS (`/disk` = 0, `/disk2` = 1).

pub mod ata;
pub mod ramdisk;
pub mod traits;

pub use ramdisk::RamDisk;
pub use traits::{BlockDevice, BlockDeviceInfo, BlockError, SECTOR_SIZE};

use alloc::sync::Arc;

use spin::Mutex;

use ata::AtaDrive;

pub const MAX_DRIVES: usize = 2;

static DRIVES: Mutex<[Option<Arc<AtaDrive>>; MAX_DRIVES]> = Mutex::new([None, None]);

/// Sonda os dois barramentos ATA.
pub fn init() -> usize {
    let mut drives = DRIVES.lock();
    let mut found = 0;
    for (n, slot) in drives.iter_mut().enumerate() {
        *slot = ata::probe_drive(n);
        if slot.is_some() {
            found += 1;
        }
    }
    crate::kinfo!("(Block) Drives ATA detectados=", found);
    found
}

/// Drive `n` como dispositivo de bloco.
pub fn drive(n: usize) -> Option<Arc<dyn BlockDevice>> {
    let drive = DRIVES.lock().get(n)?.clone()?;
    Some(drive as Arc<dyn BlockDevice>)
}

pub fn drive_info(n: usize) -> Option<BlockDeviceInfo> {
    DRIVES.lock().get(n)?.as_ref().map(|d| d.info())
}

/// Leitura crua de setores (syscall `ata_read` e servidor ATA).
pub fn read_sectors(n: usize, lba: u64, buf: &mut [u8]) -> Result<(), BlockError> {
    drive(n).ok_or(BlockError::NotReady)?.read_blocks(lba, buf)
}

pub fn write_sectors(n: usize, lba: u64, buf: &[u8]) -> Result<(), BlockError> {
    drive(n).ok_or(BlockError::NotReady)?.write_blocks(lba, buf)
}
