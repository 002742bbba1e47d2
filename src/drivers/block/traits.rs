//! # Camada de Abstração de Dispositivos de Bloco
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          FILESYSTEMS (FAT16, NTFS)                  │
//! └─────────────────────────────────────────────────────┘
//!                          ↓
//! ┌─────────────────────────────────────────────────────┐
//! │              BlockDevice Trait                      │
//! │   read_block() write_block() total_blocks()         │
//! └─────────────────────────────────────────────────────┘
//!                          ↓
//! ┌─────────────────────────────────────────────────────┐
//! │              DRIVERS (ATA PIO, RamDisk)             │
//! └─────────────────────────────────────────────────────┘
//! ```

use core::fmt;

/// Tamanho de setor usado por todos os dispositivos.
pub const SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// Dispositivo ausente ou não inicializado
    NotReady,
    /// Bit ERR/DF do controlador
    DeviceError,
    /// LBA além do fim do dispositivo
    OutOfRange,
    /// BSY/DRQ não mudaram dentro do limite de espera
    Timeout,
    /// Buffer menor que o necessário
    BufferTooSmall,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::NotReady => write!(f, "Dispositivo não pronto"),
            BlockError::DeviceError => write!(f, "Erro do dispositivo"),
            BlockError::OutOfRange => write!(f, "Bloco fora do dispositivo"),
            BlockError::Timeout => write!(f, "Timeout"),
            BlockError::BufferTooSmall => write!(f, "Buffer pequeno demais"),
        }
    }
}

/// Dispositivo de blocos de 512 bytes.
pub trait BlockDevice: Send + Sync {
    /// Lê o bloco `lba` para `buf[..512]`.
    fn read_block(&self, lba: u64, buf: &mut [u8]) -> Result<(), BlockError>;

    /// Escreve `buf[..512]` no bloco `lba`.
    fn write_block(&self, lba: u64, buf: &[u8]) -> Result<(), BlockError>;

    fn total_blocks(&self) -> u64;

    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn flush(&self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Lê `buf.len() / 512` blocos contíguos.
    fn read_blocks(&self, start_lba: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let size = self.block_size();
        for (i, chunk) in buf.chunks_exact_mut(size).enumerate() {
            self.read_block(start_lba + i as u64, chunk)?;
        }
        Ok(())
    }

    fn write_blocks(&self, start_lba: u64, buf: &[u8]) -> Result<(), BlockError> {
        let size = self.block_size();
        for (i, chunk) in buf.chunks_exact(size).enumerate() {
            self.write_block(start_lba + i as u64, chunk)?;
        }
        Ok(())
    }
}

/// Identificação de um dispositivo (para `ata_info` e `/proc/mounts`).
#[derive(Debug, Clone)]
pub struct BlockDeviceInfo {
    pub model: crate::klib::string::FixedName<40>,
    pub total_blocks: u64,
}

impl BlockDeviceInfo {
    pub fn size_mb(&self) -> u64 {
        self.total_blocks * SECTOR_SIZE as u64 / (1024 * 1024)
    }
}
