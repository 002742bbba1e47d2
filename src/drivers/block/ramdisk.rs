//! Disco em memória: volumes de teste e formatação no host.

use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use super::traits::{BlockDevice, BlockError, SECTOR_SIZE};

pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    blocks: u64,
}

impl RamDisk {
    /// Disco zerado de `blocks` setores.
    pub fn new(blocks: u64) -> Self {
        Self {
            data: Mutex::new(vec![0u8; blocks as usize * SECTOR_SIZE]),
            blocks,
        }
    }

    /// Cópia do conteúdo inteiro.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn range(&self, lba: u64, len: usize) -> Result<core::ops::Range<usize>, BlockError> {
        if lba >= self.blocks {
            return Err(BlockError::OutOfRange);
        }
        if len < SECTOR_SIZE {
            return Err(BlockError::BufferTooSmall);
        }
        let start = lba as usize * SECTOR_SIZE;
        Ok(start..start + SECTOR_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, lba: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let range = self.range(lba, buf.len())?;
        buf[..SECTOR_SIZE].copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, lba: u64, buf: &[u8]) -> Result<(), BlockError> {
        let range = self.range(lba, buf.len())?;
        self.data.lock()[range].copy_from_slice(&buf[..SECTOR_SIZE]);
        Ok(())
    }

    fn total_blocks(&self) -> u64 {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_round_trip() {
        let disk = RamDisk::new(8);
        let mut sector = [0u8; 512];
        sector[0] = 0xAA;
        sector[511] = 0x55;
        disk.write_block(3, &sector).unwrap();

        let mut back = [0u8; 512];
        disk.read_block(3, &mut back).unwrap();
        assert_eq!(back, sector);
        disk.read_block(2, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0));
    }

    #[test]
    fn bounds_are_checked() {
        let disk = RamDisk::new(4);
        let mut buf = [0u8; 512];
        assert_eq!(disk.read_block(4, &mut buf), Err(BlockError::OutOfRange));
        assert_eq!(disk.write_block(0, &buf[..100]), Err(BlockError::BufferTooSmall));
    }

    #[test]
    fn multi_block_helpers() {
        let disk = RamDisk::new(4);
        let data: Vec<u8> = (0..1024).map(|i| i as u8).collect();
        disk.write_blocks(1, &data).unwrap();
        let mut back = vec![0u8; 1024];
        disk.read_blocks(1, &mut back).unwrap();
        assert_eq!(back, data);
    }
}
