//! Tabela FAT: leitura, escrita espelhada, alocação e cadeias.

use alloc::vec;
use alloc::vec::Vec;

use crate::drivers::block::SECTOR_SIZE;
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_u16, write_u16};

use super::fs::Fat16;

pub const FAT_FREE: u16 = 0x0000;
/// Valores `>= FAT_EOC_MIN` terminam uma cadeia.
pub const FAT_EOC_MIN: u16 = 0xFFF8;
pub const FAT_EOC: u16 = 0xFFFF;

impl Fat16 {
    fn check_cluster(&self, cluster: u16) -> FsResult<()> {
        if cluster < 2 || cluster as u32 > self.layout.max_cluster() {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    /// Entrada FAT de `cluster` (primeira cópia).
    pub(super) fn read_fat(&self, cluster: u16) -> FsResult<u16> {
        let (lba, off) = self.layout.fat_entry_pos(0, cluster);
        let mut sector = [0u8; SECTOR_SIZE];
        self.dev.read_block(lba, &mut sector)?;
        Ok(read_u16(&sector, off))
    }

    /// Grava a entrada em todas as cópias da FAT.
    pub(super) fn write_fat(&self, cluster: u16, value: u16) -> FsResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for copy in 0..self.layout.num_fats {
            let (lba, off) = self.layout.fat_entry_pos(copy, cluster);
            self.dev.read_block(lba, &mut sector)?;
            write_u16(&mut sector, off, value);
            self.dev.write_block(lba, &sector)?;
        }
        Ok(())
    }

    /// Primeiro cluster livre a partir de 2, já marcado como fim de cadeia.
    pub(super) fn alloc_cluster(&self) -> FsResult<u16> {
        let max = self.layout.max_cluster();
        let per_sector = (SECTOR_SIZE / 2) as u32;
        let mut sector = [0u8; SECTOR_SIZE];

        let mut cluster: u32 = 2;
        while cluster <= max {
            let (lba, _) = self.layout.fat_entry_pos(0, cluster as u16);
            self.dev.read_block(lba, &mut sector)?;
            let last_in_sector = (cluster / per_sector + 1) * per_sector;
            while cluster < last_in_sector && cluster <= max {
                let off = (cluster % per_sector) as usize * 2;
                if read_u16(&sector, off) == FAT_FREE {
                    self.write_fat(cluster as u16, FAT_EOC)?;
                    return Ok(cluster as u16);
                }
                cluster += 1;
            }
        }
        Err(FsError::NoSpace)
    }

    /// Aloca `count` clusters encadeados. Em falha libera o que já alocou.
    pub(super) fn alloc_chain(&self, count: usize) -> FsResult<Vec<u16>> {
        let mut chain: Vec<u16> = Vec::with_capacity(count);
        for _ in 0..count {
            let result = self.alloc_cluster().and_then(|next| {
                if let Some(&prev) = chain.last() {
                    self.write_fat(prev, next)?;
                }
                Ok(next)
            });
            match result {
                Ok(next) => chain.push(next),
                Err(e) => {
                    if let Some(&first) = chain.first() {
                        let _ = self.free_chain(first);
                    }
                    return Err(e);
                }
            }
        }
        Ok(chain)
    }

    /// Zera todas as entradas da cadeia. Devolve quantos clusters liberou.
    pub(super) fn free_chain(&self, start: u16) -> FsResult<usize> {
        self.check_cluster(start)?;
        let mut cluster = start;
        let mut freed = 0;
        loop {
            let next = self.read_fat(cluster)?;
            self.write_fat(cluster, FAT_FREE)?;
            freed += 1;
            if next >= FAT_EOC_MIN || next < 2 {
                break;
            }
            if freed > self.layout.total_clusters as usize || next as u32 > self.layout.max_cluster() {
                return Err(FsError::Corrupt);
            }
            cluster = next;
        }
        Ok(freed)
    }

    /// Cadeia a partir de `start`. Termina em `>= 0xFFF8` em no máximo
    /// `total_clusters` passos; qualquer outra coisa é `Corrupt`.
    pub(super) fn chain(&self, start: u16) -> FsResult<Vec<u16>> {
        self.check_cluster(start)?;
        let mut out = vec![start];
        let mut cluster = start;
        loop {
            let next = self.read_fat(cluster)?;
            if next >= FAT_EOC_MIN {
                return Ok(out);
            }
            self.check_cluster(next)?;
            if out.len() >= self.layout.total_clusters as usize {
                return Err(FsError::Corrupt);
            }
            out.push(next);
            cluster = next;
        }
    }

    pub(super) fn zero_cluster(&self, cluster: u16) -> FsResult<()> {
        let zero = [0u8; SECTOR_SIZE];
        let lba = self.layout.cluster_lba(cluster);
        for s in 0..self.layout.sectors_per_cluster {
            self.dev.write_block(lba + s, &zero)?;
        }
        Ok(())
    }

    /// Clusters com entrada zero.
    pub fn free_clusters(&self) -> FsResult<u32> {
        let mut free = 0;
        let mut sector = [0u8; SECTOR_SIZE];
        let max = self.layout.max_cluster();
        let per_sector = (SECTOR_SIZE / 2) as u32;
        for s in 0..self.layout.fat_size {
            self.dev.read_block(self.layout.fat_start_lba + s, &mut sector)?;
            for i in 0..per_sector {
                let cluster = s as u32 * per_sector + i;
                if (2..=max).contains(&cluster) && read_u16(&sector, i as usize * 2) == FAT_FREE {
                    free += 1;
                }
            }
        }
        Ok(free)
    }
}
