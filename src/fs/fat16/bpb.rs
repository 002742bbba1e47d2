//! # BIOS Parameter Block (FAT16)
//!
//! | Offset | Tamanho | Descrição                    |
//! |--------|---------|------------------------------|
//! | 0x00   | 3       | Jump                         |
//! | 0x03   | 8       | OEM                          |
//! | 0x0B   | 2       | Bytes por setor (512)        |
//! | 0x0D   | 1       | Setores por cluster          |
//! | 0x0E   | 2       | Setores reservados           |
//! | 0x10   | 1       | Número de FATs (1 ou 2)      |
//! | 0x11   | 2       | Entradas no root             |
//! | 0x13   | 2       | Total de setores (16-bit)    |
//! | 0x15   | 1       | Media descriptor             |
//! | 0x16   | 2       | Setores por FAT              |
//! | 0x20   | 4       | Total de setores (32-bit)    |
//! | 0x26   | 1       | Assinatura estendida (0x29)  |
//! | 0x2B   | 11      | Rótulo do volume             |
//! | 0x36   | 8       | Tipo ("FAT16   ")            |
//! | 0x1FE  | 2       | 0x55AA                       |

use alloc::string::String;

use crate::drivers::block::SECTOR_SIZE;
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_u16, read_u32, read_u8};

use super::dir::ENTRY_SIZE;

/// Menor e maior número de clusters de um volume FAT16.
pub const MIN_CLUSTERS: u32 = 4085;
pub const MAX_CLUSTERS: u32 = 65524;

pub const BOOT_SIGNATURE: u16 = 0xAA55;
pub const EXT_SIGNATURE: u8 = 0x29;

#[derive(Debug, Clone)]
pub struct Bpb {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors: u32,
    pub media: u8,
    pub fat_size: u16,
    /// Rótulo do BPB estendido (vazio se não houver assinatura 0x29)
    pub label: String,
}

impl Bpb {
    pub fn parse(sector: &[u8]) -> FsResult<Self> {
        if sector.len() < SECTOR_SIZE || read_u16(sector, 0x1FE) != BOOT_SIGNATURE {
            return Err(FsError::Corrupt);
        }

        let total16 = read_u16(sector, 0x13);
        let total_sectors = if total16 != 0 {
            total16 as u32
        } else {
            read_u32(sector, 0x20)
        };

        let label = if read_u8(sector, 0x26) == EXT_SIGNATURE {
            trim_label(&sector[0x2B..0x36])
        } else {
            String::new()
        };

        let bpb = Self {
            bytes_per_sector: read_u16(sector, 0x0B),
            sectors_per_cluster: read_u8(sector, 0x0D),
            reserved_sectors: read_u16(sector, 0x0E),
            num_fats: read_u8(sector, 0x10),
            root_entry_count: read_u16(sector, 0x11),
            total_sectors,
            media: read_u8(sector, 0x15),
            fat_size: read_u16(sector, 0x16),
            label,
        };
        bpb.validate()?;
        Ok(bpb)
    }

    fn validate(&self) -> FsResult<()> {
        if self.bytes_per_sector as usize != SECTOR_SIZE {
            return Err(FsError::Unsupported);
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(FsError::Corrupt);
        }
        if !matches!(self.num_fats, 1 | 2) || self.reserved_sectors == 0 {
            return Err(FsError::Corrupt);
        }
        // FAT32 tem root_entry_count 0 e fat_size em 0x24
        if self.root_entry_count == 0 || self.fat_size == 0 {
            return Err(FsError::Unsupported);
        }
        Ok(())
    }
}

/// LBAs derivados do BPB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub fat_start_lba: u64,
    pub fat_size: u64,
    pub num_fats: u8,
    pub root_dir_lba: u64,
    pub root_dir_sectors: u64,
    pub data_start_lba: u64,
    pub sectors_per_cluster: u64,
    pub cluster_size: usize,
    pub total_clusters: u32,
}

impl Layout {
    pub fn from_bpb(bpb: &Bpb) -> FsResult<Self> {
        let fat_start_lba = bpb.reserved_sectors as u64;
        let fat_size = bpb.fat_size as u64;
        let root_dir_lba = fat_start_lba + bpb.num_fats as u64 * fat_size;
        let root_dir_sectors = (bpb.root_entry_count as u64 * ENTRY_SIZE as u64).div_ceil(SECTOR_SIZE as u64);
        let data_start_lba = root_dir_lba + root_dir_sectors;
        let spc = bpb.sectors_per_cluster as u64;

        let total = bpb.total_sectors as u64;
        if data_start_lba >= total {
            return Err(FsError::Corrupt);
        }
        let total_clusters = ((total - data_start_lba) / spc) as u32;
        if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&total_clusters) {
            return Err(FsError::Unsupported);
        }
        // A FAT precisa cobrir todos os clusters (+2 reservados)
        if (total_clusters as u64 + 2) * 2 > fat_size * SECTOR_SIZE as u64 {
            return Err(FsError::Corrupt);
        }

        Ok(Self {
            fat_start_lba,
            fat_size,
            num_fats: bpb.num_fats,
            root_dir_lba,
            root_dir_sectors,
            data_start_lba,
            sectors_per_cluster: spc,
            cluster_size: spc as usize * SECTOR_SIZE,
            total_clusters,
        })
    }

    /// Primeiro setor do cluster `cluster` (>= 2).
    pub fn cluster_lba(&self, cluster: u16) -> u64 {
        self.data_start_lba + (cluster as u64 - 2) * self.sectors_per_cluster
    }

    /// Maior número de cluster válido.
    pub fn max_cluster(&self) -> u32 {
        self.total_clusters + 1
    }

    /// Setor e offset da entrada FAT de `cluster` na cópia `copy`.
    pub fn fat_entry_pos(&self, copy: u8, cluster: u16) -> (u64, usize) {
        let byte = cluster as u64 * 2;
        (
            self.fat_start_lba + copy as u64 * self.fat_size + byte / SECTOR_SIZE as u64,
            (byte % SECTOR_SIZE as u64) as usize,
        )
    }
}

/// Rótulo de 11 bytes sem o preenchimento de espaços.
pub fn trim_label(raw: &[u8]) -> String {
    let text: String = raw.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' }).collect();
    let trimmed = text.trim_end();
    if trimmed == "NO NAME" {
        String::new()
    } else {
        String::from(trimmed)
    }
}
