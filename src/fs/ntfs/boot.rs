//! # Boot sector NTFS
//!
//! | Offset | Tamanho | Descrição                                  |
//! |--------|---------|--------------------------------------------|
//! | 0x03   | 8       | OEM "NTFS    "                             |
//! | 0x0B   | 2       | Bytes por setor                            |
//! | 0x0D   | 1       | Setores por cluster                        |
//! | 0x15   | 1       | Media descriptor                           |
//! | 0x28   | 8       | Total de setores                           |
//! | 0x30   | 8       | LCN do $MFT                                |
//! | 0x38   | 8       | LCN do $MFTMirr                            |
//! | 0x40   | 1       | Clusters por registro MFT (com sinal)      |
//! | 0x44   | 1       | Clusters por registro de índice (com sinal)|
//! | 0x48   | 8       | Número de série                            |
//! | 0x1FE  | 2       | 0x55AA                                     |
//!
//! Tamanhos com sinal: positivo = clusters, negativo = `1 << -v` bytes.

use crate::drivers::block::SECTOR_SIZE;
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_i8, read_u16, read_u64, read_u8, write_u16, write_u32, write_u64, write_u8};

pub const OEM_ID: &[u8; 8] = b"NTFS    ";

/// Limites aceitos pelo motor.
pub const MAX_CLUSTER_SIZE: usize = 65536;
pub const MAX_RECORD_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    pub mftmirr_lcn: u64,
    pub clusters_per_record: i8,
    pub clusters_per_index: i8,
    pub serial: u64,
}

/// Decodifica o campo com sinal de tamanho de registro.
pub fn signed_size(raw: i8, cluster_size: usize) -> usize {
    if raw > 0 {
        raw as usize * cluster_size
    } else {
        1usize << (-(raw as i32)).clamp(0, 31)
    }
}

impl BootSector {
    pub fn parse(sector: &[u8]) -> FsResult<Self> {
        if sector.len() < SECTOR_SIZE || &sector[3..11] != OEM_ID || read_u16(sector, 0x1FE) != 0xAA55 {
            return Err(FsError::Corrupt);
        }
        let boot = Self {
            bytes_per_sector: read_u16(sector, 0x0B),
            sectors_per_cluster: read_u8(sector, 0x0D),
            total_sectors: read_u64(sector, 0x28),
            mft_lcn: read_u64(sector, 0x30),
            mftmirr_lcn: read_u64(sector, 0x38),
            clusters_per_record: read_i8(sector, 0x40),
            clusters_per_index: read_i8(sector, 0x44),
            serial: read_u64(sector, 0x48),
        };
        boot.validate()?;
        Ok(boot)
    }

    fn validate(&self) -> FsResult<()> {
        if self.bytes_per_sector as usize != SECTOR_SIZE {
            return Err(FsError::Unsupported);
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(FsError::Corrupt);
        }
        if self.cluster_size() > MAX_CLUSTER_SIZE {
            return Err(FsError::Unsupported);
        }
        let rs = self.record_size();
        if !(SECTOR_SIZE..=MAX_RECORD_SIZE).contains(&rs) || rs % SECTOR_SIZE != 0 {
            return Err(FsError::Unsupported);
        }
        if self.mft_lcn >= self.total_clusters() {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    pub fn cluster_size(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR_SIZE
    }

    pub fn record_size(&self) -> usize {
        signed_size(self.clusters_per_record, self.cluster_size())
    }

    pub fn index_record_size(&self) -> usize {
        signed_size(self.clusters_per_index, self.cluster_size())
    }

    pub fn total_clusters(&self) -> u64 {
        self.total_sectors / self.sectors_per_cluster as u64
    }

    pub fn encode(&self) -> [u8; SECTOR_SIZE] {
        let mut bs = [0u8; SECTOR_SIZE];
        bs[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        bs[3..11].copy_from_slice(OEM_ID);
        write_u16(&mut bs, 0x0B, self.bytes_per_sector);
        write_u8(&mut bs, 0x0D, self.sectors_per_cluster);
        write_u8(&mut bs, 0x15, 0xF8);
        write_u16(&mut bs, 0x18, 63);
        write_u16(&mut bs, 0x1A, 255);
        write_u32(&mut bs, 0x24, 0x0080_0080);
        write_u64(&mut bs, 0x28, self.total_sectors);
        write_u64(&mut bs, 0x30, self.mft_lcn);
        write_u64(&mut bs, 0x38, self.mftmirr_lcn);
        write_u8(&mut bs, 0x40, self.clusters_per_record as u8);
        write_u8(&mut bs, 0x44, self.clusters_per_index as u8);
        write_u64(&mut bs, 0x48, self.serial);
        write_u16(&mut bs, 0x1FE, 0xAA55);
        bs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BootSector {
        BootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 8,
            total_sectors: 1 << 20,
            mft_lcn: 4,
            mftmirr_lcn: 20,
            clusters_per_record: -10,
            clusters_per_index: 1,
            serial: 0xDEAD_BEEF,
        }
    }

    #[test]
    fn signed_sizes_decode_both_ways() {
        assert_eq!(signed_size(-10, 4096), 1024);
        assert_eq!(signed_size(-12, 512), 4096);
        assert_eq!(signed_size(2, 512), 1024);
    }

    #[test]
    fn parse_reads_back_encoded_fields() {
        let boot = BootSector::parse(&sample().encode()).unwrap();
        assert_eq!(boot, sample());
        assert_eq!(boot.cluster_size(), 4096);
        assert_eq!(boot.record_size(), 1024);
        assert_eq!(boot.index_record_size(), 4096);
    }

    #[test]
    fn rejects_foreign_or_oversized_geometry() {
        let mut raw = sample().encode();
        raw[3] = b'X';
        assert_eq!(BootSector::parse(&raw).unwrap_err(), FsError::Corrupt);

        let mut big = sample();
        big.clusters_per_record = -13;
        assert_eq!(BootSector::parse(&big.encode()).unwrap_err(), FsError::Unsupported);

        let mut odd = sample();
        odd.bytes_per_sector = 4096;
        assert_eq!(BootSector::parse(&odd.encode()).unwrap_err(), FsError::Unsupported);
    }
}
