//! Formatação FAT16.
//!
//! Tamanho de cluster por faixa de tamanho do volume, tamanho da FAT por
//! ponto fixo e checagem final da contagem de clusters.

use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{write_u16, write_u32, write_u8};

use super::bpb::{BOOT_SIGNATURE, EXT_SIGNATURE, MAX_CLUSTERS, MIN_CLUSTERS};
use super::dir::{FileAttr, ShortEntry, ENTRY_SIZE};

/// Volumes menores que isso são recusados.
pub const MIN_FORMAT_SECTORS: u32 = 4096;

pub const MEDIA_FIXED: u8 = 0xF8;

const RESERVED_SECTORS: u32 = 1;
const NUM_FATS: u32 = 2;
const ROOT_ENTRIES: u32 = 512;

/// (limite em setores, setores por cluster)
const CLUSTER_STAIRCASE: [(u32, u8); 7] = [
    (16 * 1024, 1),        // até 8 MiB
    (64 * 1024, 2),        // até 32 MiB
    (256 * 1024, 4),       // até 128 MiB
    (512 * 1024, 8),       // até 256 MiB
    (1024 * 1024, 16),     // até 512 MiB
    (2 * 1024 * 1024, 32), // até 1 GiB
    (4 * 1024 * 1024, 64), // até 2 GiB
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPlan {
    pub total_sectors: u32,
    pub sectors_per_cluster: u8,
    pub fat_size: u32,
    pub root_dir_sectors: u32,
    pub total_clusters: u32,
}

pub fn plan(total_sectors: u32) -> FsResult<FormatPlan> {
    if total_sectors < MIN_FORMAT_SECTORS {
        return Err(FsError::Unsupported);
    }
    let spc = CLUSTER_STAIRCASE
        .iter()
        .find(|(limit, _)| total_sectors <= *limit)
        .map(|(_, spc)| *spc)
        .ok_or(FsError::TooLarge)?;

    let root_dir_sectors = (ROOT_ENTRIES * ENTRY_SIZE as u32).div_ceil(SECTOR_SIZE as u32);
    let clusters_for = |fat_size: u32| {
        total_sectors.saturating_sub(RESERVED_SECTORS + NUM_FATS * fat_size + root_dir_sectors) / spc as u32
    };

    // Mais FAT => menos dados => menos clusters: converge em poucas voltas.
    let mut fat_size = 1;
    for _ in 0..32 {
        let needed = ((clusters_for(fat_size) + 2) * 2).div_ceil(SECTOR_SIZE as u32);
        if needed <= fat_size {
            break;
        }
        fat_size = needed;
    }

    let total_clusters = clusters_for(fat_size);
    if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&total_clusters) || fat_size > u16::MAX as u32 {
        return Err(FsError::Unsupported);
    }

    Ok(FormatPlan {
        total_sectors,
        sectors_per_cluster: spc,
        fat_size,
        root_dir_sectors,
        total_clusters,
    })
}

/// Rótulo em maiúsculas, até 11 bytes ASCII.
fn label_field(label: &str) -> FsResult<[u8; 11]> {
    if label.len() > 11 || !label.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(FsError::InvalidName);
    }
    let mut field = [b' '; 11];
    for (slot, b) in field.iter_mut().zip(label.bytes()) {
        *slot = b.to_ascii_uppercase();
    }
    Ok(field)
}

fn boot_sector(plan: &FormatPlan, label: &[u8; 11], serial: u32) -> [u8; SECTOR_SIZE] {
    let mut bs = [0u8; SECTOR_SIZE];
    bs[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    bs[3..11].copy_from_slice(b"BASALT  ");
    write_u16(&mut bs, 0x0B, SECTOR_SIZE as u16);
    write_u8(&mut bs, 0x0D, plan.sectors_per_cluster);
    write_u16(&mut bs, 0x0E, RESERVED_SECTORS as u16);
    write_u8(&mut bs, 0x10, NUM_FATS as u8);
    write_u16(&mut bs, 0x11, ROOT_ENTRIES as u16);
    if plan.total_sectors <= u16::MAX as u32 {
        write_u16(&mut bs, 0x13, plan.total_sectors as u16);
    } else {
        write_u32(&mut bs, 0x20, plan.total_sectors);
    }
    write_u8(&mut bs, 0x15, MEDIA_FIXED);
    write_u16(&mut bs, 0x16, plan.fat_size as u16);
    write_u16(&mut bs, 0x18, 32); // setores por trilha
    write_u16(&mut bs, 0x1A, 64); // cabeças
    write_u8(&mut bs, 0x24, 0x80);
    write_u8(&mut bs, 0x26, EXT_SIGNATURE);
    write_u32(&mut bs, 0x27, serial);
    bs[0x2B..0x36].copy_from_slice(label);
    bs[0x36..0x3E].copy_from_slice(b"FAT16   ");
    write_u16(&mut bs, 0x1FE, BOOT_SIGNATURE);
    bs
}

/// Formata os primeiros `total_sectors` setores de `dev`.
pub fn format(dev: &dyn BlockDevice, total_sectors: u32, label: Option<&str>) -> FsResult<FormatPlan> {
    if total_sectors as u64 > dev.total_blocks() {
        return Err(FsError::TooLarge);
    }
    let plan = plan(total_sectors)?;
    let label_bytes = match label {
        Some(l) if !l.is_empty() => Some(label_field(l)?),
        _ => None,
    };
    let serial = crate::drivers::timer::ticks() as u32 ^ 0x4241_5341;

    let boot = boot_sector(&plan, &label_bytes.unwrap_or(*b"NO NAME    "), serial);
    dev.write_block(0, &boot)?;

    // FATs: entradas 0 e 1 reservadas (media + fim de cadeia)
    let zero = [0u8; SECTOR_SIZE];
    let mut first = [0u8; SECTOR_SIZE];
    write_u16(&mut first, 0, 0xFF00 | MEDIA_FIXED as u16);
    write_u16(&mut first, 2, 0xFFFF);
    for copy in 0..NUM_FATS {
        let base = (RESERVED_SECTORS + copy * plan.fat_size) as u64;
        dev.write_block(base, &first)?;
        for s in 1..plan.fat_size {
            dev.write_block(base + s as u64, &zero)?;
        }
    }

    let root_lba = (RESERVED_SECTORS + NUM_FATS * plan.fat_size) as u64;
    for s in 0..plan.root_dir_sectors {
        let mut sector = zero;
        if let (0, Some(name)) = (s, label_bytes) {
            ShortEntry::new(name, FileAttr::VOLUME_ID, 0, 0).encode(&mut sector[..ENTRY_SIZE]);
        }
        dev.write_block(root_lba + s as u64, &sector)?;
    }
    dev.flush()?;

    crate::kinfo!("(FAT16) Volume formatado, clusters=", plan.total_clusters);
    Ok(plan)
}
