//! Formatação NTFS mínima.
//!
//! ```text
//! LCN 0        boot sector ($Boot)
//! LCN 1..17    $MFT (64 registros de 1 KiB)
//! LCN 17       $MFTMirr (registros 0-3)
//! LCN 18..22   $LogFile (reservado, nunca usado)
//! LCN 22..     $Bitmap
//! último setor cópia do boot sector
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::klib::Bitmap;

use super::boot::BootSector;
use super::index;
use super::record::{self as rec, FileName, RecordBuilder};
use super::runs::Run;
use super::volume::ROOT_RECORD;

pub const MIN_FORMAT_SECTORS: u64 = 2048;
pub const MFT_RECORDS: usize = 64;

const SECTORS_PER_CLUSTER: u8 = 8;
/// 1 << 10 = 1024 bytes por registro
const RECORD_SIZE_CODE: i8 = -10;
const MIRROR_RECORDS: usize = 4;
const LOGFILE_CLUSTERS: u64 = 4;
const SYSTEM_RECORDS: usize = 16;

const SYSTEM_NAMES: [&str; 12] = [
    "$MFT", "$MFTMirr", "$LogFile", "$Volume", "$AttrDef", ".", "$Bitmap", "$Boot", "$BadClus", "$Secure", "$UpCase",
    "$Extend",
];

struct Plan {
    boot: BootSector,
    mft_clusters: u64,
    mirr_clusters: u64,
    log_lcn: u64,
    bitmap_lcn: u64,
    bitmap_bytes: usize,
    bitmap_clusters: u64,
}

fn plan(total_sectors: u64) -> FsResult<Plan> {
    if total_sectors < MIN_FORMAT_SECTORS {
        return Err(FsError::Unsupported);
    }
    let spc = SECTORS_PER_CLUSTER as u64;
    let cs = spc * SECTOR_SIZE as u64;
    let volume_sectors = total_sectors - 1;
    let total_clusters = volume_sectors / spc;

    let boot = BootSector {
        bytes_per_sector: SECTOR_SIZE as u16,
        sectors_per_cluster: SECTORS_PER_CLUSTER,
        total_sectors: volume_sectors,
        mft_lcn: 1,
        mftmirr_lcn: 0,
        clusters_per_record: RECORD_SIZE_CODE,
        clusters_per_index: 1,
        serial: 0,
    };
    let rs = boot.record_size() as u64;

    let mft_clusters = (MFT_RECORDS as u64 * rs).div_ceil(cs);
    let mirr_clusters = (MIRROR_RECORDS as u64 * rs).div_ceil(cs);
    let mirr_lcn = boot.mft_lcn + mft_clusters;
    let log_lcn = mirr_lcn + mirr_clusters;
    let bitmap_lcn = log_lcn + LOGFILE_CLUSTERS;
    let bitmap_bytes = ((total_clusters as usize).div_ceil(8) + 7) & !7;
    let bitmap_clusters = (bitmap_bytes as u64).div_ceil(cs);
    if bitmap_lcn + bitmap_clusters >= total_clusters {
        return Err(FsError::Unsupported);
    }

    Ok(Plan {
        boot: BootSector {
            mftmirr_lcn: mirr_lcn,
            ..boot
        },
        mft_clusters,
        mirr_clusters,
        log_lcn,
        bitmap_lcn,
        bitmap_bytes,
        bitmap_clusters,
    })
}

/// Sequência dos metarquivos = número do registro.
fn system_ref(n: u64) -> u64 {
    rec::file_ref(n, n.max(1) as u16)
}

fn system_record(
    plan: &Plan,
    n: usize,
    extra: impl FnOnce(&mut RecordBuilder) -> FsResult<()>,
) -> FsResult<Vec<u8>> {
    let rs = plan.boot.record_size();
    let is_dir = n == ROOT_RECORD as usize || n == 11;
    let flags = rec::RECORD_IN_USE | if is_dir { rec::RECORD_IS_DIR } else { 0 };
    let attrs = if is_dir { rec::FILE_ATTR_DIRECTORY } else { 0x06 }; // oculto + sistema

    let fname = FileName {
        parent: system_ref(ROOT_RECORD),
        allocated_size: 0,
        real_size: 0,
        flags: attrs,
        namespace: rec::NAMESPACE_WIN32_DOS,
        name: SYSTEM_NAMES[n].into(),
    };
    let mut b = RecordBuilder::new(rs, n as u32, flags, n.max(1) as u16);
    b.resident(rec::ATTR_STANDARD_INFORMATION, "", &rec::standard_information(0, attrs))?
        .resident(rec::ATTR_FILE_NAME, "", &fname.encode(0))?;
    extra(&mut b)?;
    Ok(b.finish())
}

fn build_records(plan: &Plan, label: &str) -> FsResult<Vec<Vec<u8>>> {
    let cs = plan.boot.cluster_size();
    let rs = plan.boot.record_size();
    let ixs = plan.boot.index_record_size() as u32;

    let mut mft_bitmap = Bitmap::new(MFT_RECORDS);
    mft_bitmap.set_range(0, SYSTEM_RECORDS);
    let mft_bitmap = mft_bitmap.to_bytes(MFT_RECORDS / 8);

    let mut volume_info = [0u8; 12];
    volume_info[8] = 3;
    volume_info[9] = 1;

    let mut records = Vec::with_capacity(MFT_RECORDS);
    for n in 0..SYSTEM_NAMES.len() {
        let record = match n {
            0 => system_record(plan, n, |b| {
                b.non_resident(rec::ATTR_DATA, &[Run::new(plan.boot.mft_lcn, plan.mft_clusters)], (MFT_RECORDS * rs) as u64, cs)?
                    .resident(rec::ATTR_BITMAP, "", &mft_bitmap)?;
                Ok(())
            }),
            1 => system_record(plan, n, |b| {
                b.non_resident(rec::ATTR_DATA, &[Run::new(plan.boot.mftmirr_lcn, plan.mirr_clusters)], (MIRROR_RECORDS * rs) as u64, cs)?;
                Ok(())
            }),
            2 => system_record(plan, n, |b| {
                b.non_resident(rec::ATTR_DATA, &[Run::new(plan.log_lcn, LOGFILE_CLUSTERS)], LOGFILE_CLUSTERS * cs as u64, cs)?;
                Ok(())
            }),
            3 => system_record(plan, n, |b| {
                b.resident(rec::ATTR_VOLUME_NAME, "", &rec::utf16_bytes(label))?
                    .resident(rec::ATTR_VOLUME_INFORMATION, "", &volume_info)?
                    .resident(rec::ATTR_DATA, "", &[])?;
                Ok(())
            }),
            5 | 11 => system_record(plan, n, |b| {
                b.resident(rec::ATTR_INDEX_ROOT, rec::I30, &index::empty_root(ixs, 1))?;
                Ok(())
            }),
            6 => system_record(plan, n, |b| {
                b.non_resident(rec::ATTR_DATA, &[Run::new(plan.bitmap_lcn, plan.bitmap_clusters)], plan.bitmap_bytes as u64, cs)?;
                Ok(())
            }),
            7 => system_record(plan, n, |b| {
                b.non_resident(rec::ATTR_DATA, &[Run::new(0, 1)], cs as u64, cs)?;
                Ok(())
            }),
            _ => system_record(plan, n, |b| {
                b.resident(rec::ATTR_DATA, "", &[])?;
                Ok(())
            }),
        }?;
        records.push(record);
    }
    while records.len() < MFT_RECORDS {
        records.push(RecordBuilder::new(rs, records.len() as u32, 0, 1).finish());
    }
    Ok(records)
}

/// Formata `total_sectors` setores de `dev` com um volume NTFS vazio.
pub fn format(dev: &dyn BlockDevice, total_sectors: u64, label: Option<&str>) -> FsResult<BootSector> {
    if total_sectors > dev.total_blocks() {
        return Err(FsError::TooLarge);
    }
    let label = label.unwrap_or("");
    if label.encode_utf16().count() > 32 {
        return Err(FsError::InvalidName);
    }
    let mut plan = plan(total_sectors)?;
    plan.boot.serial = crate::drivers::timer::ticks() ^ 0x4E54_4653_4241_5341;

    // Mesmas checagens feitas na montagem
    let boot_sector = plan.boot.encode();
    let boot = BootSector::parse(&boot_sector)?;

    let spc = boot.sectors_per_cluster as u64;
    let rs = boot.record_size();
    let lba_of = |lcn: u64| lcn * spc;

    let mut clusters = Bitmap::new(boot.total_clusters() as usize);
    clusters.set_range(0, (plan.bitmap_lcn + plan.bitmap_clusters) as usize);

    let zero = [0u8; SECTOR_SIZE];
    for s in lba_of(plan.log_lcn)..lba_of(plan.bitmap_lcn) {
        dev.write_block(s, &zero)?;
    }

    let records = build_records(&plan, label)?;
    for (n, record) in records.iter().enumerate() {
        let mut raw = record.clone();
        rec::prepare_fixup(&mut raw)?;
        let first = lba_of(boot.mft_lcn) + (n * rs / SECTOR_SIZE) as u64;
        dev.write_blocks(first, &raw)?;
        if n < MIRROR_RECORDS {
            let mirror = lba_of(boot.mftmirr_lcn) + (n * rs / SECTOR_SIZE) as u64;
            dev.write_blocks(mirror, &raw)?;
        }
    }

    let mut bitmap = clusters.to_bytes(plan.bitmap_bytes);
    bitmap.resize(plan.bitmap_clusters as usize * boot.cluster_size(), 0);
    dev.write_blocks(lba_of(plan.bitmap_lcn), &bitmap)?;

    let mut boot_cluster = vec![0u8; boot.cluster_size()];
    boot_cluster[..SECTOR_SIZE].copy_from_slice(&boot_sector);
    dev.write_blocks(0, &boot_cluster)?;
    dev.write_block(total_sectors - 1, &boot_sector)?;
    dev.flush()?;

    crate::kinfo!("(NTFS) Volume formatado, clusters=", boot.total_clusters());
    Ok(boot)
}
