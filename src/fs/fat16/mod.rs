//! # FAT16
//!
//! Motor de leitura e escrita FAT16 sobre qualquer `BlockDevice`.
//!
//! ## Layout do volume
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────┬───────────────────┐
//! │ Boot     │ FAT #1   │ FAT #2   │ Root dir     │ Dados (clusters)  │
//! │ (BPB)    │          │ (espelho)│ (fixo)       │ a partir do 2     │
//! └──────────┴──────────┴──────────┴──────────────┴───────────────────┘
//! ```
//!
//! - Entradas FAT de 16 bits; `0xFFF8..=0xFFFF` encerra a cadeia
//! - Nomes longos (VFAT) com apelido `NOME~N`
//! - Toda escrita na FAT vai para as duas cópias

pub mod bpb;
pub mod dir;
pub mod format;
pub mod fs;
pub mod table;

pub use format::{format, plan, FormatPlan, MIN_FORMAT_SECTORS};
pub use fs::Fat16;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::block::{BlockDevice, RamDisk, SECTOR_SIZE};
    use crate::fs::error::FsError;
    use crate::fs::types::NodeKind;
    use alloc::sync::Arc;
    use std::vec::Vec;

    fn fresh(sectors: u64, label: Option<&str>) -> (Arc<RamDisk>, Fat16) {
        let disk = Arc::new(RamDisk::new(sectors));
        format(&*disk, sectors as u32, label).unwrap();
        let fs = Fat16::mount(disk.clone()).unwrap();
        (disk, fs)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn format_rejects_tiny_volume() {
        let disk = RamDisk::new(4095);
        assert_eq!(format(&disk, 4095, None).unwrap_err(), FsError::Unsupported);
    }

    #[test]
    fn format_plan_reaches_fixed_point() {
        let p = plan(65536).unwrap();
        assert_eq!(p.sectors_per_cluster, 2);
        assert!((p.total_clusters + 2) * 2 <= p.fat_size * SECTOR_SIZE as u32);
        assert!((bpb::MIN_CLUSTERS..=bpb::MAX_CLUSTERS).contains(&p.total_clusters));
    }

    #[test]
    fn formatted_volume_mounts_with_label() {
        let (_, fs) = fresh(65536, Some("TEST"));
        assert_eq!(fs.volume_label(), "TEST");
        let info = fs.info();
        assert_eq!(info.fs_type, "FAT16");
        assert_eq!(info.label, "TEST");
        assert_eq!(info.total_sectors, 65536);
        assert!(fs.list("/").unwrap().is_empty());
    }

    #[test]
    fn media_byte_and_reserved_entries() {
        let (disk, fs) = fresh(65536, None);
        let image = disk.snapshot();
        let fat = fs.layout.fat_start_lba as usize * SECTOR_SIZE;
        assert_eq!(&image[fat..fat + 4], &[0xF8, 0xFF, 0xFF, 0xFF]);
        assert_eq!(fs.volume_label(), "");
    }

    #[test]
    fn write_read_delete_round_trip() {
        let (_, fs) = fresh(65536, None);
        let data = pattern(10_000);
        assert_eq!(fs.write("/DATA.BIN", &data).unwrap(), data.len());

        let mut buf = std::vec![0u8; 12_000];
        assert_eq!(fs.read("/DATA.BIN", &mut buf).unwrap(), data.len());
        assert_eq!(&buf[..data.len()], &data[..]);

        let mut short = [0u8; 5];
        assert_eq!(fs.read("/data.bin", &mut short).unwrap(), 5);
        assert_eq!(&short, &data[..5]);

        fs.delete("/DATA.BIN").unwrap();
        assert_eq!(fs.read("/DATA.BIN", &mut buf).unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn empty_file_has_no_clusters() {
        let (_, fs) = fresh(65536, None);
        let before = fs.free_clusters().unwrap();
        fs.write("/EMPTY", &[]).unwrap();
        assert_eq!(fs.free_clusters().unwrap(), before);
        assert_eq!(fs.stat("/EMPTY").unwrap().size, 0);
        assert!(fs.read_file("/EMPTY").unwrap().is_empty());
    }

    #[test]
    fn replace_frees_old_chain() {
        let (_, fs) = fresh(65536, None);
        let before = fs.free_clusters().unwrap();
        fs.write("/LOG.TXT", &pattern(3000)).unwrap();
        assert_eq!(fs.free_clusters().unwrap(), before - 3);
        fs.write("/LOG.TXT", b"short").unwrap();
        assert_eq!(fs.free_clusters().unwrap(), before - 1);
        assert_eq!(fs.read_file("/LOG.TXT").unwrap(), b"short");
        assert_eq!(fs.list("/").unwrap().len(), 1);
    }

    #[test]
    fn fat_copies_stay_identical() {
        let (disk, fs) = fresh(65536, None);
        fs.write("/A.TXT", &pattern(5000)).unwrap();
        fs.write("/B.TXT", &pattern(700)).unwrap();
        fs.delete("/A.TXT").unwrap();

        let image = disk.snapshot();
        let size = fs.layout.fat_size as usize * SECTOR_SIZE;
        let first = fs.layout.fat_start_lba as usize * SECTOR_SIZE;
        assert_eq!(&image[first..first + size], &image[first + size..first + 2 * size]);
    }

    #[test]
    fn long_names_get_unique_aliases() {
        let (_, fs) = fresh(65536, None);
        fs.write("/a much longer name.txt", b"one").unwrap();
        fs.write("/a much longer nome.txt", b"two").unwrap();

        let names: Vec<_> = fs.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a much longer name.txt", "a much longer nome.txt"]);
        assert_eq!(fs.read_file("/A MUCH LONGER NOME.TXT").unwrap(), b"two");
        // Os apelidos 8.3 também resolvem
        assert_eq!(fs.read_file("/AMUCHL~1.TXT").unwrap(), b"one");
        assert_eq!(fs.read_file("/AMUCHL~2.TXT").unwrap(), b"two");
    }

    #[test]
    fn delete_clears_lfn_entries_too() {
        let (_, fs) = fresh(65536, None);
        fs.write("/fourteen chars", b"x").unwrap();
        fs.delete("/fourteen chars").unwrap();
        // Os três slots liberados são reaproveitados pelo próximo nome
        fs.write("/another long name", b"y").unwrap();
        let names: Vec<_> = fs.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["another long name"]);
    }

    #[test]
    fn directories_nest_and_must_be_empty_to_delete() {
        let (_, fs) = fresh(65536, None);
        fs.mkdir("/docs").unwrap();
        assert_eq!(fs.mkdir("/docs").unwrap_err(), FsError::Exists);
        fs.write("/docs/readme.md", b"# basalt").unwrap();

        assert_eq!(fs.stat("/docs").unwrap().kind, NodeKind::Dir);
        assert_eq!(fs.read_file("/docs/readme.md").unwrap(), b"# basalt");
        assert_eq!(fs.delete("/docs").unwrap_err(), FsError::DirNotEmpty);
        assert_eq!(fs.write("/docs", b"x").unwrap_err(), FsError::IsDir);
        assert_eq!(fs.read_file("/docs/readme.md/x").unwrap_err(), FsError::NotDir);

        fs.delete("/docs/readme.md").unwrap();
        fs.delete("/docs").unwrap();
        assert_eq!(fs.stat("/docs").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn subdirectory_grows_past_one_cluster() {
        let (_, fs) = fresh(65536, None);
        fs.mkdir("/MANY").unwrap();
        for i in 0..40 {
            let name = std::format!("/MANY/F{}.TXT", i);
            fs.write(&name, name.as_bytes()).unwrap();
        }
        let list = fs.list("/MANY").unwrap();
        assert_eq!(list.len(), 40);
        assert_eq!(fs.read_file("/MANY/F39.TXT").unwrap(), b"/MANY/F39.TXT");
    }

    #[test]
    fn cyclic_chain_is_corrupt() {
        let (_, fs) = fresh(65536, None);
        fs.write("/LOOP.BIN", &pattern(2048)).unwrap();
        let first = fs.chain(2).unwrap();
        assert_eq!(first, [2, 3]);
        fs.write_fat(3, 2).unwrap();
        assert_eq!(fs.read_file("/LOOP.BIN").unwrap_err(), FsError::Corrupt);
    }

    #[test]
    fn mount_rejects_blank_disk() {
        let disk = Arc::new(RamDisk::new(8192));
        assert!(Fat16::mount(disk.clone() as Arc<dyn BlockDevice>).is_err());
    }
}
