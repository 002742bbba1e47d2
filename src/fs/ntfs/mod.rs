//! # NTFS
//!
//! Motor de leitura e escrita NTFS sem journaling.
//!
//! ## Estruturas
//!
//! | Estrutura       | Onde                                   |
//! |-----------------|----------------------------------------|
//! | Boot sector     | setor 0 (cópia no último setor)        |
//! | $MFT            | registros de tamanho fixo com fixup    |
//! | $Bitmap         | registro 6, um bit por cluster         |
//! | $BITMAP do $MFT | um bit por registro                    |
//! | $I30            | índice de cada diretório               |
//!
//! Arquivos pequenos ficam residentes no registro; os maiores usam um
//! único run contíguo. Entradas novas vão sempre para o $INDEX_ROOT do
//! diretório pai.

pub mod boot;
pub mod format;
pub mod index;
pub mod record;
pub mod runs;
pub mod volume;

pub use boot::BootSector;
pub use format::{format, MIN_FORMAT_SECTORS};
pub use volume::Ntfs;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::block::{BlockDevice, RamDisk, SECTOR_SIZE};
    use crate::fs::error::FsError;
    use crate::fs::types::NodeKind;
    use alloc::sync::Arc;
    use std::vec::Vec;

    const SECTORS: u64 = 16384;

    fn fresh(label: Option<&str>) -> (Arc<RamDisk>, Ntfs) {
        let disk = Arc::new(RamDisk::new(SECTORS));
        format(&*disk, SECTORS, label).unwrap();
        let fs = Ntfs::mount(disk.clone()).unwrap();
        (disk, fs)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 13 % 241) as u8).collect()
    }

    #[test]
    fn format_meets_geometry_assertions() {
        let disk = RamDisk::new(SECTORS);
        let boot = format(&disk, SECTORS, Some("DATA")).unwrap();
        assert_eq!(boot.bytes_per_sector, 512);
        assert!(boot.cluster_size() <= 65536);
        assert!(boot.record_size() <= 4096);

        let image = disk.snapshot();
        let last = (SECTORS as usize - 1) * SECTOR_SIZE;
        assert_eq!(&image[..SECTOR_SIZE], &image[last..last + SECTOR_SIZE]);
    }

    #[test]
    fn format_rejects_tiny_volume() {
        let disk = RamDisk::new(1024);
        assert_eq!(format(&disk, 1024, None).unwrap_err(), FsError::Unsupported);
    }

    #[test]
    fn mounted_volume_reports_label_and_empty_root() {
        let (_, fs) = fresh(Some("Dados"));
        let info = fs.info();
        assert_eq!(info.fs_type, "NTFS");
        assert_eq!(info.label, "Dados");
        assert_eq!(info.cluster_size, 4096);
        assert!(fs.list("/").unwrap().is_empty());
        assert_eq!(fs.stat("/").unwrap().kind, NodeKind::Dir);
    }

    #[test]
    fn resident_file_round_trip() {
        let (_, fs) = fresh(None);
        let before = fs.free_clusters();
        assert_eq!(fs.write("/hello.txt", b"hello").unwrap(), 5);
        assert_eq!(fs.read_file("/hello.txt").unwrap(), b"hello");
        assert_eq!(fs.free_clusters(), before);

        let mut buf = [0u8; 3];
        assert_eq!(fs.read("/HELLO.TXT", &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(fs.stat("/hello.txt").unwrap().size, 5);
    }

    #[test]
    fn non_resident_file_uses_one_run() {
        let (_, fs) = fresh(None);
        let before = fs.free_clusters();
        let data = pattern(10_000);
        fs.write("/big.bin", &data).unwrap();
        assert_eq!(fs.free_clusters(), before - 3);
        assert_eq!(fs.read_file("/big.bin").unwrap(), data);

        let list = fs.list("/").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "big.bin");
        assert_eq!(list[0].size, 10_000);
    }

    #[test]
    fn replace_and_delete_release_space() {
        let (_, fs) = fresh(None);
        let before = fs.free_clusters();
        fs.write("/log", &pattern(9000)).unwrap();
        fs.write("/log", b"ok").unwrap();
        assert_eq!(fs.free_clusters(), before);
        assert_eq!(fs.read_file("/log").unwrap(), b"ok");
        assert_eq!(fs.list("/").unwrap().len(), 1);

        fs.delete("/log").unwrap();
        assert_eq!(fs.read_file("/log").unwrap_err(), FsError::NotFound);
        assert!(fs.list("/").unwrap().is_empty());
    }

    #[test]
    fn directories_and_nested_files() {
        let (_, fs) = fresh(None);
        fs.mkdir("/docs").unwrap();
        assert_eq!(fs.mkdir("/docs").unwrap_err(), FsError::Exists);
        fs.write("/docs/a.txt", b"nested").unwrap();

        assert_eq!(fs.stat("/docs").unwrap().kind, NodeKind::Dir);
        let inner = fs.list("/docs").unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].name, "a.txt");
        assert_eq!(fs.read_file("/docs/a.txt").unwrap(), b"nested");
        assert_eq!(fs.write("/docs", b"x").unwrap_err(), FsError::IsDir);
        assert_eq!(fs.read_file("/docs").unwrap_err(), FsError::IsDir);

        assert_eq!(fs.delete("/docs").unwrap_err(), FsError::DirNotEmpty);
        fs.delete("/docs/a.txt").unwrap();
        fs.delete("/docs").unwrap();
        assert_eq!(fs.stat("/docs").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn bitmaps_survive_remount() {
        let (disk, fs) = fresh(None);
        fs.write("/one.bin", &pattern(20_000)).unwrap();
        let free = fs.free_clusters();
        drop(fs);

        let again = Ntfs::mount(disk.clone()).unwrap();
        assert_eq!(again.free_clusters(), free);
        again.write("/two.bin", &pattern(5000)).unwrap();
        assert_eq!(again.read_file("/one.bin").unwrap(), pattern(20_000));
        assert_eq!(again.read_file("/two.bin").unwrap(), pattern(5000));
    }

    #[test]
    fn full_root_index_rolls_back_allocation() {
        let (_, fs) = fresh(None);
        let free = fs.free_clusters();
        let mut written = 0;
        let err = loop {
            let name = std::format!("/file-{:02}.dat", written);
            match fs.write(&name, &pattern(5000)) {
                Ok(_) => written += 1,
                Err(e) => break e,
            }
        };
        assert_eq!(err, FsError::NoSpace);
        assert!(written > 0);
        assert_eq!(fs.free_clusters(), free - 2 * written);
        assert_eq!(fs.list("/").unwrap().len(), written);

        fs.delete("/file-00.dat").unwrap();
        fs.write("/again.dat", b"fits").unwrap();
    }

    #[test]
    fn torn_record_is_rejected() {
        let (disk, fs) = fresh(None);
        // Segundo setor do registro 5 (raiz)
        let lba = 8 + 10 + 1;
        let mut sector = [0u8; SECTOR_SIZE];
        disk.read_block(lba, &mut sector).unwrap();
        sector[SECTOR_SIZE - 1] ^= 0xFF;
        disk.write_block(lba, &sector).unwrap();
        assert_eq!(fs.read_record(5).unwrap_err(), FsError::Corrupt);
        assert_eq!(fs.list("/").unwrap_err(), FsError::Corrupt);
    }

    #[test]
    fn fat16_volume_is_not_ntfs() {
        let disk = Arc::new(RamDisk::new(65536));
        crate::fs::fat16::format(&*disk, 65536, None).unwrap();
        assert!(Ntfs::mount(disk.clone() as Arc<dyn BlockDevice>).is_err());
    }
}
