//! Self-tests do sistema de arquivos (feature `self_test`).
//!
//! Os motores de disco rodam sobre `RamDisk` no heap do kernel; o drive
//! real só é lido, nunca formatado.

use alloc::sync::Arc;

use crate::drivers::block::RamDisk;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};

use super::types::NodeKind;
use super::vfs::Vfs;

pub const FS_TESTS: &[TestCase] = &[
    TestCase::new("ramfs_write_read_hello", test_ramfs_hello),
    TestCase::new("fat16_format_label_test", test_fat16_label),
    TestCase::new("ntfs_format_round_trip", test_ntfs_round_trip),
    TestCase::new("procfs_version_eof", test_procfs_eof),
    TestCase::new("disk0_root_lists", test_disk0_lists),
];

pub fn run_fs_tests() -> usize {
    run_test_suite("Filesystem", FS_TESTS).1
}

fn check(ok: bool) -> TestResult {
    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_ramfs_hello() -> TestResult {
    let vfs = Vfs::new();
    if vfs.write("/tmp/a", b"hello").is_err() {
        return TestResult::Failed;
    }
    let mut buf = [0u8; 8];
    check(matches!(vfs.read("/tmp/a", &mut buf), Ok(5)) && &buf[..5] == b"hello")
}

fn test_fat16_label() -> TestResult {
    let disk = Arc::new(RamDisk::new(65536));
    if super::fat16::format(&*disk, 65536, Some("TEST")).is_err() {
        return TestResult::Failed;
    }
    let vfs = Vfs::new();
    match vfs.mount_device(0, disk) {
        Ok(info) => check(info.fs_type == "FAT16" && info.label == "TEST"),
        Err(_) => TestResult::Failed,
    }
}

fn test_ntfs_round_trip() -> TestResult {
    let disk = Arc::new(RamDisk::new(16384));
    if super::ntfs::format(&*disk, 16384, None).is_err() {
        return TestResult::Failed;
    }
    let vfs = Vfs::new();
    if vfs.mount_device(1, disk).is_err() || vfs.write("/disk2/n.txt", b"ntfs").is_err() {
        return TestResult::Failed;
    }
    check(matches!(vfs.read_file("/disk2/n.txt"), Ok(data) if data == b"ntfs"))
}

fn test_procfs_eof() -> TestResult {
    let vfs = Vfs::new();
    let mut buf = [0u8; 128];
    let Ok(n) = vfs.read("/proc/version", &mut buf) else {
        return TestResult::Failed;
    };
    check(n > 0 && matches!(vfs.read_at("/proc/version", n, &mut buf), Ok(0)))
}

fn test_disk0_lists() -> TestResult {
    let vfs = super::vfs::vfs();
    if vfs.volume(0).is_none() {
        return TestResult::Skipped;
    }
    match vfs.stat("/disk") {
        Ok(st) if st.kind == NodeKind::Dir => check(vfs.list("/disk").is_ok()),
        _ => TestResult::Failed,
    }
}
