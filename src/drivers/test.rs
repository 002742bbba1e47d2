//! Self-tests de drivers (feature `self_test`).
//!
//! Dispositivos opcionais (disco, GPU) viram `Skipped` quando ausentes.

use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};

pub const DRIVER_TESTS: &[TestCase] = &[
    TestCase::new("pic_offsets_above_exceptions", test_pic_offsets),
    TestCase::new("pci_scan_found_devices", test_pci_scan),
    TestCase::new("ata_reads_sector_zero", test_ata_read),
    TestCase::new("virtio_gpu_display_info", test_gpu_display_info),
];

pub fn run_driver_tests() -> usize {
    run_test_suite("Drivers", DRIVER_TESTS).1
}

fn test_pic_offsets() -> TestResult {
    if super::pic::MASTER_OFFSET >= 32 && super::pic::SLAVE_OFFSET == super::pic::MASTER_OFFSET + 8 {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_pci_scan() -> TestResult {
    // a host bridge sempre existe no barramento 0
    if super::pci::all_devices().iter().any(|d| d.class_code == 0x06) {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_ata_read() -> TestResult {
    let Some(drive) = super::block::drive(0) else {
        return TestResult::Skipped;
    };
    let mut sector = [0u8; super::block::SECTOR_SIZE];
    match drive.read_block(0, &mut sector) {
        Ok(()) => TestResult::Passed,
        Err(_) => TestResult::Failed,
    }
}

fn test_gpu_display_info() -> TestResult {
    let mut gpu = super::virtio::GPU.lock();
    let Some(dev) = gpu.as_mut() else {
        return TestResult::Skipped;
    };
    match dev.display_info() {
        Ok(scanouts) if scanouts.iter().any(|s| s.enabled) => TestResult::Passed,
        _ => TestResult::Failed,
    }
}
