//! Testes do PMM (Physical Memory Manager)

use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::PhysAddr;
use crate::mm::pmm;

pub const PMM_TESTS: &[TestCase] = &[
    TestCase::new("pmm_alloc_free", test_alloc_free),
    TestCase::new("pmm_low_memory_reserved", test_low_memory_reserved),
];

/// Dez frames distintos e alinhados; o contador volta ao valor inicial.
fn test_alloc_free() -> TestResult {
    let (_, used_before) = pmm::stats();
    let mut frames = [PhysAddr::new(0); 10];

    for (i, slot) in frames.iter_mut().enumerate() {
        match pmm::alloc_page() {
            Some(frame) if frame.is_page_aligned() => *slot = frame,
            Some(frame) => {
                crate::kerror!("(PMM) Frame desalinhado=", frame.as_u32());
                return TestResult::Failed;
            }
            None => {
                crate::kerror!("(PMM) OOM no frame ", i as u64);
                return TestResult::Failed;
            }
        }
    }

    for i in 1..frames.len() {
        if frames[..i].contains(&frames[i]) {
            return TestResult::Failed;
        }
    }

    frames.iter().for_each(|&f| pmm::free_page(f));
    if pmm::stats().1 != used_before {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_low_memory_reserved() -> TestResult {
    match pmm::alloc_page() {
        Some(frame) => {
            pmm::free_page(frame);
            if frame.as_u32() < crate::mm::config::LOW_MEMORY_RESERVED {
                TestResult::Failed
            } else {
                TestResult::Passed
            }
        }
        None => TestResult::Skipped,
    }
}
