//! Testes do VMM (Virtual Memory Manager)

use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::USER_IMAGE_BASE;
use crate::mm::pmm;
use crate::mm::vmm::{self, PageFlags};

pub const VMM_TESTS: &[TestCase] = &[
    TestCase::new("vmm_identity_translate", test_identity_translate),
    TestCase::new("vmm_map_roundtrip", test_map_roundtrip),
    TestCase::new("vmm_map_user_isolated", test_map_user_isolated),
];

/// Endereço livre na faixa compartilhada do kernel, longe da GUI.
const SCRATCH_VA: u32 = 0x3F00_0000;

fn test_identity_translate() -> TestResult {
    let probe = VirtAddr::new(0x0010_0000);
    match vmm::translate(vmm::current_directory(), probe) {
        Some((phys, _)) if phys == PhysAddr::new(0x0010_0000) => TestResult::Passed,
        _ => TestResult::Failed,
    }
}

/// Escreve pelo mapeamento novo, lê pelo identity map.
fn test_map_roundtrip() -> TestResult {
    let Some(frame) = pmm::alloc_page() else {
        return TestResult::Failed;
    };
    let virt = VirtAddr::new(SCRATCH_VA);
    if vmm::map_page(virt, frame, PageFlags::WRITABLE).is_err() {
        pmm::free_page(frame);
        return TestResult::Failed;
    }

    // SAFETY: página recém mapeada e frame identity-mapeado
    let seen = unsafe {
        core::ptr::write_volatile(SCRATCH_VA as *mut u32, 0xB45A_17u32);
        core::ptr::read_volatile(frame.as_usize() as *const u32)
    };

    let unmapped = vmm::unmap_page(virt);
    pmm::free_page(frame);

    if seen == 0xB45A_17 && unmapped == Some(frame) {
        TestResult::Passed
    } else {
        crate::kerror!("(VMM) Round-trip leu ", seen);
        TestResult::Failed
    }
}

/// `map_user` num diretório inativo aparece no `translate` desse diretório
/// e não no diretório ativo.
fn test_map_user_isolated() -> TestResult {
    let Ok(pd) = vmm::create_isolated_space() else {
        return TestResult::Failed;
    };
    let Some(frame) = pmm::alloc_page() else {
        vmm::destroy_address_space(pd);
        return TestResult::Failed;
    };
    let virt = VirtAddr::new(USER_IMAGE_BASE);

    let mut ok = vmm::map_user(pd, virt, frame, PageFlags::WRITABLE).is_ok();
    ok &= matches!(
        vmm::translate(pd, virt),
        Some((phys, flags)) if phys == frame && flags.contains(PageFlags::USER)
    );
    ok &= vmm::translate(vmm::current_directory(), virt).is_none();
    ok &= vmm::unmap_user(pd, virt) == Some(frame);

    vmm::destroy_address_space(pd);
    pmm::free_page(frame);
    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}
