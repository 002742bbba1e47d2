//! # Self-tests do subsistema de memória (feature `self_test`)
//!
//! - `pmm_test.rs` - alocação real sobre o bitmap
//! - `vmm_test.rs` - round-trip de paginação e `map_user`
//! - `heap_test.rs` - `Box`/`Vec` no heap do kernel

pub mod pmm_test;
pub mod vmm_test;

use crate::klib::test_framework::run_test_suite;

/// Roda as três suites; devolve o total de falhas.
pub fn run_memory_tests() -> usize {
    let mut failed = 0;
    failed += run_test_suite("PMM", pmm_test::PMM_TESTS).1;
    failed += run_test_suite("VMM", vmm_test::VMM_TESTS).1;
    failed += run_test_suite("Heap", heap_test::HEAP_TESTS).1;
    failed
}
