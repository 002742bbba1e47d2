//! # Memory Management Subsystem (MM)
//!
//! Ordem de inicialização (estrita):
//!
//! 1. `heap`: região física fixa após a imagem do kernel e os módulos.
//!    Vem primeiro porque o bitmap do PMM é um `Vec`.
//! 2. `pmm`: bitmap de frames; reserva 0..fim do heap.
//! 3. `vmm`: diretório mestre, identity map, paginação ligada.
//!
//! | Módulo   | Responsabilidade                                   |
//! |----------|----------------------------------------------------|
//! | `config` | layout do espaço virtual                           |
//! | `addr`   | `PhysAddr`/`VirtAddr` de 32 bits                   |
//! | `pmm`    | frames físicos de 4 KiB                            |
//! | `vmm`    | diretórios, tabelas, espaços de endereçamento      |
//! | `heap`   | `#[global_allocator]` (linked list)                |
//!
//! Tudo abaixo de `config::IDENTITY_LIMIT` é identity-mapeado em qualquer
//! espaço, então endereço físico de um frame do PMM é também um ponteiro
//! válido no kernel.

pub mod addr;
pub mod config;
pub mod error;
pub mod heap;
pub mod pmm;
pub mod vmm;

#[cfg(feature = "self_test")]
pub mod test;

pub use addr::{PhysAddr, VirtAddr};
pub use error::{MmError, MmResult};

use config::{KERNEL_HEAP_SIZE, PAGE_SIZE};

/// Sobe heap, PMM e paginação.
///
/// `reserved_end`: primeiro byte livre após a imagem do kernel e os módulos
/// de boot.
pub fn init(total_kb: usize, reserved_end: u32) -> MmResult<()> {
    let heap_start = crate::klib::align_up(reserved_end as usize, PAGE_SIZE);
    let heap_end = heap_start + KERNEL_HEAP_SIZE;
    if heap_end as u64 > total_kb as u64 * 1024 {
        crate::kerror!("(MM) RAM insuficiente para o heap, KiB=", total_kb as u64);
        return Err(MmError::OutOfMemory);
    }

    // SAFETY: região após kernel e módulos, ainda sem dono
    unsafe { heap::init(heap_start, KERNEL_HEAP_SIZE) };

    pmm::init(total_kb);
    pmm::reserve_range(0, heap_end);

    vmm::init(total_kb)?;

    let (total, used) = pmm::stats();
    crate::kinfo!("(MM) Frames totais=", total as u64);
    crate::kinfo!("(MM) Frames usados=", used as u64);
    Ok(())
}
