//! # Physical Memory Manager
//!
//! Bitmap de frames de 4 KiB sobre a RAM baixa identity-mapeada.
//!
//! | Operação          | Efeito                                     |
//! |-------------------|--------------------------------------------|
//! | `init(total_kb)`  | bitmap do tamanho da RAM, tudo livre       |
//! | `reserve_range`   | marca usado (kernel, heap, módulos, BIOS)  |
//! | `alloc_page`      | first-fit, `None` se esgotado              |
//! | `free_page`       | devolve; double free é ignorado            |

pub mod bitmap;

pub use bitmap::BitmapFrameAllocator;

use crate::mm::addr::PhysAddr;
use crate::mm::config::{IDENTITY_LIMIT, LOW_MEMORY_RESERVED};
use crate::sync::Spinlock;

/// Fonte de frames físicos. O PMM global implementa; testes usam fakes.
pub trait FrameSource {
    fn alloc_frame(&mut self) -> Option<PhysAddr>;
    fn free_frame(&mut self, frame: PhysAddr);
}

pub static FRAME_ALLOCATOR: Spinlock<Option<BitmapFrameAllocator>> = Spinlock::new(None);

/// Cria o bitmap. RAM acima de `IDENTITY_LIMIT` é ignorada.
pub fn init(total_kb: usize) {
    let managed_kb = total_kb.min(IDENTITY_LIMIT as usize / 1024);
    let mut pmm = BitmapFrameAllocator::new(managed_kb);
    pmm.reserve_range(0, LOW_MEMORY_RESERVED as usize);
    crate::kinfo!("(PMM) Frames gerenciados=", pmm.total_frames());
    *FRAME_ALLOCATOR.lock() = Some(pmm);
}

pub fn reserve_range(start: u32, size: usize) {
    if let Some(pmm) = FRAME_ALLOCATOR.lock().as_mut() {
        pmm.reserve_range(start, size);
    }
}

pub fn alloc_page() -> Option<PhysAddr> {
    let page = FRAME_ALLOCATOR.lock().as_mut()?.alloc_page();
    if page.is_none() {
        crate::kwarn!("(PMM) Sem frames livres");
    }
    page
}

pub fn free_page(page: PhysAddr) {
    let freed = FRAME_ALLOCATOR
        .lock()
        .as_mut()
        .map(|pmm| pmm.free_page(page))
        .unwrap_or(false);
    if !freed {
        crate::kwarn!("(PMM) free_page ignorado: ", page.as_u32());
    }
}

/// `(total, usados)` em frames.
pub fn stats() -> (usize, usize) {
    FRAME_ALLOCATOR
        .lock()
        .as_ref()
        .map(|pmm| (pmm.total_frames(), pmm.used_frames()))
        .unwrap_or((0, 0))
}

/// PMM global como `FrameSource`.
pub struct GlobalFrames;

impl FrameSource for GlobalFrames {
    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        alloc_page()
    }

    fn free_frame(&mut self, frame: PhysAddr) {
        free_page(frame)
    }
}
