//! Alocador de frames por bitmap (1 bit por página de 4 KiB).
//!
//! - First-fit linear a partir de um cursor de dica (volta ao início)
//! - Bit 1 = usado/reservado, bit 0 = livre
//! - Double free e endereços fora da RAM são ignorados: vazar um frame é
//!   preferível a corromper o bitmap

use crate::klib::Bitmap;
use crate::mm::addr::PhysAddr;
use crate::mm::config::PAGE_SIZE;

pub struct BitmapFrameAllocator {
    bitmap: Bitmap,
    total_frames: usize,
    used_frames: usize,
    next_hint: usize,
}

impl BitmapFrameAllocator {
    /// Bitmap para `total_kb` KiB de RAM, todos os frames livres.
    pub fn new(total_kb: usize) -> Self {
        let total_frames = total_kb * 1024 / PAGE_SIZE;
        Self {
            bitmap: Bitmap::new(total_frames),
            total_frames,
            used_frames: 0,
            next_hint: 0,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn used_frames(&self) -> usize {
        self.used_frames
    }

    pub fn free_frames(&self) -> usize {
        self.total_frames - self.used_frames
    }

    /// Marca `[start, start + size)` como usado, arredondando para fora.
    pub fn reserve_range(&mut self, start: u32, size: usize) {
        if size == 0 {
            return;
        }
        let first = start as usize / PAGE_SIZE;
        let last = (start as usize + size).div_ceil(PAGE_SIZE);
        for frame in first..last.min(self.total_frames) {
            if !self.bitmap.test(frame) {
                self.bitmap.set(frame);
                self.used_frames += 1;
            }
        }
    }

    pub fn alloc_page(&mut self) -> Option<PhysAddr> {
        let index = self
            .bitmap
            .find_first_zero_from(self.next_hint)
            .or_else(|| self.bitmap.find_first_zero())?;
        self.bitmap.set(index);
        self.used_frames += 1;
        self.next_hint = index + 1;
        Some(PhysAddr::from_frame_index(index))
    }

    /// Retorna `false` (e não altera nada) em double free ou endereço inválido.
    pub fn free_page(&mut self, page: PhysAddr) -> bool {
        let index = page.frame_index();
        if !page.is_page_aligned() || index >= self.total_frames || !self.bitmap.test(index) {
            return false;
        }
        self.bitmap.clear(index);
        self.used_frames -= 1;
        if index < self.next_hint {
            self.next_hint = index;
        }
        true
    }

    pub fn is_used(&self, page: PhysAddr) -> bool {
        self.bitmap.test(page.frame_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_after_reservations() {
        let mut pmm = BitmapFrameAllocator::new(64); // 16 frames
        pmm.reserve_range(0, 3 * PAGE_SIZE);
        assert_eq!(pmm.alloc_page(), Some(PhysAddr::new(0x3000)));
        assert_eq!(pmm.alloc_page(), Some(PhysAddr::new(0x4000)));
        assert_eq!(pmm.used_frames(), 5);
    }

    #[test]
    fn freed_frame_is_reused_first() {
        let mut pmm = BitmapFrameAllocator::new(64);
        let a = pmm.alloc_page().unwrap();
        let _b = pmm.alloc_page().unwrap();
        assert!(pmm.free_page(a));
        assert_eq!(pmm.alloc_page(), Some(a));
    }

    #[test]
    fn double_free_is_ignored() {
        let mut pmm = BitmapFrameAllocator::new(64);
        let a = pmm.alloc_page().unwrap();
        assert!(pmm.free_page(a));
        assert!(!pmm.free_page(a));
        assert!(!pmm.free_page(PhysAddr::new(0x10_0000)));
        assert!(!pmm.free_page(PhysAddr::new(0x1001)));
        assert_eq!(pmm.used_frames(), 0);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut pmm = BitmapFrameAllocator::new(16); // 4 frames
        for _ in 0..4 {
            assert!(pmm.alloc_page().is_some());
        }
        assert_eq!(pmm.alloc_page(), None);
    }

    #[test]
    fn reserve_rounds_outward() {
        let mut pmm = BitmapFrameAllocator::new(64);
        pmm.reserve_range(0x1800, 0x1000);
        assert!(!pmm.is_used(PhysAddr::new(0x0000)));
        assert!(pmm.is_used(PhysAddr::new(0x1000)));
        assert!(pmm.is_used(PhysAddr::new(0x2000)));
        assert!(!pmm.is_used(PhysAddr::new(0x3000)));
    }
}
