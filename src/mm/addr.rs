//! Endereços físicos e virtuais de 32 bits.

use super::config::{PAGE_SHIFT, PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(pub u32);

impl PhysAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Número do frame (endereço / 4096).
    pub const fn frame_index(self) -> usize {
        (self.0 >> PAGE_SHIFT) as usize
    }

    pub const fn from_frame_index(index: usize) -> Self {
        Self((index as u32) << PAGE_SHIFT)
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 as usize % PAGE_SIZE == 0
    }

    pub const fn page_base(self) -> Self {
        Self(self.0 & !(PAGE_SIZE as u32 - 1))
    }

    pub const fn add(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl VirtAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Índice no diretório (bits 31..22).
    pub const fn pd_index(self) -> usize {
        (self.0 >> 22) as usize
    }

    /// Índice na tabela (bits 21..12).
    pub const fn pt_index(self) -> usize {
        ((self.0 >> 12) & 0x3FF) as usize
    }

    pub const fn page_offset(self) -> usize {
        (self.0 & 0xFFF) as usize
    }

    pub const fn page_base(self) -> Self {
        Self(self.0 & !0xFFF)
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 & 0xFFF == 0
    }

    pub const fn add(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_and_table_indices() {
        let v = VirtAddr::new(0xC040_3123);
        assert_eq!(v.pd_index(), 0x301);
        assert_eq!(v.pt_index(), 0x003);
        assert_eq!(v.page_offset(), 0x123);
        assert_eq!(v.page_base(), VirtAddr::new(0xC040_3000));
        assert_eq!(VirtAddr::new(crate::mm::config::TEMP_PD_VA).pd_index(), 255);
    }

    #[test]
    fn frame_index_round_trip() {
        let p = PhysAddr::new(0x0012_3000);
        assert_eq!(p.frame_index(), 0x123);
        assert_eq!(PhysAddr::from_frame_index(0x123), p);
    }
}
