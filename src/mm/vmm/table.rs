//! Entradas de diretório/tabela de páginas (formato i686 sem PAE).
//!
//! ```text
//!  31                    12 11    7 6 5 4 3 2 1 0
//! ┌────────────────────────┬───────┬─┬─┬─┬─┬─┬─┬─┐
//! │ frame físico           │ livre │D│A│C│W│U│R│P│
//! └────────────────────────┴───────┴─┴─┴─┴─┴─┴─┴─┘
//! ```

use crate::mm::addr::PhysAddr;
use crate::mm::config::ENTRIES_PER_TABLE;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PageFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
    }
}

const ADDR_MASK: u32 = 0xFFFF_F000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageEntry(u32);

impl PageEntry {
    pub const EMPTY: PageEntry = PageEntry(0);

    pub fn new(frame: PhysAddr, flags: PageFlags) -> Self {
        Self((frame.as_u32() & ADDR_MASK) | flags.bits())
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_present(self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    pub fn addr(self) -> PhysAddr {
        PhysAddr::new(self.0 & ADDR_MASK)
    }

    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & !ADDR_MASK)
    }

    pub fn with_flags(self, extra: PageFlags) -> Self {
        Self(self.0 | extra.bits())
    }
}

/// Diretório ou tabela: 1024 entradas, alinhado a página.
#[repr(C, align(4096))]
pub struct PageTable {
    pub entries: [PageEntry; ENTRIES_PER_TABLE],
}

impl PageTable {
    pub const fn zero_table() -> Self {
        Self {
            entries: [PageEntry::EMPTY; ENTRIES_PER_TABLE],
        }
    }

    pub fn zero(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = PageEntry::EMPTY);
    }

    pub fn copy_from(&mut self, other: &PageTable) {
        self.entries.copy_from_slice(&other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_packs_frame_and_flags() {
        let e = PageEntry::new(
            PhysAddr::new(0x0040_3000),
            PageFlags::PRESENT | PageFlags::USER,
        );
        assert_eq!(e.raw(), 0x0040_3005);
        assert!(e.is_present());
        assert_eq!(e.addr(), PhysAddr::new(0x0040_3000));
        assert_eq!(e.flags(), PageFlags::PRESENT | PageFlags::USER);
        assert!(!PageEntry::EMPTY.is_present());
    }
}
