//! Tabela de atributos por faixa de endereço virtual.
//!
//! Todo mapeamento recebe, além das flags pedidas, as flags extras da faixa
//! que contém o endereço. Hoje só a janela de MMIO de GPU tem atributo: o
//! host precisa enxergar as escritas no command buffer sem atraso de cache.

use super::table::PageFlags;
use crate::mm::addr::VirtAddr;
use crate::mm::config::{GPU_MMIO_BASE, GPU_MMIO_END};

#[derive(Debug, Clone, Copy)]
pub struct RangeAttribute {
    pub start: u32,
    /// Exclusivo.
    pub end: u32,
    pub flags: PageFlags,
}

impl RangeAttribute {
    pub const fn contains(&self, virt: u32) -> bool {
        virt >= self.start && virt < self.end
    }
}

pub static RANGE_ATTRIBUTES: &[RangeAttribute] = &[RangeAttribute {
    start: GPU_MMIO_BASE,
    end: GPU_MMIO_END,
    flags: PageFlags::WRITE_THROUGH,
}];

/// Flags extras para `virt` segundo `table`.
pub fn extra_flags_in(table: &[RangeAttribute], virt: VirtAddr) -> PageFlags {
    table
        .iter()
        .filter(|r| r.contains(virt.as_u32()))
        .fold(PageFlags::empty(), |acc, r| acc | r.flags)
}

pub fn extra_flags(virt: VirtAddr) -> PageFlags {
    extra_flags_in(RANGE_ATTRIBUTES, virt)
}
