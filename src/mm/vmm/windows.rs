//! Implementações de `TableWindows` usadas pelo kernel.

use core::sync::atomic::{AtomicU32, Ordering};

use super::mapper::{TableWindows, Window};
use super::table::{PageEntry, PageFlags, PageTable};
use crate::arch::{Cpu, CpuOps};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{TEMP_PD_VA, TEMP_PT_VA};

/// Frames de tabela acessados direto pelo identity map.
///
/// Vale antes da paginação e em qualquer diretório, já que todo espaço
/// carrega o identity map da RAM gerenciada.
pub struct Identity;

impl TableWindows for Identity {
    unsafe fn open(&mut self, _window: Window, frame: PhysAddr) -> *mut PageTable {
        frame.as_usize() as *mut PageTable
    }

    fn close(&mut self, _window: Window) {}
}

/// Frame físico da tabela que cobre o slot das janelas (slot 255).
static WINDOW_PT: AtomicU32 = AtomicU32::new(0);

pub(super) fn set_window_table(pt: PhysAddr) {
    WINDOW_PT.store(pt.as_u32(), Ordering::SeqCst);
}

/// As duas páginas fixas `TEMP_PD_VA`/`TEMP_PT_VA`.
///
/// Só é usada com o diretório do kernel ativo e com `WINDOW_LOCK` tomado.
pub struct TempWindows;

impl TempWindows {
    fn slot(window: Window) -> (usize, u32) {
        let va = match window {
            Window::Directory => TEMP_PD_VA,
            Window::Table => TEMP_PT_VA,
        };
        (VirtAddr::new(va).pt_index(), va)
    }

    fn set(window: Window, entry: PageEntry) {
        let (index, va) = Self::slot(window);
        let pt = WINDOW_PT.load(Ordering::SeqCst) as usize as *mut PageTable;
        // SAFETY: a tabela das janelas é identity-mapeada e pertence ao kernel
        unsafe { (*pt).entries[index] = entry };
        Cpu::invlpg(va as usize);
    }
}

impl TableWindows for TempWindows {
    unsafe fn open(&mut self, window: Window, frame: PhysAddr) -> *mut PageTable {
        Self::set(window, PageEntry::new(frame, PageFlags::PRESENT | PageFlags::WRITABLE));
        Self::slot(window).1 as usize as *mut PageTable
    }

    fn close(&mut self, window: Window) {
        Self::set(window, PageEntry::EMPTY);
    }
}
