//! Memória física simulada para testes do host.
//!
//! Frames vivem em páginas alinhadas no heap do processo de teste; o
//! "endereço físico" é só uma chave. Clones compartilham o mesmo estado,
//! então o mesmo `FakePhys` pode servir de `TableWindows` e `FrameSource`.

extern crate std;

use std::boxed::Box;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::mapper::{TableWindows, Window};
use super::table::{PageEntry, PageTable};
use crate::mm::addr::PhysAddr;
use crate::mm::pmm::FrameSource;

/// Primeiro frame entregue; longe de endereços usados como conteúdo nos testes.
const FAKE_BASE: u32 = 0x0100_0000;

struct Inner {
    pages: BTreeMap<u32, Box<PageTable>>,
    freed: BTreeSet<u32>,
    next: u32,
    allocated: usize,
    limit: usize,
}

#[derive(Clone)]
pub struct FakePhys(Rc<RefCell<Inner>>);

impl FakePhys {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// No máximo `limit` frames entregues.
    pub fn with_limit(limit: usize) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            pages: BTreeMap::new(),
            freed: BTreeSet::new(),
            next: FAKE_BASE,
            allocated: 0,
            limit,
        })))
    }

    pub fn alloc_zeroed(&self) -> PhysAddr {
        self.clone().alloc_frame().expect("fake sem frames")
    }

    pub fn allocated(&self) -> usize {
        self.0.borrow().allocated
    }

    pub fn was_freed(&self, frame: PhysAddr) -> bool {
        self.0.borrow().freed.contains(&frame.as_u32())
    }

    pub fn entry(&self, table: PhysAddr, index: usize) -> PageEntry {
        self.0.borrow().pages[&table.as_u32()].entries[index]
    }

    /// Bytes de um frame (conteúdo de páginas de usuário nos testes).
    pub fn bytes(&self, frame: PhysAddr) -> std::vec::Vec<u8> {
        let inner = self.0.borrow();
        let page = &inner.pages[&frame.page_base().as_u32()];
        // SAFETY: PageTable tem exatamente 4096 bytes
        let raw = unsafe { core::slice::from_raw_parts(page.as_ref() as *const PageTable as *const u8, 4096) };
        raw.to_vec()
    }

    /// Ponteiro para o início de um frame, para escrever conteúdo.
    pub fn frame_ptr(&self, frame: PhysAddr) -> *mut u8 {
        let mut inner = self.0.borrow_mut();
        let page = inner
            .pages
            .entry(frame.page_base().as_u32())
            .or_insert_with(|| Box::new(PageTable::zero_table()));
        page.as_mut() as *mut PageTable as *mut u8
    }
}

impl FrameSource for FakePhys {
    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        let mut inner = self.0.borrow_mut();
        if inner.allocated >= inner.limit {
            return None;
        }
        let addr = inner.next;
        inner.next += 0x1000;
        inner.allocated += 1;
        inner.pages.insert(addr, Box::new(PageTable::zero_table()));
        Some(PhysAddr::new(addr))
    }

    fn free_frame(&mut self, frame: PhysAddr) {
        self.0.borrow_mut().freed.insert(frame.as_u32());
    }
}

impl TableWindows for FakePhys {
    unsafe fn open(&mut self, _window: Window, frame: PhysAddr) -> *mut PageTable {
        self.frame_ptr(frame) as *mut PageTable
    }

    fn close(&mut self, _window: Window) {}
}
