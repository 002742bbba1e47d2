//! Heap do kernel.
//!
//! `GlobalAlloc` sobre `linked_list_allocator::Heap`, numa região física
//! fixa logo após a imagem do kernel e os módulos de boot (identity-mapeada,
//! então funciona antes e depois da paginação). Permite `Box`, `Vec`,
//! `String` e `BTreeMap` no kernel.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use linked_list_allocator::Heap;

use crate::sync::Spinlock;

/// Heap travado por spinlock que desliga IRQs: o tick do timer pode alocar.
pub struct KernelHeap {
    inner: Spinlock<Heap>,
}

impl KernelHeap {
    pub const fn empty() -> Self {
        Self {
            inner: Spinlock::new(Heap::empty()),
        }
    }

    /// # Safety
    /// `[start, start+size)` deve ser memória livre, acessível e usada só
    /// pelo heap. Chamar uma única vez.
    pub unsafe fn init(&self, start: usize, size: usize) {
        self.inner.lock().init(start as *mut u8, size);
    }

    pub fn stats(&self) -> HeapStats {
        let heap = self.inner.lock();
        HeapStats {
            used: heap.used(),
            free: heap.free(),
            total: heap.size(),
        }
    }
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .allocate_first_fit(layout)
            .ok()
            .map_or(core::ptr::null_mut(), |nn| nn.as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            self.inner.lock().deallocate(ptr, layout);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub used: usize,
    pub free: usize,
    pub total: usize,
}

#[cfg(all(target_os = "none", not(test)))]
#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap::empty();

#[cfg(not(all(target_os = "none", not(test))))]
static ALLOCATOR: KernelHeap = KernelHeap::empty();

/// Entrega a região ao alocador.
///
/// # Safety
/// Ver `KernelHeap::init`.
pub unsafe fn init(start: usize, size: usize) {
    ALLOCATOR.init(start, size);
    crate::kinfo!("(Heap) Inicializado em ", start as u64);
    crate::kinfo!("(Heap) Tamanho=", size as u64);
}

/// Uso atual do heap do kernel (procfs, self-test).
pub fn stats() -> HeapStats {
    ALLOCATOR.stats()
}
