//! Buffers de DMA.
//!
//! O heap do kernel fica no identity map, então o endereço de uma alocação
//! já é o endereço físico que o dispositivo enxerga. Nos testes do host o
//! "físico" é o próprio ponteiro.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;
use core::ptr::NonNull;

use super::VirtioError;

/// Região zerada, alinhada a página, contígua.
pub struct DmaBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: a região pertence só a este buffer
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    pub fn new(len: usize) -> Result<Self, VirtioError> {
        let layout = Layout::from_size_align(len.max(1), 4096).map_err(|_| VirtioError::QueueUnavailable)?;
        // SAFETY: layout com tamanho não nulo
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(VirtioError::QueueUnavailable)?;
        Ok(Self { ptr, layout })
    }

    /// Cópia de `data` num buffer novo.
    pub fn from_bytes(data: &[u8]) -> Result<Self, VirtioError> {
        let mut buf = Self::new(data.len())?;
        buf.as_mut_slice()[..data.len()].copy_from_slice(data);
        Ok(buf)
    }

    pub fn phys(&self) -> u64 {
        self.ptr.as_ptr() as usize as u64
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: região viva, `len` bytes inicializados (zerados)
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: idem, acesso exclusivo por `&mut self`
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        // SAFETY: alocado em `new` com o mesmo layout
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
