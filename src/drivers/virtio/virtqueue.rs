//! # Virtqueue (split ring)
//!
//! Uma única região contígua e zerada:
//!
//! ```text
//! ┌────────────────────────────┐ 0
//! │ Descriptor Table (16 × N)  │ addr u64 | len u32 | flags u16 | next u16
//! ├────────────────────────────┤ 16N
//! │ Available Ring             │ flags | idx | ring[N] | used_event
//! ├────────────────────────────┤ alinhado a 4
//! │ Used Ring                  │ flags | idx | ring[N] (id u32, len u32) | avail_event
//! └────────────────────────────┘
//! ```
//!
//! Descritores livres formam uma lista ligada pelo campo `next`. Um
//! descritor só volta à lista depois de aparecer no used ring.

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{fence, Ordering};

use super::dma::DmaBuffer;
use super::VirtioError;

/// Tamanho máximo aceito pelo driver.
pub const MAX_QUEUE_SIZE: u16 = 256;

pub mod desc_flags {
    /// O buffer continua no descritor `next`
    pub const NEXT: u16 = 1;
    /// Buffer escrito pelo dispositivo
    pub const WRITE: u16 = 2;
}

const DESC_SIZE: usize = 16;

/// Um buffer de uma requisição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    pub addr: u64,
    pub len: u32,
    /// Dispositivo escreve (resposta)
    pub device_writable: bool,
}

impl Buffer {
    pub fn readable(addr: u64, len: u32) -> Self {
        Self { addr, len, device_writable: false }
    }

    pub fn writable(addr: u64, len: u32) -> Self {
        Self { addr, len, device_writable: true }
    }
}

/// Entrada consumida do used ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedElem {
    /// Descritor cabeça da cadeia
    pub id: u16,
    /// Bytes escritos pelo dispositivo
    pub len: u32,
}

/// Maior potência de dois ≤ `min(max, MAX_QUEUE_SIZE)`.
pub fn choose_size(device_max: u16) -> Option<u16> {
    let limit = device_max.min(MAX_QUEUE_SIZE);
    if limit == 0 {
        return None;
    }
    Some(1 << (15 - limit.leading_zeros()))
}

pub struct Virtqueue {
    size: u16,
    region: DmaBuffer,
    avail_offset: usize,
    used_offset: usize,
    free_head: u16,
    num_free: u16,
    last_used_idx: u16,
    /// Espelho de `avail.idx` (o dispositivo não escreve nele)
    avail_idx: u16,
}

impl Virtqueue {
    /// `size` precisa ser potência de dois ≤ 256.
    pub fn new(size: u16) -> Result<Self, VirtioError> {
        if size == 0 || size > MAX_QUEUE_SIZE || !size.is_power_of_two() {
            return Err(VirtioError::QueueUnavailable);
        }
        let n = size as usize;
        let avail_offset = DESC_SIZE * n;
        let avail_len = 6 + 2 * n;
        let used_offset = (avail_offset + avail_len + 3) & !3;
        let used_len = 6 + 8 * n;
        let region = DmaBuffer::new(used_offset + used_len)?;

        let mut queue = Self {
            size,
            region,
            avail_offset,
            used_offset,
            free_head: 0,
            num_free: size,
            last_used_idx: 0,
            avail_idx: 0,
        };
        for i in 0..size {
            let next = if i + 1 < size { i + 1 } else { 0 };
            queue.write_desc(i, 0, 0, 0, next);
        }
        Ok(queue)
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn num_free(&self) -> u16 {
        self.num_free
    }

    pub fn desc_phys(&self) -> u64 {
        self.region.phys()
    }

    pub fn avail_phys(&self) -> u64 {
        self.region.phys() + self.avail_offset as u64
    }

    pub fn used_phys(&self) -> u64 {
        self.region.phys() + self.used_offset as u64
    }

    fn base(&self) -> *mut u8 {
        self.region.as_ptr()
    }

    fn desc_ptr(&self, idx: u16) -> *mut u8 {
        // SAFETY: idx < size, dentro da tabela
        unsafe { self.base().add(idx as usize * DESC_SIZE) }
    }

    fn write_desc(&mut self, idx: u16, addr: u64, len: u32, flags: u16, next: u16) {
        let p = self.desc_ptr(idx);
        // SAFETY: descritor dentro da região; campos alinhados
        unsafe {
            write_volatile(p as *mut u64, addr);
            write_volatile(p.add(8) as *mut u32, len);
            write_volatile(p.add(12) as *mut u16, flags);
            write_volatile(p.add(14) as *mut u16, next);
        }
    }

    fn desc_flags(&self, idx: u16) -> u16 {
        // SAFETY: idem
        unsafe { read_volatile(self.desc_ptr(idx).add(12) as *const u16) }
    }

    fn desc_next(&self, idx: u16) -> u16 {
        // SAFETY: idem
        unsafe { read_volatile(self.desc_ptr(idx).add(14) as *const u16) }
    }

    fn set_desc_next(&mut self, idx: u16, next: u16) {
        // SAFETY: idem
        unsafe { write_volatile(self.desc_ptr(idx).add(14) as *mut u16, next) }
    }

    /// Encadeia `buffers` em descritores livres e publica a cabeça.
    pub fn submit(&mut self, buffers: &[Buffer]) -> Result<u16, VirtioError> {
        if buffers.is_empty() || buffers.len() > self.num_free as usize {
            return Err(VirtioError::QueueFull);
        }

        // reserva a cadeia
        let mut chain = [0u16; 4];
        if buffers.len() > chain.len() {
            return Err(VirtioError::QueueFull);
        }
        for slot in chain.iter_mut().take(buffers.len()) {
            let idx = self.free_head;
            self.free_head = self.desc_next(idx);
            self.num_free -= 1;
            *slot = idx;
        }

        for (i, buf) in buffers.iter().enumerate() {
            let mut flags = 0;
            if buf.device_writable {
                flags |= desc_flags::WRITE;
            }
            let next = if i + 1 < buffers.len() {
                flags |= desc_flags::NEXT;
                chain[i + 1]
            } else {
                0
            };
            self.write_desc(chain[i], buf.addr, buf.len, flags, next);
        }

        let head = chain[0];
        let slot = (self.avail_idx % self.size) as usize;
        // SAFETY: ring do available dentro da região
        unsafe {
            let ring = self.base().add(self.avail_offset + 4) as *mut u16;
            write_volatile(ring.add(slot), head);
        }
        // o dispositivo precisa ver a entrada antes do índice
        fence(Ordering::SeqCst);
        self.avail_idx = self.avail_idx.wrapping_add(1);
        // SAFETY: campo idx do available
        unsafe { write_volatile(self.base().add(self.avail_offset + 2) as *mut u16, self.avail_idx) };
        fence(Ordering::SeqCst);
        Ok(head)
    }

    /// `out` lido pelo dispositivo, `input` escrito por ele (opcional).
    pub fn send(&mut self, out: Buffer, input: Option<Buffer>) -> Result<u16, VirtioError> {
        match input {
            Some(inb) => self.submit(&[out, inb]),
            None => self.submit(&[out]),
        }
    }

    fn device_used_idx(&self) -> u16 {
        fence(Ordering::SeqCst);
        // SAFETY: campo idx do used ring
        unsafe { read_volatile(self.base().add(self.used_offset + 2) as *const u16) }
    }

    pub fn has_used(&self) -> bool {
        self.device_used_idx() != self.last_used_idx
    }

    /// Consome uma entrada do used ring e devolve a cadeia à lista livre.
    pub fn poll(&mut self) -> Option<UsedElem> {
        if self.device_used_idx() == self.last_used_idx {
            return None;
        }
        let slot = (self.last_used_idx % self.size) as usize;
        // SAFETY: elemento do used ring dentro da região
        let (id, len) = unsafe {
            let elem = self.base().add(self.used_offset + 4 + slot * 8);
            (read_volatile(elem as *const u32), read_volatile(elem.add(4) as *const u32))
        };
        self.last_used_idx = self.last_used_idx.wrapping_add(1);

        let head = (id as u16) % self.size;
        self.free_chain(head);
        Some(UsedElem { id: head, len })
    }

    fn free_chain(&mut self, head: u16) {
        let mut idx = head;
        loop {
            let flags = self.desc_flags(idx);
            let next = self.desc_next(idx);
            self.set_desc_next(idx, self.free_head);
            self.free_head = idx;
            self.num_free += 1;
            if flags & desc_flags::NEXT == 0 || self.num_free >= self.size {
                break;
            }
            idx = next;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::sim::SimDevice;
    use super::*;

    #[test]
    fn size_selection() {
        assert_eq!(choose_size(1024), Some(256));
        assert_eq!(choose_size(256), Some(256));
        assert_eq!(choose_size(200), Some(128));
        assert_eq!(choose_size(1), Some(1));
        assert_eq!(choose_size(0), None);
        assert!(Virtqueue::new(100).is_err());
        assert!(Virtqueue::new(512).is_err());
    }

    #[test]
    fn layout_is_contiguous() {
        let q = Virtqueue::new(8).unwrap();
        assert_eq!(q.avail_phys() - q.desc_phys(), 128);
        assert_eq!(q.used_phys() - q.desc_phys(), 152);
        assert_eq!(q.desc_phys() % 4096, 0);
    }

    #[test]
    fn request_round_trip_returns_descriptors() {
        let mut q = Virtqueue::new(8).unwrap();
        let mut dev = SimDevice::new();
        let cmd = [7u8; 24];
        let mut resp = [0u8; 16];

        let head = q
            .send(
                Buffer::readable(cmd.as_ptr() as u64, 24),
                Some(Buffer::writable(resp.as_mut_ptr() as u64, 16)),
            )
            .unwrap();
        assert_eq!(q.num_free(), 6);
        assert!(q.poll().is_none());

        let n = dev.process(&q, |chain| {
            assert_eq!(chain.len(), 2);
            assert_eq!(chain[0].bytes()[0], 7);
            assert_eq!(chain[0].flags, desc_flags::NEXT);
            assert_eq!(chain[1].flags, desc_flags::WRITE);
            chain[1].bytes()[0] = 0x42;
            16
        });
        assert_eq!(n, 1);

        let used = q.poll().unwrap();
        assert_eq!(used, UsedElem { id: head, len: 16 });
        assert_eq!(resp[0], 0x42);
        assert_eq!(q.num_free(), 8);
    }

    #[test]
    fn full_queue_is_reported_and_recovers() {
        let mut q = Virtqueue::new(4).unwrap();
        let mut dev = SimDevice::new();
        let byte = [0u8; 1];
        for _ in 0..4 {
            q.send(Buffer::readable(byte.as_ptr() as u64, 1), None).unwrap();
        }
        assert_eq!(
            q.send(Buffer::readable(byte.as_ptr() as u64, 1), None),
            Err(VirtioError::QueueFull)
        );
        assert_eq!(dev.process(&q, |_| 0), 4);
        while q.poll().is_some() {}
        assert_eq!(q.num_free(), 4);

        // índices dão a volta no anel
        for _ in 0..10 {
            q.send(Buffer::readable(byte.as_ptr() as u64, 1), None).unwrap();
            dev.process(&q, |_| 0);
            assert!(q.poll().is_some());
        }
        assert_eq!(q.num_free(), 4);
    }
}
