//! # VirtIO-Input (teclado)
//!
//! A fila de eventos (0) fica sempre cheia de buffers de 8 bytes
//! device-writable. Cada conclusão é um `virtio_input_event`:
//!
//! ```text
//! type u16 | code u16 | value u32
//! ```
//!
//! Eventos `EV_KEY` viram bytes no ring do teclado; o buffer volta para a
//! fila logo depois.

use alloc::vec;
use alloc::vec::Vec;

use super::dma::DmaBuffer;
use super::transport::VirtioDevice;
use super::virtqueue::{Buffer, UsedElem, Virtqueue};
use super::VirtioError;
use crate::drivers::keyboard;
use crate::drivers::pci::PciDevice;
use crate::klib::bytes::{read_u16, read_u32};

pub const EVENT_SIZE: usize = 8;
pub const EV_SYN: u16 = 0;
pub const EV_KEY: u16 = 1;

/// Buffers mantidos na fila de eventos.
const EVENT_BUFFERS: u16 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub ty: u16,
    pub code: u16,
    pub value: u32,
}

impl InputEvent {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            ty: read_u16(raw, 0),
            code: read_u16(raw, 2),
            value: read_u32(raw, 4),
        }
    }
}

/// O que a fila de eventos precisa do anel (real ou de teste).
pub trait EventRing {
    fn post(&mut self, buf: Buffer) -> Result<u16, VirtioError>;
    fn take_used(&mut self) -> Option<UsedElem>;
    fn kick(&mut self);
}

impl EventRing for Virtqueue {
    fn post(&mut self, buf: Buffer) -> Result<u16, VirtioError> {
        self.submit(&[buf])
    }

    fn take_used(&mut self) -> Option<UsedElem> {
        self.poll()
    }

    fn kick(&mut self) {}
}

/// Fila 0 de um dispositivo real.
struct DeviceRing<'a>(&'a mut VirtioDevice);

impl EventRing for DeviceRing<'_> {
    fn post(&mut self, buf: Buffer) -> Result<u16, VirtioError> {
        self.0.submit(0, &[buf])
    }

    fn take_used(&mut self) -> Option<UsedElem> {
        self.0.poll(0)
    }

    fn kick(&mut self) {
        let _ = self.0.notify(0);
    }
}

/// Buffers de evento e o mapa descritor → slot.
pub struct EventQueue {
    buffers: DmaBuffer,
    slot_of: Vec<Option<u16>>,
}

impl EventQueue {
    pub fn new(slots: u16, queue_size: u16) -> Result<Self, VirtioError> {
        Ok(Self {
            buffers: DmaBuffer::new(slots as usize * EVENT_SIZE)?,
            slot_of: vec![None; queue_size as usize],
        })
    }

    pub fn slots(&self) -> u16 {
        (self.buffers.len() / EVENT_SIZE) as u16
    }

    fn post_slot<R: EventRing>(&mut self, ring: &mut R, slot: u16) -> Result<(), VirtioError> {
        let addr = self.buffers.phys() + (slot as usize * EVENT_SIZE) as u64;
        let head = ring.post(Buffer::writable(addr, EVENT_SIZE as u32))?;
        if let Some(entry) = self.slot_of.get_mut(head as usize) {
            *entry = Some(slot);
        }
        Ok(())
    }

    /// Entrega todos os buffers ao dispositivo.
    pub fn prefill<R: EventRing>(&mut self, ring: &mut R) -> Result<(), VirtioError> {
        for slot in 0..self.slots() {
            self.post_slot(ring, slot)?;
        }
        ring.kick();
        Ok(())
    }

    /// Processa as conclusões e devolve os buffers à fila.
    pub fn drain<R: EventRing>(&mut self, ring: &mut R, mut on_event: impl FnMut(InputEvent)) -> usize {
        let mut seen = 0;
        while let Some(used) = ring.take_used() {
            let Some(slot) = self.slot_of.get_mut(used.id as usize).and_then(Option::take) else {
                continue;
            };
            let off = slot as usize * EVENT_SIZE;
            if used.len as usize >= EVENT_SIZE {
                on_event(InputEvent::parse(&self.buffers.as_slice()[off..off + EVENT_SIZE]));
                seen += 1;
            }
            if self.post_slot(ring, slot).is_err() {
                crate::kwarn!("(VirtIO) Buffer de input perdido, slot=", slot);
            }
        }
        if seen > 0 {
            ring.kick();
        }
        seen
    }
}

pub struct InputDevice {
    dev: VirtioDevice,
    events: EventQueue,
}

impl InputDevice {
    /// Repassa teclas ao driver de teclado; devolve eventos lidos.
    pub fn drain(&mut self) -> usize {
        let mut ring = DeviceRing(&mut self.dev);
        self.events.drain(&mut ring, |ev| {
            if ev.ty == EV_KEY {
                keyboard::handle_key(ev.code, ev.value);
            }
        })
    }
}

pub fn probe(pci: PciDevice) -> Result<InputDevice, VirtioError> {
    let mut dev = VirtioDevice::init(pci, 0)?;
    let size = dev.setup_queue(0)?;
    dev.driver_ok();

    let mut events = EventQueue::new(EVENT_BUFFERS.min(size), size)?;
    events.prefill(&mut DeviceRing(&mut dev))?;
    Ok(InputDevice { dev, events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::virtio::virtqueue::sim::SimDevice;
    use crate::klib::bytes::{write_u16, write_u32};
    use std::vec::Vec;

    fn key(code: u16, value: u32) -> impl FnMut(&[super::super::virtqueue::sim::SimDesc]) -> u32 {
        move |chain| {
            let buf = chain[0].bytes();
            write_u16(buf, 0, EV_KEY);
            write_u16(buf, 2, code);
            write_u32(buf, 4, value);
            EVENT_SIZE as u32
        }
    }

    #[test]
    fn prefill_posts_every_buffer() {
        let mut vq = Virtqueue::new(8).unwrap();
        let mut q = EventQueue::new(8, 8).unwrap();
        q.prefill(&mut vq).unwrap();
        assert_eq!(vq.num_free(), 0);
    }

    #[test]
    fn events_are_delivered_and_buffers_recycled() {
        let mut vq = Virtqueue::new(4).unwrap();
        let mut dev = SimDevice::new();
        let mut q = EventQueue::new(4, 4).unwrap();
        q.prefill(&mut vq).unwrap();

        // o dispositivo consome 2 dos 4 buffers
        let mut n = 0;
        dev.process(&vq, |chain| {
            n += 1;
            if n <= 2 {
                key(30 + n as u16, 1)(chain)
            } else {
                0
            }
        });

        let mut got = Vec::new();
        let seen = q.drain(&mut vq, |ev| got.push(ev));
        // os dois vazios (len 0) só voltam para a fila
        assert_eq!(seen, 2);
        assert_eq!(
            got,
            vec![
                InputEvent { ty: EV_KEY, code: 31, value: 1 },
                InputEvent { ty: EV_KEY, code: 32, value: 1 },
            ]
        );
        assert_eq!(vq.num_free(), 0);

        // depois de reciclados os buffers continuam utilizáveis
        dev.process(&vq, key(44, 0));
        let mut again = Vec::new();
        q.drain(&mut vq, |ev| again.push(ev.code));
        assert_eq!(again, vec![44, 44, 44, 44]);
    }
}
