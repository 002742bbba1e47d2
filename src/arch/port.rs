//! Porta de I/O tipada.
//!
//! Wrapper fino sobre `inb/outb/...` para drivers que guardam suas portas
//! como campos (PIC, PIT, ATA).

use core::marker::PhantomData;

use super::ports;

/// Largura de dado aceita por uma porta de I/O.
pub trait PortValue: Copy {
    /// # Safety
    /// Acesso direto a hardware.
    unsafe fn read_from(port: u16) -> Self;
    /// # Safety
    /// Acesso direto a hardware.
    unsafe fn write_to(port: u16, value: Self);
}

impl PortValue for u8 {
    unsafe fn read_from(port: u16) -> Self {
        ports::inb(port)
    }
    unsafe fn write_to(port: u16, value: Self) {
        ports::outb(port, value)
    }
}

impl PortValue for u16 {
    unsafe fn read_from(port: u16) -> Self {
        ports::inw(port)
    }
    unsafe fn write_to(port: u16, value: Self) {
        ports::outw(port, value)
    }
}

impl PortValue for u32 {
    unsafe fn read_from(port: u16) -> Self {
        ports::inl(port)
    }
    unsafe fn write_to(port: u16, value: Self) {
        ports::outl(port, value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Port<T: PortValue> {
    port: u16,
    _width: PhantomData<T>,
}

impl<T: PortValue> Port<T> {
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            _width: PhantomData,
        }
    }

    /// # Safety
    /// A porta deve pertencer ao dispositivo que o caller controla.
    #[inline]
    pub unsafe fn read(&self) -> T {
        T::read_from(self.port)
    }

    /// # Safety
    /// A porta deve pertencer ao dispositivo que o caller controla.
    #[inline]
    pub unsafe fn write(&mut self, value: T) {
        T::write_to(self.port, value)
    }
}
