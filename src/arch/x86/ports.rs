//! Instruções `in`/`out` do i686.
//!
//! Usadas pelo PIC, PIT, serial, ATA e pelo mecanismo #1 de configuração PCI.
//! `io_wait` escreve na porta 0x80 (POST) para dar um ciclo de barramento.

use core::arch::asm;

#[inline]
pub fn inb(port: u16) -> u8 {
    let value: u8;
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
    }
    value
}

#[inline]
pub fn outb(port: u16, value: u8) {
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
    }
}

#[inline]
pub fn inw(port: u16) -> u16 {
    let value: u16;
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("in ax, dx", in("dx") port, out("ax") value, options(nomem, nostack, preserves_flags));
    }
    value
}

#[inline]
pub fn outw(port: u16, value: u16) {
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("out dx, ax", in("dx") port, in("ax") value, options(nomem, nostack, preserves_flags));
    }
}

#[inline]
pub fn inl(port: u16) -> u32 {
    let value: u32;
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("in eax, dx", in("dx") port, out("eax") value, options(nomem, nostack, preserves_flags));
    }
    value
}

#[inline]
pub fn outl(port: u16, value: u32) {
    // SAFETY: I/O de porta não acessa memória
    unsafe {
        asm!("out dx, eax", in("dx") port, in("eax") value, options(nomem, nostack, preserves_flags));
    }
}

/// Pequeno atraso de barramento (ex: entre ICWs do PIC).
#[inline]
pub fn io_wait() {
    outb(0x80, 0);
}
