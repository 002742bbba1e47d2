//! RTL8139: apenas presença e contagem de IRQs.
//!
//! Não há pilha de rede. O driver liga o chip o suficiente para que ele
//! gere interrupções, reconhece cada uma no ISR e conta. O servidor `net`
//! recebe as mesmas IRQs por IPC.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::arch::port::Port;
use crate::drivers::pci::{self, PortConfig, DEVICE_RTL8139, VENDOR_REALTEK};

const REG_MAC0: u16 = 0x00;
const REG_CMD: u16 = 0x37;
const REG_IMR: u16 = 0x3C;
const REG_ISR: u16 = 0x3E;
const REG_CONFIG1: u16 = 0x52;

const CMD_RESET: u8 = 0x10;
const CMD_RX_ENABLE: u8 = 0x08;
const CMD_TX_ENABLE: u8 = 0x04;

/// ROK | TOK | RER | TER | RX overflow | link change.
const IMR_DEFAULT: u16 = 0x003F | 0x2000;

const RESET_SPINS: u32 = 100_000;

/// 0 = ausente.
static IO_BASE: AtomicU16 = AtomicU16::new(0);
static IRQ_LINE: AtomicU8 = AtomicU8::new(0xFF);
static IRQ_COUNT: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetStatus {
    pub present: bool,
    pub irq: u8,
    pub irq_count: u32,
    pub mac: [u8; 6],
}

impl NetStatus {
    /// Forma compacta para a syscall `net_status`:
    /// bit 31 = presente, bits 16..24 = IRQ, bits 0..16 = contagem.
    pub fn pack(&self) -> u32 {
        if !self.present {
            return 0;
        }
        (1 << 31) | ((self.irq as u32) << 16) | (self.irq_count & 0xFFFF)
    }
}

fn reg8(off: u16) -> Port<u8> {
    Port::new(IO_BASE.load(Ordering::Relaxed) + off)
}

fn reg16(off: u16) -> Port<u16> {
    Port::new(IO_BASE.load(Ordering::Relaxed) + off)
}

pub fn init() -> bool {
    let Some(dev) = pci::find_device(VENDOR_REALTEK, DEVICE_RTL8139) else {
        crate::kdebug!("(NET) RTL8139 ausente");
        return false;
    };
    let Some(io) = dev.io_bar(0) else {
        crate::kwarn!("(NET) RTL8139 sem BAR de I/O");
        return false;
    };
    dev.enable_bus_master(&PortConfig);
    IO_BASE.store(io, Ordering::SeqCst);
    IRQ_LINE.store(dev.irq_line, Ordering::SeqCst);

    // SAFETY: registradores do chip encontrado no BAR 0
    unsafe {
        reg8(REG_CONFIG1).write(0);
        reg8(REG_CMD).write(CMD_RESET);
        let mut spins = 0;
        while reg8(REG_CMD).read() & CMD_RESET != 0 && spins < RESET_SPINS {
            spins += 1;
        }
        reg16(REG_IMR).write(IMR_DEFAULT);
        reg8(REG_CMD).write(CMD_RX_ENABLE | CMD_TX_ENABLE);
    }

    if (dev.irq_line as usize) < crate::arch::trap::IRQ_COUNT {
        crate::arch::trap::register_irq_handler(dev.irq_line, handle_irq);
    }
    crate::kinfo!("(NET) RTL8139 em io=", io);
    crate::kinfo!("(NET) IRQ=", dev.irq_line);
    true
}

fn handle_irq(_irq: u8) {
    IRQ_COUNT.fetch_add(1, Ordering::Relaxed);
    // SAFETY: só registrado depois do init
    unsafe {
        let isr = reg16(REG_ISR).read();
        reg16(REG_ISR).write(isr);
    }
}

pub fn is_present() -> bool {
    IO_BASE.load(Ordering::Relaxed) != 0
}

pub fn irq_line() -> Option<u8> {
    is_present().then(|| IRQ_LINE.load(Ordering::Relaxed))
}

pub fn status() -> NetStatus {
    let present = is_present();
    let mut mac = [0u8; 6];
    if present {
        for (i, byte) in mac.iter_mut().enumerate() {
            // SAFETY: IDR0..IDR5 do chip presente
            *byte = unsafe { reg8(REG_MAC0 + i as u16).read() };
        }
    }
    NetStatus {
        present,
        irq: IRQ_LINE.load(Ordering::Relaxed),
        irq_count: IRQ_COUNT.load(Ordering::Relaxed),
        mac,
    }
}

/// Contagem atual de IRQs (`net_poll`).
pub fn irq_count() -> u32 {
    IRQ_COUNT.load(Ordering::Relaxed)
}
