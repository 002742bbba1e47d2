//! Interrupt Descriptor Table (256 gates de 32 bits).

use core::arch::asm;
use core::mem::size_of;
use core::ptr::{addr_of, addr_of_mut};

use super::interrupts::{isr_stub_128, isr_stub_table};
use crate::arch::trap::selectors::KERNEL_CODE_SEL;
use crate::arch::trap::SYSCALL_VECTOR;

/// Interrupt gate, DPL0, presente (IF é limpo na entrada).
const GATE_INTERRUPT: u8 = 0x8E;
/// Trap gate, DPL3, presente: syscalls entram com IF preservado.
const GATE_SYSCALL: u8 = 0xEF;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SEL,
            zero: 0,
            type_attr,
            offset_high: (handler >> 16) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtDescriptor {
    limit: u16,
    base: u32,
}

static mut IDT: [IdtEntry; 256] = [IdtEntry::missing(); 256];

/// Preenche exceções (0..31), IRQs (32..47) e o gate de syscall, e carrega.
///
/// # Safety
/// Uma única vez no boot, depois da GDT.
pub unsafe fn init() {
    let idt = &mut *addr_of_mut!(IDT);
    let stubs = &*addr_of!(isr_stub_table);

    for (vector, &stub) in stubs.iter().enumerate() {
        idt[vector] = IdtEntry::new(stub, GATE_INTERRUPT);
    }
    idt[SYSCALL_VECTOR as usize] = IdtEntry::new(isr_stub_128 as usize as u32, GATE_SYSCALL);

    let descriptor = IdtDescriptor {
        limit: (size_of::<[IdtEntry; 256]>() - 1) as u16,
        base: addr_of!(IDT) as u32,
    };
    asm!("lidt [{}]", in(reg) &descriptor, options(readonly, nostack, preserves_flags));

    crate::kinfo!("(IDT) Carregada: 48 vetores + syscall 0x80");
}
