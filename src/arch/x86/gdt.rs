//! Global Descriptor Table (modelo flat) e Task State Segment.
//!
//! | Índice | Seletor | Descrição          |
//! |--------|---------|--------------------|
//! | 0      | 0x00    | Null               |
//! | 1      | 0x08    | Código kernel (DPL0) |
//! | 2      | 0x10    | Dados kernel (DPL0)  |
//! | 3      | 0x1B    | Código usuário (DPL3)|
//! | 4      | 0x23    | Dados usuário (DPL3) |
//! | 5      | 0x28    | TSS                |
//!
//! O TSS existe apenas para fornecer `ss0:esp0` nas transições ring 3 → 0.
//! `iomap_base` aponta para além do fim do TSS: sem bitmap de I/O, o acesso
//! a portas em ring 3 é decidido só pelo IOPL de EFLAGS.

use core::arch::asm;
use core::mem::size_of;
use core::ptr::{addr_of, addr_of_mut};

pub use crate::arch::trap::selectors::*;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    flags_limit_high: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            flags_limit_high: (flags & 0xF0) | (((limit >> 16) & 0x0F) as u8),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    const fn null() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

// Access bytes
const ACCESS_KERNEL_CODE: u8 = 0x9A;
const ACCESS_KERNEL_DATA: u8 = 0x92;
const ACCESS_USER_CODE: u8 = 0xFA;
const ACCESS_USER_DATA: u8 = 0xF2;
const ACCESS_TSS: u8 = 0x89;
// Granularidade 4K + 32 bits
const FLAGS_FLAT: u8 = 0xC0;

/// TSS de 32 bits (104 bytes).
#[repr(C, packed)]
pub struct Tss {
    prev_tss: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_tss: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SEL as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

static mut GDT: [GdtEntry; 6] = [GdtEntry::null(); 6];
static mut TSS: Tss = Tss::new();

#[repr(C, packed)]
struct GdtDescriptor {
    limit: u16,
    base: u32,
}

/// Monta e carrega a GDT, recarrega os segmentos e o Task Register.
///
/// # Safety
/// Uma única vez, no boot, com interrupções desabilitadas.
pub unsafe fn init() {
    crate::kdebug!("(GDT) Carregando GDT flat + TSS...");

    let tss_base = addr_of!(TSS) as u32;
    let tss_limit = (size_of::<Tss>() - 1) as u32;

    let gdt = &mut *addr_of_mut!(GDT);
    gdt[0] = GdtEntry::null();
    gdt[1] = GdtEntry::new(0, 0xFFFFF, ACCESS_KERNEL_CODE, FLAGS_FLAT);
    gdt[2] = GdtEntry::new(0, 0xFFFFF, ACCESS_KERNEL_DATA, FLAGS_FLAT);
    gdt[3] = GdtEntry::new(0, 0xFFFFF, ACCESS_USER_CODE, FLAGS_FLAT);
    gdt[4] = GdtEntry::new(0, 0xFFFFF, ACCESS_USER_DATA, FLAGS_FLAT);
    gdt[5] = GdtEntry::new(tss_base, tss_limit, ACCESS_TSS, 0);

    let descriptor = GdtDescriptor {
        limit: (size_of::<[GdtEntry; 6]>() - 1) as u16,
        base: addr_of!(GDT) as u32,
    };

    asm!(
        "lgdt [{desc}]",
        "mov ax, {data}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        "push {code}",
        "lea eax, [2f]",
        "push eax",
        "retf",
        "2:",
        "mov ax, {tss}",
        "ltr ax",
        desc = in(reg) &descriptor,
        data = const KERNEL_DATA_SEL,
        code = const KERNEL_CODE_SEL,
        tss = const TSS_SEL,
        out("eax") _,
    );

    crate::kinfo!("(GDT) Carregada. TSS em ", tss_base);
}

/// Atualiza `esp0` do TSS: stack usada na próxima entrada ring 3 → ring 0.
pub fn set_kernel_stack(esp0: u32) {
    // SAFETY: uniprocessador; chamado pelo scheduler com IRQs desabilitadas
    unsafe {
        (*addr_of_mut!(TSS)).esp0 = esp0;
    }
}
