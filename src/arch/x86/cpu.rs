//! Operações de CPU do i686 (modo protegido, ring 0).

use crate::arch::traits::cpu::CpuOps;
use core::arch::asm;

/// Bit IF de EFLAGS.
const EFLAGS_IF: u32 = 1 << 9;
/// CR0.PG
const CR0_PG: u32 = 1 << 31;
/// CR0.WP - ring 0 respeita páginas read-only
const CR0_WP: u32 = 1 << 16;

pub struct X86Cpu;

impl CpuOps for X86Cpu {
    #[inline]
    fn halt() {
        // SAFETY: HLT apenas espera a próxima interrupção
        unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }

    #[inline]
    fn disable_interrupts() {
        // SAFETY: CLI em ring 0
        unsafe { asm!("cli", options(nomem, nostack)) };
    }

    #[inline]
    fn enable_interrupts() {
        // SAFETY: STI em ring 0
        unsafe { asm!("sti", options(nomem, nostack)) };
    }

    #[inline]
    fn are_interrupts_enabled() -> bool {
        let flags: u32;
        // SAFETY: leitura de EFLAGS via pilha
        unsafe { asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags)) };
        flags & EFLAGS_IF != 0
    }

    #[inline]
    fn read_cr2() -> usize {
        let value: usize;
        // SAFETY: leitura de registrador de controle
        unsafe { asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags)) };
        value
    }

    #[inline]
    fn read_cr3() -> usize {
        let value: usize;
        // SAFETY: leitura de registrador de controle
        unsafe { asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags)) };
        value
    }

    #[inline]
    unsafe fn write_cr3(pd: usize) {
        asm!("mov cr3, {}", in(reg) pd, options(nostack, preserves_flags));
    }

    #[inline]
    fn invlpg(virt: usize) {
        // SAFETY: invalidar uma entrada da TLB nunca quebra invariantes de memória
        unsafe { asm!("invlpg [{}]", in(reg) virt, options(nostack, preserves_flags)) };
    }

    unsafe fn enable_paging() {
        let mut cr0: u32;
        asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        cr0 |= CR0_PG | CR0_WP;
        asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
    }
}
