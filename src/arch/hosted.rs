//! Plataforma hospedada: usada apenas para compilar e testar a lógica do
//! kernel fora do hardware.
//!
//! Portas lêem `0xFF` (barramento flutuante), CR3 é um registrador
//! simulado e a troca de contexto não faz nada.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::traits::cpu::CpuOps;

static INTERRUPTS: AtomicBool = AtomicBool::new(false);
static CR3: AtomicUsize = AtomicUsize::new(0);

pub struct HostedCpu;

pub use HostedCpu as Cpu;

impl CpuOps for HostedCpu {
    fn halt() {
        core::hint::spin_loop();
    }

    fn disable_interrupts() {
        INTERRUPTS.store(false, Ordering::SeqCst);
    }

    fn enable_interrupts() {
        INTERRUPTS.store(true, Ordering::SeqCst);
    }

    fn are_interrupts_enabled() -> bool {
        INTERRUPTS.load(Ordering::SeqCst)
    }

    fn read_cr2() -> usize {
        0
    }

    fn read_cr3() -> usize {
        CR3.load(Ordering::SeqCst)
    }

    unsafe fn write_cr3(pd: usize) {
        CR3.store(pd, Ordering::SeqCst);
    }

    fn invlpg(_virt: usize) {}

    unsafe fn enable_paging() {}
}

pub mod ports {
    pub fn inb(_port: u16) -> u8 {
        0xFF
    }
    pub fn outb(_port: u16, _value: u8) {}
    pub fn inw(_port: u16) -> u16 {
        0xFFFF
    }
    pub fn outw(_port: u16, _value: u16) {}
    pub fn inl(_port: u16) -> u32 {
        0xFFFF_FFFF
    }
    pub fn outl(_port: u16, _value: u32) {}
    pub fn io_wait() {}
}

pub mod context {
    pub type TaskEntry = extern "C" fn();

    /// # Safety
    /// Sem efeito no host.
    pub unsafe fn switch(_old_esp: *mut usize, _new_esp: usize) {}

    /// # Safety
    /// Sem efeito no host.
    pub unsafe fn prepare_kernel_stack(stack_top: usize, _entry: TaskEntry) -> usize {
        stack_top
    }

    /// # Safety
    /// Sem efeito no host.
    pub unsafe fn prepare_user_stack(kstack_top: usize, _eip: u32, _user_esp: u32, _iopl: bool) -> usize {
        kstack_top
    }
}

pub mod gdt {
    pub fn set_kernel_stack(_esp0: u32) {}
}

/// # Safety
/// Sem efeito no host.
pub unsafe fn init() {}
