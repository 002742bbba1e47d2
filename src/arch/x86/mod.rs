//! Implementação i686 da HAL.
//!
//! - `cpu`: instruções privilegiadas (CLI/STI/HLT, CR2/CR3, INVLPG)
//! - `ports`: I/O de porta
//! - `gdt`: GDT de 6 entradas + TSS (esp0 trocado a cada context switch)
//! - `idt`: 256 gates, syscall em 0x80 com DPL=3
//! - `interrupts`: stubs assembly que montam o `TrapFrame`
//! - `context`: troca de contexto e trampolins de entrada de tarefas

pub mod context;
pub mod cpu;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod ports;

pub use cpu::X86Cpu as Cpu;

/// Inicializa GDT/TSS e IDT.
///
/// # Safety
/// Chamado uma única vez no boot, com interrupções desabilitadas.
pub unsafe fn init() {
    gdt::init();
    idt::init();
}
