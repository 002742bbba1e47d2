//! Interface Abstrata de CPU (HAL).
//!
//! Operações que a plataforma alvo (i686) e o stub hospedado (testes)
//! implementam. O resto do kernel só enxerga `crate::arch::Cpu`.

pub trait CpuOps {
    /// Para a execução até a próxima interrupção (HLT).
    fn halt();

    /// Desabilita interrupções globalmente (CLI).
    fn disable_interrupts();

    /// Habilita interrupções globalmente (STI).
    fn enable_interrupts();

    /// Verifica EFLAGS.IF.
    fn are_interrupts_enabled() -> bool;

    /// Endereço linear que causou o último page fault.
    fn read_cr2() -> usize;

    /// Diretório de páginas ativo (físico).
    fn read_cr3() -> usize;

    /// Troca o diretório ativo. Implica flush completo da TLB.
    ///
    /// # Safety
    /// `pd` deve apontar para um diretório válido que mapeie o kernel.
    unsafe fn write_cr3(pd: usize);

    /// Invalida uma única entrada da TLB.
    fn invlpg(virt: usize);

    /// Liga CR0.PG (e CR0.WP).
    ///
    /// # Safety
    /// CR3 precisa estar carregado com um diretório que identity-mapeie o kernel.
    unsafe fn enable_paging();

    /// Barreira de memória completa.
    #[inline]
    fn memory_barrier() {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Loop infinito de halt com interrupções desabilitadas.
    fn hang() -> ! {
        Self::disable_interrupts();
        loop {
            Self::halt();
        }
    }
}
