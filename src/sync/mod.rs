//! # Synchronization Primitives
//!
//! ```text
//! Spinlock     → estado do kernel tocado por IRQs (task table, PMM, IPC)
//! spin::Mutex  → singletons de dispositivos (GPU, ATA, volumes montados)
//! spin::Once   → inicialização única no boot
//! ```
//!
//! Sem SMP: a exclusão real vem de desabilitar interrupções dentro do
//! `Spinlock`. `spin::Mutex` é usado só onde nenhum handler de IRQ toca o
//! dado.

pub mod spinlock;

pub use spin::{Mutex, MutexGuard, Once};
pub use spinlock::{Spinlock, SpinlockGuard};
