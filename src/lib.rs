//! Basalt Kernel Library.
//!
//! Microkernel i686: o kernel cuida de memória, tarefas, IPC e interrupções;
//! console, VFS, disco e rede rodam como servidores que falam por mensagens.
//!
//! Nos testes do host (`cargo test`) o crate compila com `std` e a camada
//! `arch::hosted` no lugar do hardware.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// --- Baixo nível (hardware) ---
pub mod arch; // HAL (CPU, GDT, IDT, traps)
pub mod drivers; // PIC, PIT, serial, ATA, PCI, VirtIO, RTL8139

// --- Núcleo ---
pub mod core; // Boot, panic, logs, servidores embutidos
pub mod klib; // Utilitários (bitmaps, bytes, self-test)
pub mod mm; // PMM, paginação, heap
pub mod sync; // Spinlock com IRQs desligadas
pub mod sys; // Errno, Pid, tipos da ABI

// --- Subsistemas ---
pub mod fs; // VFS, RAMFS, procfs, FAT16, NTFS
pub mod gui; // Janelas compartilhadas com o compositor
pub mod ipc; // Rendezvous, serviços, IRQs para userspace
pub mod sched; // Tarefas, escalonador, carregador ELF
pub mod syscall; // int 0x80
