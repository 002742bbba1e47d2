//! # Hardware Abstraction Layer (HAL)
//!
//! Única ponte entre a lógica do kernel e o processador.
//!
//! | Alvo                   | Módulo    | Uso                           |
//! |------------------------|-----------|-------------------------------|
//! | `target_arch = "x86"`  | `x86`     | Kernel real (i686, ring 0)    |
//! | qualquer outro         | `hosted`  | Testes unitários no host      |
//!
//! `trap` é neutro: layout do `TrapFrame`, roteamento de vetores e a tabela
//! de handlers de IRQ. Os stubs assembly do `x86` apenas empilham o frame e
//! chamam `trap::trap_dispatch`.

pub mod port;
pub mod trap;
pub mod traits;

#[cfg(target_arch = "x86")]
pub mod x86;

#[cfg(target_arch = "x86")]
pub use x86 as platform;

#[cfg(not(target_arch = "x86"))]
pub mod hosted;

#[cfg(not(target_arch = "x86"))]
pub use hosted as platform;

pub use platform::ports;
pub use platform::Cpu;
pub use traits::*;
