//! Traits da camada de abstração de hardware.

pub mod cpu;

pub use cpu::CpuOps;
