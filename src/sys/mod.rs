//! Definições de sistema compartilhadas por todos os subsistemas.

pub mod error;
pub mod types;

pub use error::{Errno, SYSCALL_FAILURE};
pub use types::{Pid, Tick};
