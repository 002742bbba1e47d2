//! Constantes de configuração do Scheduler

/// Número máximo de tasks (pids 1..=MAX_TASKS).
pub const MAX_TASKS: usize = 64;

/// Frequência do timer (ticks por segundo).
pub const TIMER_HZ: u32 = 100;

/// Classes de prioridade: 0 = realtime ... 3 = idle.
pub const PRIORITY_REALTIME: u8 = 0;
pub const PRIORITY_HIGH: u8 = 1;
pub const PRIORITY_NORMAL: u8 = 2;
pub const PRIORITY_IDLE: u8 = 3;
pub const PRIORITY_LEVELS: usize = 4;

/// Tamanho da stack de kernel de cada task (heap).
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;

/// Quantum em ticks antes de rodar entre iguais.
pub const DEFAULT_QUANTUM: u32 = 5;

/// Ticks que uma task terminada fica visível antes do reaper da idle.
pub const ZOMBIE_TTL_TICKS: u64 = 5 * TIMER_HZ as u64;
