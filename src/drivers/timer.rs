//! Driver do PIT (Intel 8253/8254), canal 0.
//!
//! # Responsabilidades
//! 1. Gerar o heartbeat do sistema (IRQ 0) a `TIMER_HZ`.
//! 2. Contar ticks desde o boot (relógio monotônico).
//! 3. Acionar o scheduler para preempção.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::arch::port::Port;
use crate::sched::config::TIMER_HZ;
use crate::sys::Errno;

/// Frequência base do oscilador (1.193182 MHz).
const BASE_FREQUENCY: u32 = 1_193_182;

const PORT_CHANNEL0: u16 = 0x40;
const PORT_COMMAND: u16 = 0x43;
/// Canal 0, lobyte/hibyte, modo 3 (square wave).
const CMD_CHANNEL0_SQUARE: u8 = 0x36;

/// Ticks desde o boot.
pub static TICKS: AtomicU64 = AtomicU64::new(0);

/// Divisor de 16 bits para a frequência pedida.
pub fn divisor_for(freq: u32) -> Result<u16, Errno> {
    if freq == 0 || freq > BASE_FREQUENCY {
        return Err(Errno::EINVAL);
    }
    let divisor = BASE_FREQUENCY / freq;
    if divisor > u16::MAX as u32 {
        return Err(Errno::EINVAL);
    }
    Ok(divisor as u16)
}

/// Programa o canal 0 e registra a frequência.
pub fn init(freq: u32) -> Result<(), Errno> {
    let divisor = divisor_for(freq)?;
    let mut command: Port<u8> = Port::new(PORT_COMMAND);
    let mut channel0: Port<u8> = Port::new(PORT_CHANNEL0);
    // SAFETY: boot, acesso exclusivo ao PIT
    unsafe {
        command.write(CMD_CHANNEL0_SQUARE);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }
    crate::drivers::pic::unmask(0);
    crate::kinfo!("(PIT) Timer programado, divisor=", divisor);
    Ok(())
}

/// IRQ 0: conta o tick e entrega ao scheduler.
pub fn handle_timer_interrupt() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    crate::sched::on_timer_tick();
}

#[inline]
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Converte milissegundos em ticks, arredondando para cima.
pub fn ms_to_ticks(ms: u64) -> u64 {
    (ms * TIMER_HZ as u64).div_ceil(1000)
}

/// Milissegundos desde o boot.
pub fn uptime_ms() -> u64 {
    ticks() * 1000 / TIMER_HZ as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_100hz() {
        assert_eq!(divisor_for(100), Ok(11931));
    }

    #[test]
    fn divisor_rejects_out_of_range() {
        assert_eq!(divisor_for(0), Err(Errno::EINVAL));
        assert_eq!(divisor_for(10), Err(Errno::EINVAL));
    }

    #[test]
    fn ms_round_up_to_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(10), 1);
        assert_eq!(ms_to_ticks(15), 2);
        assert_eq!(ms_to_ticks(1000), 100);
    }
}
