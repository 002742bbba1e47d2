//! Panic Handler.
//!
//! Último recurso quando o kernel chega a um estado irrecuperável:
//!
//! 1. desliga interrupções (nada de panic aninhado por IRQ);
//! 2. manda local e mensagem para a COM1;
//! 3. pinta a primeira linha da tela VGA em vermelho;
//! 4. trava a CPU.

use core::fmt::Write;
use core::panic::PanicInfo;

use crate::arch::{Cpu, CpuOps};
use crate::drivers::{serial, vga};

/// Adaptador `fmt::Write` para a serial (só aqui o kernel usa `core::fmt`).
struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        serial::emit_str(s);
        Ok(())
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    Cpu::disable_interrupts();

    let mut out = SerialWriter;
    let _ = write!(out, "\n\x1b[1;31m[PANIC]\x1b[0m ");
    if let Some(loc) = info.location() {
        let _ = write!(out, "{}:{}: ", loc.file(), loc.line());
    }
    let _ = writeln!(out, "{}", info.message());

    // SAFETY: interrupções desligadas, ninguém mais escreve na tela
    let mut screen = unsafe { vga::TextWriter::screen(vga::ATTR_PANIC) };
    screen.clear_row(0);
    let _ = write!(screen, "KERNEL PANIC: {}", info.message());

    Cpu::hang();
}
