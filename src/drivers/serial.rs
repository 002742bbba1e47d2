// =============================================================================
// SERIAL DRIVER - COM1
// =============================================================================
//
// Sink de bytes do sistema de logs do kernel.
//
// ARQUITETURA:
// - SEM lock: cada byte é escrito direto na UART (logs podem intercalar
//   entre uma IRQ e o código interrompido, o que é aceitável)
// - SEM core::fmt: números são convertidos à mão (hex e decimal)
// - SEM alocação
//
// FUNÇÕES DISPONÍVEIS:
// - emit(byte)       : Envia um byte
// - emit_str(s)      : Envia string
// - emit_hex(v)      : 0x + 8 dígitos (ou 16 se não couber em 32 bits)
// - emit_dec(v)      : Decimal sem zeros à esquerda
// - emit_nl()        : \r\n
//
// =============================================================================

use crate::arch::ports::{inb, outb};

const COM1_DATA: u16 = 0x3F8;
const COM1_STATUS: u16 = COM1_DATA + 5;
const LSR_THR_EMPTY: u8 = 0x20;
const LSR_DATA_READY: u8 = 0x01;

/// Configura COM1: 38400 baud, 8N1, FIFO.
pub fn init() {
    outb(COM1_DATA + 1, 0x00); // sem IRQs
    outb(COM1_DATA + 3, 0x80); // DLAB
    outb(COM1_DATA, 0x03); // divisor 3 = 38400
    outb(COM1_DATA + 1, 0x00);
    outb(COM1_DATA + 3, 0x03); // 8N1
    outb(COM1_DATA + 2, 0xC7); // FIFO, limpa, limiar 14
    outb(COM1_DATA + 4, 0x0B);
}

#[inline]
pub fn emit(byte: u8) {
    while inb(COM1_STATUS) & LSR_THR_EMPTY == 0 {
        core::hint::spin_loop();
    }
    outb(COM1_DATA, byte);
}

pub fn emit_bytes(bytes: &[u8]) {
    for &b in bytes {
        emit(b);
    }
}

pub fn emit_str(s: &str) {
    emit_bytes(s.as_bytes());
}

pub fn emit_nl() {
    emit(b'\r');
    emit(b'\n');
}

pub fn emit_hex(value: u64) {
    let digits = if value > u32::MAX as u64 { 16 } else { 8 };
    emit(b'0');
    emit(b'x');
    for i in (0..digits).rev() {
        let nibble = ((value >> (i * 4)) & 0xF) as u8;
        emit(if nibble < 10 { b'0' + nibble } else { b'A' + nibble - 10 });
    }
}

pub fn emit_dec(value: u64) {
    let mut buf = [0u8; 20];
    let text = crate::klib::string::format_dec(value, &mut buf);
    emit_bytes(text);
}

/// Lê um byte se houver (console de depuração).
pub fn try_read() -> Option<u8> {
    if inb(COM1_STATUS) & LSR_DATA_READY != 0 {
        Some(inb(COM1_DATA))
    } else {
        None
    }
}
