//! Leitura e escrita little-endian em buffers de setor.
//!
//! Estruturas em disco (BPB, entradas de diretório, registros MFT) são
//! acessadas por offset em vez de `#[repr(packed)]` + transmute: offsets fora
//! do buffer retornam 0 na leitura e são ignorados na escrita.

#[inline]
pub fn read_u8(buf: &[u8], off: usize) -> u8 {
    buf.get(off).copied().unwrap_or(0)
}

#[inline]
pub fn read_u16(buf: &[u8], off: usize) -> u16 {
    match buf.get(off..off + 2) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

#[inline]
pub fn read_u32(buf: &[u8], off: usize) -> u32 {
    match buf.get(off..off + 4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

#[inline]
pub fn read_u64(buf: &[u8], off: usize) -> u64 {
    match buf.get(off..off + 8) {
        Some(b) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            u64::from_le_bytes(raw)
        }
        None => 0,
    }
}

#[inline]
pub fn read_i8(buf: &[u8], off: usize) -> i8 {
    read_u8(buf, off) as i8
}

#[inline]
pub fn write_u8(buf: &mut [u8], off: usize, value: u8) {
    if let Some(slot) = buf.get_mut(off) {
        *slot = value;
    }
}

#[inline]
pub fn write_u16(buf: &mut [u8], off: usize, value: u16) {
    if let Some(slot) = buf.get_mut(off..off + 2) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
}

#[inline]
pub fn write_u32(buf: &mut [u8], off: usize, value: u32) {
    if let Some(slot) = buf.get_mut(off..off + 4) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
}

#[inline]
pub fn write_u64(buf: &mut [u8], off: usize, value: u64) {
    if let Some(slot) = buf.get_mut(off..off + 8) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
}

/// Lê um inteiro com sinal de `len` bytes (1..=8), little-endian.
pub fn read_signed(buf: &[u8], off: usize, len: usize) -> i64 {
    if len == 0 || len > 8 {
        return 0;
    }
    let mut value: u64 = 0;
    for i in 0..len {
        value |= (read_u8(buf, off + i) as u64) << (8 * i);
    }
    let shift = 64 - 8 * len as u32;
    ((value << shift) as i64) >> shift
}

/// Lê um inteiro sem sinal de `len` bytes (1..=8), little-endian.
pub fn read_unsigned(buf: &[u8], off: usize, len: usize) -> u64 {
    let mut value: u64 = 0;
    for i in 0..len.min(8) {
        value |= (read_u8(buf, off + i) as u64) << (8 * i);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_end_are_zero() {
        let buf = [0x34, 0x12];
        assert_eq!(read_u16(&buf, 0), 0x1234);
        assert_eq!(read_u16(&buf, 1), 0);
        assert_eq!(read_u32(&buf, 0), 0);
    }

    #[test]
    fn signed_values_sign_extend() {
        assert_eq!(read_signed(&[0xFF], 0, 1), -1);
        assert_eq!(read_signed(&[0x00, 0x80], 0, 2), -32768);
        assert_eq!(read_signed(&[0x10, 0x27], 0, 2), 10000);
        assert_eq!(read_unsigned(&[0x00, 0x80, 0x01], 0, 3), 0x018000);
    }
}
