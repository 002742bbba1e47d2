//! Strings de tamanho fixo e formatação sem `core::fmt`.

/// Nome ASCII/UTF-8 de até `N` bytes guardado inline (sem alocação).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedName<const N: usize> {
    bytes: [u8; N],
    len: u8,
}

impl<const N: usize> FixedName<N> {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Copia `s`, truncando em `N` bytes (sem partir caracteres UTF-8).
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut name = Self::empty();
        name.bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        name.len = end as u8;
        name
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("?")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl<const N: usize> core::fmt::Debug for FixedName<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formata `value` em decimal no fim de `buf` e devolve a fatia usada.
pub fn format_dec(mut value: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &buf[pos..]
}

/// Último componente de um caminho (`/boot/console.elf` → `console.elf`).
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lê uma string C (terminada em NUL) de um buffer.
pub fn from_cstr(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    core::str::from_utf8(&buf[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_name_truncates() {
        let name: FixedName<4> = FixedName::new("console");
        assert_eq!(name.as_str(), "cons");
        let utf8: FixedName<2> = FixedName::new("ção");
        assert_eq!(utf8.as_str(), "ç");
    }

    #[test]
    fn decimal_formatting() {
        let mut buf = [0u8; 20];
        assert_eq!(format_dec(0, &mut buf), b"0");
        assert_eq!(format_dec(1234567, &mut buf), b"1234567");
        assert_eq!(format_dec(u64::MAX, &mut buf), b"18446744073709551615");
    }

    #[test]
    fn basename_and_cstr() {
        assert_eq!(basename("/boot/console.elf"), "console.elf");
        assert_eq!(basename("vfs"), "vfs");
        assert_eq!(from_cstr(b"abc\0def"), "abc");
    }
}
