//! Console de texto VGA (80x25), só para o panic.
//!
//! O servidor `console` escreve direto no buffer mapeado em
//! `VGA_USER_VA`; o kernel só toca aqui quando não há mais ninguém.

use core::fmt;
use core::ptr::write_volatile;

use crate::mm::config::VGA_TEXT_PHYS;

pub const COLS: usize = 80;
pub const ROWS: usize = 25;

/// Branco sobre vermelho.
pub const ATTR_PANIC: u8 = 0x4F;
pub const ATTR_NORMAL: u8 = 0x07;

pub struct TextWriter {
    base: *mut u16,
    row: usize,
    col: usize,
    attr: u8,
}

impl TextWriter {
    /// # Safety
    /// `base` aponta para `COLS * ROWS` células graváveis.
    pub unsafe fn new(base: *mut u16, attr: u8) -> Self {
        Self { base, row: 0, col: 0, attr }
    }

    /// O buffer físico em 0xB8000 (identity-mapeado).
    ///
    /// # Safety
    /// Chamador garante acesso exclusivo à tela.
    pub unsafe fn screen(attr: u8) -> Self {
        Self::new(VGA_TEXT_PHYS as usize as *mut u16, attr)
    }

    fn put(&mut self, row: usize, col: usize, byte: u8) {
        let cell = (self.attr as u16) << 8 | byte as u16;
        // SAFETY: row < ROWS, col < COLS
        unsafe { write_volatile(self.base.add(row * COLS + col), cell) };
    }

    /// Pinta a linha `row` inteira com espaços na cor atual.
    pub fn clear_row(&mut self, row: usize) {
        for col in 0..COLS {
            self.put(row % ROWS, col, b' ');
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.col = 0;
                self.row = (self.row + 1) % ROWS;
            }
            _ => {
                if self.col == COLS {
                    self.col = 0;
                    self.row = (self.row + 1) % ROWS;
                }
                let byte = if byte.is_ascii_graphic() || byte == b' ' { byte } else { b'?' };
                self.put(self.row, self.col, byte);
                self.col += 1;
            }
        }
    }
}

impl fmt::Write for TextWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(|b| self.write_byte(b));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn writes_cells_with_attribute_and_wraps() {
        let mut cells = vec![0u16; COLS * ROWS];
        let mut w = unsafe { TextWriter::new(cells.as_mut_ptr(), ATTR_PANIC) };
        w.clear_row(0);
        write!(w, "PANIC\nx").unwrap();
        assert_eq!(cells[0], 0x4F00 | b'P' as u16);
        assert_eq!(cells[5], 0x4F00 | b' ' as u16);
        assert_eq!(cells[COLS], 0x4F00 | b'x' as u16);

        let mut w = unsafe { TextWriter::new(cells.as_mut_ptr(), ATTR_NORMAL) };
        for _ in 0..COLS + 1 {
            w.write_byte(b'#');
        }
        assert_eq!(cells[COLS], 0x0700 | b'#' as u16);
        w.write_byte(0x01);
        assert_eq!(cells[COLS + 1], 0x0700 | b'?' as u16);
    }
}
