//! Bitmap genérico (bit `i` = palavra `i / 64`, bit `i % 64`).
//!
//! O layout em memória, serializado em little-endian, é idêntico ao de
//! bitmaps em disco byte-a-byte (bit 0 do byte 0 = item 0), o que permite
//! reaproveitá-lo para o bitmap de clusters e de registros MFT do NTFS.

use alloc::vec;
use alloc::vec::Vec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// Bitmap com `bits` posições, todas livres.
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
            len: bits,
        }
    }

    /// Reconstrói a partir de bytes em disco. Bytes além de `bits` são ignorados.
    pub fn from_bytes(bytes: &[u8], bits: usize) -> Self {
        let mut bitmap = Self::new(bits);
        for index in 0..bits.min(bytes.len() * 8) {
            if bytes[index / 8] & (1 << (index % 8)) != 0 {
                bitmap.set(index);
            }
        }
        bitmap
    }

    /// Serializa em `len_bytes` bytes (preenchendo com zero).
    pub fn to_bytes(&self, len_bytes: usize) -> Vec<u8> {
        let mut out = vec![0u8; len_bytes];
        for (i, word) in self.words.iter().enumerate() {
            for (j, b) in word.to_le_bytes().iter().enumerate() {
                if let Some(slot) = out.get_mut(i * 8 + j) {
                    *slot = *b;
                }
            }
        }
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] &= !(1 << (index % 64));
        }
    }

    /// Fora do range conta como ocupado.
    #[inline]
    pub fn test(&self, index: usize) -> bool {
        if index >= self.len {
            return true;
        }
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Primeiro bit livre a partir de `start`.
    pub fn find_first_zero_from(&self, start: usize) -> Option<usize> {
        let mut index = start;
        while index < self.len {
            let word = self.words[index / 64] | ((1u64 << (index % 64)) - 1);
            if word != u64::MAX {
                let found = (index / 64) * 64 + word.trailing_ones() as usize;
                return (found < self.len).then_some(found);
            }
            index = (index / 64 + 1) * 64;
        }
        None
    }

    pub fn find_first_zero(&self) -> Option<usize> {
        self.find_first_zero_from(0)
    }

    /// Primeira sequência de `count` bits livres contíguos.
    pub fn find_zero_run(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let mut run_start = 0;
        let mut run_len = 0;
        for index in 0..self.len {
            if self.test(index) {
                run_len = 0;
                run_start = index + 1;
            } else {
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            }
        }
        None
    }

    pub fn set_range(&mut self, start: usize, count: usize) {
        for index in start..start.saturating_add(count).min(self.len) {
            self.set(index);
        }
    }

    pub fn clear_range(&mut self, start: usize, count: usize) {
        for index in start..start.saturating_add(count).min(self.len) {
            self.clear(index);
        }
    }

    pub fn count_ones(&self) -> usize {
        (0..self.len).filter(|&i| self.test(i)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_zero_skips_full_words() {
        let mut bm = Bitmap::new(130);
        bm.set_range(0, 70);
        assert_eq!(bm.find_first_zero(), Some(70));
        assert_eq!(bm.find_first_zero_from(71), Some(71));
        bm.set_range(70, 60);
        assert_eq!(bm.find_first_zero(), None);
    }

    #[test]
    fn zero_run_requires_contiguity() {
        let mut bm = Bitmap::new(16);
        bm.set(2);
        bm.set(5);
        assert_eq!(bm.find_zero_run(2), Some(0));
        assert_eq!(bm.find_zero_run(3), Some(6));
        assert_eq!(bm.find_zero_run(11), None);
    }

    #[test]
    fn byte_layout_matches_disk_bitmaps() {
        let bm = Bitmap::from_bytes(&[0b0000_0101, 0x80], 16);
        assert!(bm.test(0));
        assert!(!bm.test(1));
        assert!(bm.test(2));
        assert!(bm.test(15));
        assert_eq!(bm.to_bytes(3), alloc::vec![0b0000_0101, 0x80, 0]);
    }

    #[test]
    fn out_of_range_reads_as_used() {
        let bm = Bitmap::new(8);
        assert!(bm.test(8));
    }
}
