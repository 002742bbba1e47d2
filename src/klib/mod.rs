//! Kernel Library (KLib).
//!
//! Utilitários agnósticos de hardware: alinhamento, bitmaps, leitura de
//! estruturas empacotadas em disco, nomes de tamanho fixo e o framework de
//! self-test.

pub mod bitmap;
pub mod bytes;
pub mod string;
pub mod test_framework;

pub use bitmap::Bitmap;

/// Alinha para cima. `align` deve ser potência de dois.
#[inline]
pub const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

/// Alinha para baixo. `align` deve ser potência de dois.
#[inline]
pub const fn align_down(addr: usize, align: usize) -> usize {
    addr & !(align - 1)
}

#[inline]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    (addr & (align - 1)) == 0
}

/// Divisão arredondando para cima.
#[inline]
pub const fn div_ceil(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(10, 4), 12);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_down(4097, 4096), 4096);
        assert!(is_aligned(0x2000, 0x1000));
        assert!(!is_aligned(0x2001, 0x1000));
        assert_eq!(div_ceil(513, 512), 2);
    }
}
