//! # Data runs
//!
//! Cada run começa com um byte de cabeçalho:
//!
//! ```text
//!   bits 7..4  bytes do deslocamento de LCN (com sinal, relativo ao run anterior)
//!   bits 3..0  bytes do comprimento em clusters
//! ```
//!
//! Deslocamento com 0 bytes = run esparso. Cabeçalho 0 encerra a lista.

use alloc::vec::Vec;

use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_signed, read_unsigned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// `None` em runs esparsos
    pub lcn: Option<u64>,
    pub length: u64,
}

impl Run {
    pub const fn new(lcn: u64, length: u64) -> Self {
        Self {
            lcn: Some(lcn),
            length,
        }
    }

    pub const fn sparse(length: u64) -> Self {
        Self { lcn: None, length }
    }
}

pub fn decode(buf: &[u8]) -> FsResult<Vec<Run>> {
    let mut runs = Vec::new();
    let mut pos = 0;
    let mut lcn: i64 = 0;

    loop {
        let header = *buf.get(pos).ok_or(FsError::Corrupt)?;
        if header == 0 {
            return Ok(runs);
        }
        let len_bytes = (header & 0x0F) as usize;
        let off_bytes = (header >> 4) as usize;
        if len_bytes == 0 || len_bytes > 8 || off_bytes > 8 || pos + 1 + len_bytes + off_bytes > buf.len() {
            return Err(FsError::Corrupt);
        }

        let length = read_unsigned(buf, pos + 1, len_bytes);
        let run_lcn = if off_bytes == 0 {
            None
        } else {
            lcn = lcn
                .checked_add(read_signed(buf, pos + 1 + len_bytes, off_bytes))
                .ok_or(FsError::Corrupt)?;
            if lcn < 0 {
                return Err(FsError::Corrupt);
            }
            Some(lcn as u64)
        };
        runs.push(Run { lcn: run_lcn, length });
        pos += 1 + len_bytes + off_bytes;
    }
}

fn unsigned_len(value: u64) -> usize {
    ((64 - value.leading_zeros() as usize).div_ceil(8)).max(1)
}

/// Menor número de bytes cujo sign-extend reproduz `value`.
fn signed_len(value: i64) -> usize {
    (1..=8)
        .find(|&n| {
            let shift = 64 - 8 * n as u32;
            (value << shift) >> shift == value
        })
        .unwrap_or(8)
}

/// Codifica a lista com o terminador 0.
pub fn encode(runs: &[Run]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev: i64 = 0;
    for run in runs {
        let len_bytes = unsigned_len(run.length);
        let (delta, off_bytes) = match run.lcn {
            Some(lcn) => {
                let delta = lcn as i64 - prev;
                prev = lcn as i64;
                (delta, signed_len(delta))
            }
            None => (0, 0),
        };
        out.push((len_bytes | (off_bytes << 4)) as u8);
        out.extend_from_slice(&run.length.to_le_bytes()[..len_bytes]);
        out.extend_from_slice(&delta.to_le_bytes()[..off_bytes]);
    }
    out.push(0);
    out
}

pub fn total_clusters(runs: &[Run]) -> u64 {
    runs.iter().map(|r| r.length).sum()
}

/// LCN do cluster virtual `vcn`: `Some(None)` se esparso, `None` se além do fim.
pub fn lcn_of(runs: &[Run], vcn: u64) -> Option<Option<u64>> {
    let mut start = 0;
    for run in runs {
        if vcn < start + run.length {
            return Some(run.lcn.map(|lcn| lcn + (vcn - start)));
        }
        start += run.length;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_signed_deltas_and_sparse_runs() {
        // 0x21: 1 byte de comprimento, 2 de deslocamento
        let raw = [
            0x21, 0x10, 0x00, 0x01, // 16 clusters em 0x100
            0x11, 0x08, 0xF0, // 8 clusters em 0x100 - 0x10
            0x01, 0x04, // 4 clusters esparsos
            0x00,
        ];
        let runs = decode(&raw).unwrap();
        assert_eq!(runs, [Run::new(0x100, 16), Run::new(0xF0, 8), Run::sparse(4)]);
        assert_eq!(total_clusters(&runs), 28);
        assert_eq!(lcn_of(&runs, 17), Some(Some(0xF1)));
        assert_eq!(lcn_of(&runs, 25), Some(None));
        assert_eq!(lcn_of(&runs, 28), None);
    }

    #[test]
    fn encode_uses_minimal_widths() {
        let runs = [Run::new(0x100, 16), Run::new(0xF0, 8), Run::sparse(4), Run::new(0x8000, 1)];
        let raw = encode(&runs);
        assert_eq!(&raw[..4], &[0x21, 0x10, 0x00, 0x01]);
        assert_eq!(&raw[4..7], &[0x11, 0x08, 0xF0]);
        assert_eq!(&raw[7..9], &[0x01, 0x04]);
        // 0x8000 - 0xF0 = 0x7F10: cabe em 2 bytes com sinal
        assert_eq!(&raw[9..13], &[0x21, 0x01, 0x10, 0x7F]);
        assert_eq!(*raw.last().unwrap(), 0);
        assert_eq!(decode(&raw).unwrap(), runs);
    }

    #[test]
    fn rejects_truncated_or_negative_lists() {
        assert_eq!(decode(&[0x21, 0x10]).unwrap_err(), FsError::Corrupt);
        assert_eq!(decode(&[0x11, 0x01, 0xFF, 0x00]).unwrap_err(), FsError::Corrupt);
        assert_eq!(decode(&[]).unwrap_err(), FsError::Corrupt);
    }
}
