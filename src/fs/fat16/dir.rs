//! # Entradas de Diretório FAT16
//!
//! ## Entrada 8.3 (32 bytes)
//!
//! | Offset | Tamanho | Descrição                    |
//! |--------|---------|------------------------------|
//! | 0x00   | 8       | Nome (0xE5 = apagada, 0 = fim) |
//! | 0x08   | 3       | Extensão                     |
//! | 0x0B   | 1       | Atributos                    |
//! | 0x1A   | 2       | Primeiro cluster             |
//! | 0x1C   | 4       | Tamanho do arquivo           |
//!
//! ## Entrada LFN (atributo 0x0F)
//!
//! | Offset | Tamanho | Descrição                          |
//! |--------|---------|------------------------------------|
//! | 0x00   | 1       | Sequência (0x40 = último fragmento)|
//! | 0x01   | 10      | Caracteres 1-5 (UCS-2)             |
//! | 0x0B   | 1       | Atributo 0x0F                      |
//! | 0x0D   | 1       | Checksum do nome 8.3               |
//! | 0x0E   | 12      | Caracteres 6-11                    |
//! | 0x1C   | 4       | Caracteres 12-13                   |
//!
//! As entradas LFN ficam antes da entrada 8.3, em ordem de sequência
//! decrescente.

use alloc::string::String;
use alloc::vec::Vec;

use crate::fs::config::MAX_NAME_LEN;
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_u16, read_u32, write_u16, write_u32};

pub const ENTRY_SIZE: usize = 32;

/// Primeiro byte de uma entrada apagada.
pub const DELETED: u8 = 0xE5;

/// Marca do fragmento LFN de maior sequência.
pub const LFN_LAST: u8 = 0x40;

/// Caracteres UCS-2 por entrada LFN.
pub const LFN_CHARS: usize = 13;

/// Posição de cada um dos 13 caracteres dentro da entrada (5 + 6 + 2).
const LFN_OFFSETS: [usize; LFN_CHARS] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

/// Caracteres aceitos num nome 8.3 além de A-Z e 0-9.
const SHORT_EXTRA: &[u8] = b"!#$%&'()-@^_`{}~";

/// Atributos de arquivo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr(pub u8);

impl FileAttr {
    pub const SOMENTE_LEITURA: u8 = 0x01;
    pub const OCULTO: u8 = 0x02;
    pub const SISTEMA: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRETORIO: u8 = 0x10;
    pub const ARQUIVO: u8 = 0x20;
    pub const LFN: u8 = 0x0F;

    pub fn is_directory(&self) -> bool {
        (self.0 & Self::DIRETORIO) != 0
    }

    pub fn is_volume_id(&self) -> bool {
        (self.0 & Self::VOLUME_ID) != 0 && !self.is_lfn()
    }

    pub fn is_lfn(&self) -> bool {
        (self.0 & 0x3F) == Self::LFN
    }
}

/// Entrada 8.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortEntry {
    pub name: [u8; 11],
    pub attr: FileAttr,
    pub first_cluster: u16,
    pub size: u32,
}

impl ShortEntry {
    pub fn new(name: [u8; 11], attr: u8, first_cluster: u16, size: u32) -> Self {
        Self {
            name,
            attr: FileAttr(attr),
            first_cluster,
            size,
        }
    }

    pub fn parse(raw: &[u8]) -> Self {
        let mut name = [b' '; 11];
        name.copy_from_slice(&raw[..11]);
        Self {
            name,
            attr: FileAttr(raw[11]),
            first_cluster: read_u16(raw, 0x1A),
            size: read_u32(raw, 0x1C),
        }
    }

    /// Serializa em `raw[..32]` (datas zeradas).
    pub fn encode(&self, raw: &mut [u8]) {
        raw[..ENTRY_SIZE].fill(0);
        raw[..11].copy_from_slice(&self.name);
        raw[11] = self.attr.0;
        write_u16(raw, 0x1A, self.first_cluster);
        write_u32(raw, 0x1C, self.size);
    }

    /// Nome no formato `NOME.EXT`.
    pub fn display_name(&self) -> String {
        let base = trim_spaces(&self.name[..8]);
        let ext = trim_spaces(&self.name[8..]);
        let mut out = String::with_capacity(12);
        out.extend(base.iter().map(|&b| b as char));
        if !ext.is_empty() {
            out.push('.');
            out.extend(ext.iter().map(|&b| b as char));
        }
        out
    }

    /// Entradas `.` e `..` de subdiretórios.
    pub fn is_dot(&self) -> bool {
        self.name[0] == b'.'
    }
}

fn trim_spaces(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
    &field[..end]
}

/// Checksum do nome 8.3 gravado em cada entrada LFN.
pub fn checksum(name: &[u8; 11]) -> u8 {
    name.iter()
        .fold(0u8, |sum, &c| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(c))
}

fn is_short_char(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || SHORT_EXTRA.contains(&b)
}

/// Rejeita nomes vazios, `.`/`..`, longos demais ou com caracteres proibidos.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidName);
    }
    if name.encode_utf16().count() > MAX_NAME_LEN {
        return Err(FsError::InvalidName);
    }
    if name.chars().any(|c| c.is_control() || "\\/:*?\"<>|".contains(c)) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

/// O nome não cabe como 8.3 puro (minúsculas, espaços, não-ASCII, mais de
/// um ponto, base > 8 ou extensão > 3).
pub fn needs_lfn(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.iter().filter(|&&b| b == b'.').count() > 1 {
        return true;
    }
    let (base, ext) = match name.find('.') {
        Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
        None => (bytes, &[][..]),
    };
    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        return true;
    }
    if name.ends_with('.') {
        return true;
    }
    !base.iter().chain(ext.iter()).all(|&b| is_short_char(b))
}

/// Campo de 11 bytes de um nome que já é 8.3 válido.
pub fn short_name(name: &str) -> [u8; 11] {
    let mut out = [b' '; 11];
    let (base, ext) = name.split_once('.').unwrap_or((name, ""));
    for (slot, b) in out[..8].iter_mut().zip(base.bytes()) {
        *slot = b;
    }
    for (slot, b) in out[8..].iter_mut().zip(ext.bytes()) {
        *slot = b;
    }
    out
}

/// Apelido `BASE~N.EXT` derivado de um nome longo.
pub fn alias(name: &str, n: u32) -> [u8; 11] {
    let trimmed = name.trim_start_matches('.');
    let (base_src, ext_src) = match trimmed.rfind('.') {
        Some(dot) => (&trimmed[..dot], &trimmed[dot + 1..]),
        None => (trimmed, ""),
    };

    let clean = |s: &str| -> Vec<u8> {
        s.chars()
            .filter(|&c| c != ' ' && c != '.')
            .map(|c| {
                let up = c.to_ascii_uppercase();
                if up.is_ascii() && is_short_char(up as u8) {
                    up as u8
                } else {
                    b'_'
                }
            })
            .collect()
    };

    let mut tail = [0u8; 20];
    let digits = crate::klib::string::format_dec(n as u64, &mut tail);
    let keep = 8usize.saturating_sub(digits.len() + 1);

    let mut base = clean(base_src);
    if base.is_empty() {
        base.push(b'_');
    }
    base.truncate(keep);

    let mut out = [b' '; 11];
    let mut pos = 0;
    for &b in base.iter().chain(core::iter::once(&b'~')).chain(digits.iter()) {
        out[pos] = b;
        pos += 1;
    }
    for (slot, b) in out[8..].iter_mut().zip(clean(ext_src)) {
        *slot = b;
    }
    out
}

/// Entradas LFN para `name`, em ordem de disco (sequência decrescente).
pub fn lfn_entries(name: &str, sum: u8) -> Vec<[u8; ENTRY_SIZE]> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let count = units.len().div_ceil(LFN_CHARS);
    let mut out = Vec::with_capacity(count);

    for ord in (1..=count).rev() {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[0] = ord as u8 | if ord == count { LFN_LAST } else { 0 };
        raw[11] = FileAttr::LFN;
        raw[13] = sum;
        for (i, &off) in LFN_OFFSETS.iter().enumerate() {
            let idx = (ord - 1) * LFN_CHARS + i;
            let unit = match idx.cmp(&units.len()) {
                core::cmp::Ordering::Less => units[idx],
                core::cmp::Ordering::Equal => 0x0000,
                core::cmp::Ordering::Greater => 0xFFFF,
            };
            write_u16(&mut raw, off, unit);
        }
        out.push(raw);
    }
    out
}

/// Uma entrada viva encontrada num diretório.
#[derive(Debug, Clone)]
pub struct Found {
    /// Nome longo, se houver LFN válido, senão o 8.3
    pub name: String,
    pub entry: ShortEntry,
    /// Slot da entrada 8.3
    pub slot: usize,
    /// Primeiro slot (LFN mais alto ou a própria 8.3)
    pub first_slot: usize,
}

impl Found {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.entry.display_name().eq_ignore_ascii_case(name)
    }
}

struct LongName {
    units: Vec<u16>,
    expected: u8,
    sum: u8,
    first_slot: usize,
}

impl LongName {
    fn decode(&self) -> String {
        let end = self.units.iter().position(|&u| u == 0x0000 || u == 0xFFFF).unwrap_or(self.units.len());
        char::decode_utf16(self.units[..end].iter().copied())
            .map(|r| r.unwrap_or('?'))
            .collect()
    }
}

/// Percorre um diretório inteiro (até a entrada 0x00).
pub fn scan(buf: &[u8]) -> Vec<Found> {
    let mut out = Vec::new();
    let mut long: Option<LongName> = None;

    for (slot, raw) in buf.chunks_exact(ENTRY_SIZE).enumerate() {
        match raw[0] {
            0x00 => break,
            DELETED => {
                long = None;
                continue;
            }
            _ => {}
        }

        if FileAttr(raw[11]).is_lfn() {
            let seq = raw[0];
            let ord = seq & 0x1F;
            if seq & LFN_LAST != 0 {
                long = Some(LongName {
                    units: alloc::vec![0xFFFF; ord as usize * LFN_CHARS],
                    expected: ord,
                    sum: raw[13],
                    first_slot: slot,
                });
            }
            let valid = matches!(&long, Some(l) if l.expected == ord && ord != 0 && l.sum == raw[13]);
            if !valid {
                long = None;
                continue;
            }
            if let Some(l) = long.as_mut() {
                let base = (ord as usize - 1) * LFN_CHARS;
                for (i, &off) in LFN_OFFSETS.iter().enumerate() {
                    l.units[base + i] = read_u16(raw, off);
                }
                l.expected -= 1;
            }
            continue;
        }

        let entry = ShortEntry::parse(raw);
        let (name, first_slot) = match long.take() {
            Some(l) if l.expected == 0 && l.sum == checksum(&entry.name) => (l.decode(), l.first_slot),
            _ => (entry.display_name(), slot),
        };
        out.push(Found {
            name,
            entry,
            slot,
            first_slot,
        });
    }
    out
}

/// Primeira sequência de `count` slots livres (0x00 ou 0xE5).
pub fn find_free_run(buf: &[u8], count: usize) -> Option<usize> {
    let mut start = 0;
    let mut len = 0;
    for (slot, raw) in buf.chunks_exact(ENTRY_SIZE).enumerate() {
        if raw[0] == 0x00 || raw[0] == DELETED {
            if len == 0 {
                start = slot;
            }
            len += 1;
            if len == count {
                return Some(start);
            }
        } else {
            len = 0;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(buf: &mut [u8], slot: usize, raw: &[u8]) {
        buf[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE].copy_from_slice(&raw[..ENTRY_SIZE]);
    }

    #[test]
    fn classifies_short_and_long_names() {
        assert!(!needs_lfn("README.TXT"));
        assert!(!needs_lfn("KERNEL"));
        assert!(needs_lfn("readme.txt"));
        assert!(needs_lfn("MY FILE.TXT"));
        assert!(needs_lfn("ARCHIVE.TAR.GZ"));
        assert!(needs_lfn("LONGNAME1.TXT"));
        assert!(needs_lfn("NOTE.TEXT"));
        assert!(needs_lfn("ÇÃO.TXT"));
        assert_eq!(&short_name("README.TXT"), b"README  TXT");
    }

    #[test]
    fn alias_truncates_base_and_keeps_extension() {
        assert_eq!(&alias("my long file.txt", 1), b"MYLONG~1TXT");
        assert_eq!(&alias("a.b.c", 2), b"AB~2    C  ");
        assert_eq!(&alias(".bashrc", 1), b"BASHRC~1   ");
        assert_eq!(&alias("x+y=z", 12), b"X_Y_Z~12   ");
    }

    #[test]
    fn checksum_matches_reference() {
        // Valor conhecido de "FOO     BAR"
        let name = *b"FOO     BAR";
        let mut sum: u8 = 0;
        for &c in &name {
            sum = (if sum & 1 != 0 { 0x80u8 } else { 0 }).wrapping_add(sum >> 1).wrapping_add(c);
        }
        assert_eq!(checksum(&name), sum);
    }

    #[test]
    fn thirteen_chars_fit_one_entry() {
        let entries = lfn_entries("abcdefghijklm", 0x42);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0][0], 1 | LFN_LAST);
        assert_eq!(read_u16(&entries[0], 30), 'm' as u16);
    }

    #[test]
    fn fourteen_chars_need_two_entries_with_padding() {
        let entries = lfn_entries("abcdefghijklmn", 0x42);
        assert_eq!(entries.len(), 2);
        // Disco: sequência 2 (última) primeiro
        assert_eq!(entries[0][0], 2 | LFN_LAST);
        assert_eq!(entries[1][0], 1);
        assert_eq!(read_u16(&entries[0], 1), 'n' as u16);
        assert_eq!(read_u16(&entries[0], 3), 0x0000);
        assert_eq!(read_u16(&entries[0], 5), 0xFFFF);
        assert_eq!(read_u16(&entries[0], 30), 0xFFFF);
        assert!(entries.iter().all(|e| e[11] == FileAttr::LFN && e[13] == 0x42));
    }

    #[test]
    fn scan_reassembles_long_names() {
        let short = alias("Relatório final.txt", 1);
        let sum = checksum(&short);
        let lfn = lfn_entries("Relatório final.txt", sum);

        let mut buf = vec![0u8; ENTRY_SIZE * 8];
        let mut raw = [0u8; ENTRY_SIZE];
        ShortEntry::new(*b"KERNEL  BIN", FileAttr::ARQUIVO, 5, 1234).encode(&mut raw);
        place(&mut buf, 0, &raw);
        for (i, e) in lfn.iter().enumerate() {
            place(&mut buf, 1 + i, e);
        }
        ShortEntry::new(short, FileAttr::ARQUIVO, 9, 10).encode(&mut raw);
        place(&mut buf, 1 + lfn.len(), &raw);

        let found = scan(&buf);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "KERNEL.BIN");
        assert_eq!(found[1].name, "Relatório final.txt");
        assert_eq!(found[1].first_slot, 1);
        assert_eq!(found[1].slot, 1 + lfn.len());
        assert!(found[1].matches("relatório FINAL.txt"));
    }

    #[test]
    fn orphan_lfn_falls_back_to_short_name() {
        let lfn = lfn_entries("wrong checksum.txt", 0x00);
        let mut buf = vec![0u8; ENTRY_SIZE * 4];
        for (i, e) in lfn.iter().enumerate() {
            place(&mut buf, i, e);
        }
        let mut raw = [0u8; ENTRY_SIZE];
        ShortEntry::new(*b"WRONGC~1TXT", FileAttr::ARQUIVO, 0, 0).encode(&mut raw);
        place(&mut buf, lfn.len(), &raw);

        let found = scan(&buf);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "WRONGC~1.TXT");
        assert_eq!(found[0].first_slot, lfn.len());
    }

    #[test]
    fn free_run_spans_deleted_and_unused_slots() {
        let mut buf = vec![0u8; ENTRY_SIZE * 6];
        let mut raw = [0u8; ENTRY_SIZE];
        ShortEntry::new(*b"A          ", FileAttr::ARQUIVO, 0, 0).encode(&mut raw);
        place(&mut buf, 0, &raw);
        place(&mut buf, 2, &raw);
        buf[ENTRY_SIZE] = DELETED;
        assert_eq!(find_free_run(&buf, 1), Some(1));
        assert_eq!(find_free_run(&buf, 3), Some(3));
        assert_eq!(find_free_run(&buf, 4), None);
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(validate_name(""), Err(FsError::InvalidName));
        assert_eq!(validate_name(".."), Err(FsError::InvalidName));
        assert_eq!(validate_name("a:b"), Err(FsError::InvalidName));
        assert!(validate_name("ok name.txt").is_ok());
    }
}
