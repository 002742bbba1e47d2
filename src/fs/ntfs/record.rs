//! # Registros MFT e atributos
//!
//! ## Cabeçalho do registro (FILE)
//!
//! | Offset | Tamanho | Descrição                         |
//! |--------|---------|-----------------------------------|
//! | 0x00   | 4       | "FILE"                            |
//! | 0x04   | 2       | Offset do update sequence array   |
//! | 0x06   | 2       | Tamanho do USA (palavras)         |
//! | 0x10   | 2       | Número de sequência               |
//! | 0x12   | 2       | Hard links                        |
//! | 0x14   | 2       | Offset do primeiro atributo       |
//! | 0x16   | 2       | Flags (1 = em uso, 2 = diretório) |
//! | 0x18   | 4       | Bytes usados                      |
//! | 0x1C   | 4       | Bytes alocados                    |
//! | 0x28   | 2       | Próximo id de atributo            |
//! | 0x2C   | 4       | Número do registro                |
//!
//! ## Cabeçalho de atributo
//!
//! | Offset | Residente            | Não residente           |
//! |--------|----------------------|-------------------------|
//! | 0x00   | tipo                 | tipo                    |
//! | 0x04   | tamanho total        | tamanho total           |
//! | 0x08   | 0                    | 1                       |
//! | 0x09   | tamanho do nome      | tamanho do nome         |
//! | 0x0A   | offset do nome       | offset do nome          |
//! | 0x0E   | id                   | id                      |
//! | 0x10   | tamanho do valor     | VCN inicial             |
//! | 0x14   | offset do valor      |                         |
//! | 0x18   |                      | VCN final               |
//! | 0x20   |                      | offset dos data runs    |
//! | 0x28   |                      | tamanho alocado         |
//! | 0x30   |                      | tamanho real            |
//! | 0x38   |                      | tamanho inicializado    |

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::drivers::block::SECTOR_SIZE;
use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_u16, read_u32, read_u64, read_u8, write_u16, write_u32, write_u64};

use super::runs::{self, Run};

pub const FILE_MAGIC: &[u8; 4] = b"FILE";
pub const INDX_MAGIC: &[u8; 4] = b"INDX";

pub const ATTR_STANDARD_INFORMATION: u32 = 0x10;
pub const ATTR_FILE_NAME: u32 = 0x30;
pub const ATTR_VOLUME_NAME: u32 = 0x60;
pub const ATTR_VOLUME_INFORMATION: u32 = 0x70;
pub const ATTR_DATA: u32 = 0x80;
pub const ATTR_INDEX_ROOT: u32 = 0x90;
pub const ATTR_INDEX_ALLOCATION: u32 = 0xA0;
pub const ATTR_BITMAP: u32 = 0xB0;
pub const ATTR_END: u32 = 0xFFFF_FFFF;

pub const RECORD_IN_USE: u16 = 0x0001;
pub const RECORD_IS_DIR: u16 = 0x0002;

pub const REC_USA_OFFSET: usize = 0x04;
pub const REC_USA_COUNT: usize = 0x06;
pub const REC_SEQUENCE: usize = 0x10;
pub const REC_ATTRS_OFFSET: usize = 0x14;
pub const REC_FLAGS: usize = 0x16;
pub const REC_BYTES_USED: usize = 0x18;
pub const REC_BYTES_ALLOC: usize = 0x1C;

/// Onde o USA começa nos registros que criamos.
const USA_START: usize = 0x30;

/// Nome do índice de diretório.
pub const I30: &str = "$I30";

/// Referência de arquivo: 48 bits de número de registro + 16 de sequência.
pub const fn file_ref(record: u64, seq: u16) -> u64 {
    (record & 0x0000_FFFF_FFFF_FFFF) | ((seq as u64) << 48)
}

pub const fn ref_record(reference: u64) -> u64 {
    reference & 0x0000_FFFF_FFFF_FFFF
}

const fn align8(n: usize) -> usize {
    (n + 7) & !7
}

// =============================================================================
// FIXUP
// =============================================================================

/// Verifica o update sequence e restaura os bytes originais.
pub fn apply_fixup(buf: &mut [u8]) -> FsResult<()> {
    let usa_off = read_u16(buf, REC_USA_OFFSET) as usize;
    let usa_count = read_u16(buf, REC_USA_COUNT) as usize;
    if usa_count == 0 || (usa_count - 1) * SECTOR_SIZE > buf.len() || usa_off + usa_count * 2 > buf.len() {
        return Err(FsError::Corrupt);
    }
    let usn = read_u16(buf, usa_off);
    for i in 1..usa_count {
        let tail = i * SECTOR_SIZE - 2;
        if read_u16(buf, tail) != usn {
            return Err(FsError::Corrupt);
        }
        let saved = read_u16(buf, usa_off + i * 2);
        write_u16(buf, tail, saved);
    }
    Ok(())
}

/// Incrementa o update sequence, salva o fim de cada setor e o substitui.
pub fn prepare_fixup(buf: &mut [u8]) -> FsResult<()> {
    let usa_off = read_u16(buf, REC_USA_OFFSET) as usize;
    let usa_count = read_u16(buf, REC_USA_COUNT) as usize;
    if usa_count == 0 || (usa_count - 1) * SECTOR_SIZE > buf.len() || usa_off + usa_count * 2 > buf.len() {
        return Err(FsError::Corrupt);
    }
    let mut usn = read_u16(buf, usa_off).wrapping_add(1);
    if usn == 0 || usn == 0xFFFF {
        usn = 1;
    }
    write_u16(buf, usa_off, usn);
    for i in 1..usa_count {
        let tail = i * SECTOR_SIZE - 2;
        let original = read_u16(buf, tail);
        write_u16(buf, usa_off + i * 2, original);
        write_u16(buf, tail, usn);
    }
    Ok(())
}

// =============================================================================
// ATRIBUTOS
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub type_code: u32,
    /// Offset do atributo dentro do registro
    pub offset: usize,
    raw: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn is_non_resident(&self) -> bool {
        read_u8(self.raw, 0x08) != 0
    }

    pub fn name_len(&self) -> usize {
        read_u8(self.raw, 0x09) as usize
    }

    pub fn name(&self) -> String {
        let off = read_u16(self.raw, 0x0A) as usize;
        utf16_at(self.raw, off, self.name_len())
    }

    pub fn is_unnamed(&self) -> bool {
        self.name_len() == 0
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Valor inline de um atributo residente.
    pub fn resident_value(&self) -> FsResult<&'a [u8]> {
        if self.is_non_resident() {
            return Err(FsError::Corrupt);
        }
        let len = read_u32(self.raw, 0x10) as usize;
        let off = read_u16(self.raw, 0x14) as usize;
        self.raw.get(off..off + len).ok_or(FsError::Corrupt)
    }

    /// Offset do valor residente dentro do registro.
    pub fn value_offset(&self) -> usize {
        self.offset + read_u16(self.raw, 0x14) as usize
    }

    pub fn runs(&self) -> FsResult<Vec<Run>> {
        if !self.is_non_resident() {
            return Err(FsError::Corrupt);
        }
        let off = read_u16(self.raw, 0x20) as usize;
        runs::decode(self.raw.get(off..).ok_or(FsError::Corrupt)?)
    }

    /// Tamanho real do conteúdo (residente ou não).
    pub fn real_size(&self) -> u64 {
        if self.is_non_resident() {
            read_u64(self.raw, 0x30)
        } else {
            read_u32(self.raw, 0x10) as u64
        }
    }

    pub fn allocated_size(&self) -> u64 {
        if self.is_non_resident() {
            read_u64(self.raw, 0x28)
        } else {
            read_u32(self.raw, 0x10) as u64
        }
    }
}

pub struct AttrIter<'a> {
    record: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let type_code = read_u32(self.record, self.pos);
        if type_code == ATTR_END || type_code == 0 {
            return None;
        }
        let len = read_u32(self.record, self.pos + 4) as usize;
        if len < 0x18 || self.pos + len > self.record.len() {
            return None;
        }
        let attr = Attribute {
            type_code,
            offset: self.pos,
            raw: &self.record[self.pos..self.pos + len],
        };
        self.pos += len;
        Some(attr)
    }
}

pub fn attributes(record: &[u8]) -> AttrIter<'_> {
    AttrIter {
        record,
        pos: read_u16(record, REC_ATTRS_OFFSET) as usize,
    }
}

/// Primeiro atributo sem nome do tipo dado (`$DATA` do stream principal).
pub fn find_unnamed(record: &[u8], type_code: u32) -> Option<Attribute<'_>> {
    attributes(record).find(|a| a.type_code == type_code && a.is_unnamed())
}

/// Primeiro atributo do tipo dado, com qualquer nome (`$I30`).
pub fn find_any(record: &[u8], type_code: u32) -> Option<Attribute<'_>> {
    attributes(record).find(|a| a.type_code == type_code)
}

pub fn is_in_use(record: &[u8]) -> bool {
    read_u16(record, REC_FLAGS) & RECORD_IN_USE != 0
}

pub fn is_dir(record: &[u8]) -> bool {
    read_u16(record, REC_FLAGS) & RECORD_IS_DIR != 0
}

pub fn sequence(record: &[u8]) -> u16 {
    read_u16(record, REC_SEQUENCE)
}

/// Troca o valor de um atributo residente, deslocando o restante do
/// registro. `NoSpace` se não couber em `bytes_alloc`.
pub fn set_resident_value(record: &mut [u8], attr_offset: usize, value: &[u8]) -> FsResult<()> {
    let old_len = read_u32(record, attr_offset + 4) as usize;
    let value_off = read_u16(record, attr_offset + 0x14) as usize;
    let new_len = align8(value_off + value.len());
    let used = read_u32(record, REC_BYTES_USED) as usize;
    let alloc = (read_u32(record, REC_BYTES_ALLOC) as usize).min(record.len());
    let new_used = used + new_len - old_len;
    if new_used > alloc || used > alloc {
        return Err(FsError::NoSpace);
    }

    let tail_from = attr_offset + old_len;
    let tail_to = attr_offset + new_len;
    record.copy_within(tail_from..used, tail_to);
    if new_used < used {
        record[new_used..used].fill(0);
    }

    let start = attr_offset + value_off;
    record[start..start + value.len()].copy_from_slice(value);
    record[start + value.len()..attr_offset + new_len].fill(0);
    write_u32(record, attr_offset + 4, new_len as u32);
    write_u32(record, attr_offset + 0x10, value.len() as u32);
    write_u32(record, REC_BYTES_USED, new_used as u32);
    Ok(())
}

pub fn utf16_at(buf: &[u8], off: usize, units: usize) -> String {
    let iter = (0..units).map(|i| read_u16(buf, off + i * 2));
    char::decode_utf16(iter).map(|r| r.unwrap_or('?')).collect()
}

pub fn utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

// =============================================================================
// CONSTRUÇÃO
// =============================================================================

/// Monta um registro MFT do zero, atributo por atributo.
pub struct RecordBuilder {
    buf: Vec<u8>,
    pos: usize,
    next_id: u16,
}

impl RecordBuilder {
    pub fn new(record_size: usize, record_number: u32, flags: u16, sequence: u16) -> Self {
        let mut buf = vec![0u8; record_size];
        let usa_count = record_size / SECTOR_SIZE + 1;
        let attrs_offset = align8(USA_START + usa_count * 2);

        buf[..4].copy_from_slice(FILE_MAGIC);
        write_u16(&mut buf, REC_USA_OFFSET, USA_START as u16);
        write_u16(&mut buf, REC_USA_COUNT, usa_count as u16);
        write_u16(&mut buf, REC_SEQUENCE, sequence);
        write_u16(&mut buf, 0x12, if flags & RECORD_IN_USE != 0 { 1 } else { 0 });
        write_u16(&mut buf, REC_ATTRS_OFFSET, attrs_offset as u16);
        write_u16(&mut buf, REC_FLAGS, flags);
        write_u32(&mut buf, REC_BYTES_ALLOC, record_size as u32);
        write_u32(&mut buf, 0x2C, record_number);

        Self {
            buf,
            pos: attrs_offset,
            next_id: 0,
        }
    }

    fn reserve(&mut self, len: usize) -> FsResult<usize> {
        // + marcador de fim (8 bytes)
        if self.pos + len + 8 > self.buf.len() {
            return Err(FsError::NoSpace);
        }
        let at = self.pos;
        self.pos += len;
        Ok(at)
    }

    fn header(&mut self, at: usize, type_code: u32, len: usize, non_resident: bool, name: &[u8], name_off: usize) {
        let buf = &mut self.buf;
        write_u32(buf, at, type_code);
        write_u32(buf, at + 4, len as u32);
        buf[at + 8] = non_resident as u8;
        buf[at + 9] = (name.len() / 2) as u8;
        write_u16(buf, at + 0x0A, name_off as u16);
        write_u16(buf, at + 0x0E, self.next_id);
        buf[at + name_off..at + name_off + name.len()].copy_from_slice(name);
        self.next_id += 1;
    }

    /// Atributo residente, opcionalmente nomeado.
    pub fn resident(&mut self, type_code: u32, name: &str, value: &[u8]) -> FsResult<&mut Self> {
        let name = utf16_bytes(name);
        let value_off = align8(0x18 + name.len());
        let len = align8(value_off + value.len());
        let at = self.reserve(len)?;
        self.header(at, type_code, len, false, &name, 0x18);
        write_u32(&mut self.buf, at + 0x10, value.len() as u32);
        write_u16(&mut self.buf, at + 0x14, value_off as u16);
        if type_code == ATTR_FILE_NAME {
            self.buf[at + 0x16] = 1; // indexado
        }
        self.buf[at + value_off..at + value_off + value.len()].copy_from_slice(value);
        Ok(self)
    }

    /// Atributo não residente sem nome, descrito por `runs`.
    pub fn non_resident(&mut self, type_code: u32, runs: &[Run], real_size: u64, cluster_size: usize) -> FsResult<&mut Self> {
        let encoded = runs::encode(runs);
        let clusters = runs::total_clusters(runs);
        let len = align8(0x40 + encoded.len());
        let at = self.reserve(len)?;
        self.header(at, type_code, len, true, &[], 0x40);
        let buf = &mut self.buf;
        write_u64(buf, at + 0x10, 0);
        write_u64(buf, at + 0x18, clusters.saturating_sub(1));
        write_u16(buf, at + 0x20, 0x40);
        write_u64(buf, at + 0x28, clusters * cluster_size as u64);
        write_u64(buf, at + 0x30, real_size);
        write_u64(buf, at + 0x38, real_size);
        buf[at + 0x40..at + 0x40 + encoded.len()].copy_from_slice(&encoded);
        Ok(self)
    }

    /// Fecha o registro (marcador de fim e bytes usados). Sem fixup.
    pub fn finish(mut self) -> Vec<u8> {
        let end = self.pos;
        write_u32(&mut self.buf, end, ATTR_END);
        write_u32(&mut self.buf, REC_BYTES_USED, (end + 8) as u32);
        write_u16(&mut self.buf, 0x28, self.next_id);
        self.buf
    }
}

// =============================================================================
// VALORES
// =============================================================================

/// Atributos DOS do arquivo em $STANDARD_INFORMATION / $FILE_NAME.
pub const FILE_ATTR_ARCHIVE: u32 = 0x0000_0020;
pub const FILE_ATTR_DIRECTORY: u32 = 0x1000_0000;

/// Namespaces de $FILE_NAME.
pub const NAMESPACE_POSIX: u8 = 0;
pub const NAMESPACE_WIN32: u8 = 1;
pub const NAMESPACE_DOS: u8 = 2;
pub const NAMESPACE_WIN32_DOS: u8 = 3;

/// Valor de $STANDARD_INFORMATION (48 bytes, formato NTFS 1.2).
pub fn standard_information(time: u64, attrs: u32) -> [u8; 48] {
    let mut v = [0u8; 48];
    for off in [0, 8, 16, 24] {
        write_u64(&mut v, off, time);
    }
    write_u32(&mut v, 32, attrs);
    v
}

/// $FILE_NAME decodificado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub parent: u64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: u32,
    pub namespace: u8,
    pub name: String,
}

impl FileName {
    pub fn parse(value: &[u8]) -> FsResult<Self> {
        if value.len() < 66 {
            return Err(FsError::Corrupt);
        }
        let units = read_u8(value, 64) as usize;
        if 66 + units * 2 > value.len() {
            return Err(FsError::Corrupt);
        }
        Ok(Self {
            parent: read_u64(value, 0),
            allocated_size: read_u64(value, 40),
            real_size: read_u64(value, 48),
            flags: read_u32(value, 56),
            namespace: read_u8(value, 65),
            name: utf16_at(value, 66, units),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.flags & FILE_ATTR_DIRECTORY != 0
    }

    pub fn encode(&self, time: u64) -> Vec<u8> {
        let name = utf16_bytes(&self.name);
        let mut v = vec![0u8; 66 + name.len()];
        write_u64(&mut v, 0, self.parent);
        for off in [8, 16, 24, 32] {
            write_u64(&mut v, off, time);
        }
        write_u64(&mut v, 40, self.allocated_size);
        write_u64(&mut v, 48, self.real_size);
        write_u32(&mut v, 56, self.flags);
        v[64] = (name.len() / 2) as u8;
        v[65] = self.namespace;
        v[66..].copy_from_slice(&name);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut b = RecordBuilder::new(1024, 30, RECORD_IN_USE, 1);
        b.resident(ATTR_STANDARD_INFORMATION, "", &standard_information(0, FILE_ATTR_ARCHIVE))
            .unwrap()
            .resident(ATTR_INDEX_ROOT, I30, &[0xAA; 20])
            .unwrap()
            .non_resident(ATTR_DATA, &[Run::new(100, 3)], 9000, 4096)
            .unwrap();
        b.finish()
    }

    #[test]
    fn fixup_round_trip_restores_sector_tails() {
        let mut rec = sample();
        rec[510] = 0x12;
        rec[511] = 0x34;
        let original = rec.clone();

        prepare_fixup(&mut rec).unwrap();
        let usn = read_u16(&rec, USA_START);
        assert_eq!(read_u16(&rec, 510), usn);
        assert_eq!(read_u16(&rec, 1022), usn);

        apply_fixup(&mut rec).unwrap();
        assert_eq!(&rec[..USA_START], &original[..USA_START]);
        assert_eq!(&rec[0x40..], &original[0x40..]);
    }

    #[test]
    fn torn_sector_is_detected() {
        let mut rec = sample();
        prepare_fixup(&mut rec).unwrap();
        rec[1022] ^= 0xFF;
        assert_eq!(apply_fixup(&mut rec).unwrap_err(), FsError::Corrupt);
    }

    #[test]
    fn attributes_are_iterated_in_order() {
        let rec = sample();
        let types: Vec<u32> = attributes(&rec).map(|a| a.type_code).collect();
        assert_eq!(types, [ATTR_STANDARD_INFORMATION, ATTR_INDEX_ROOT, ATTR_DATA]);

        let root = find_any(&rec, ATTR_INDEX_ROOT).unwrap();
        assert_eq!(root.name(), "$I30");
        assert!(find_unnamed(&rec, ATTR_INDEX_ROOT).is_none());
        assert_eq!(root.resident_value().unwrap(), &[0xAA; 20]);

        let data = find_unnamed(&rec, ATTR_DATA).unwrap();
        assert!(data.is_non_resident());
        assert_eq!(data.real_size(), 9000);
        assert_eq!(data.allocated_size(), 3 * 4096);
        assert_eq!(data.runs().unwrap(), [Run::new(100, 3)]);
    }

    #[test]
    fn resident_value_grows_and_shrinks_in_place() {
        let mut rec = sample();
        let used = read_u32(&rec, REC_BYTES_USED);
        let at = find_any(&rec, ATTR_INDEX_ROOT).unwrap().offset;

        set_resident_value(&mut rec, at, &[0xBB; 60]).unwrap();
        assert_eq!(read_u32(&rec, REC_BYTES_USED), used + 40);
        assert_eq!(find_any(&rec, ATTR_INDEX_ROOT).unwrap().resident_value().unwrap(), &[0xBB; 60]);
        assert_eq!(find_unnamed(&rec, ATTR_DATA).unwrap().runs().unwrap(), [Run::new(100, 3)]);

        set_resident_value(&mut rec, at, &[0xCC; 4]).unwrap();
        assert_eq!(read_u32(&rec, REC_BYTES_USED), used - 16);
        assert_eq!(find_unnamed(&rec, ATTR_DATA).unwrap().real_size(), 9000);

        assert_eq!(set_resident_value(&mut rec, at, &[0; 2000]).unwrap_err(), FsError::NoSpace);
    }

    #[test]
    fn file_name_round_trip() {
        let name = FileName {
            parent: file_ref(5, 5),
            allocated_size: 4096,
            real_size: 10,
            flags: FILE_ATTR_ARCHIVE,
            namespace: NAMESPACE_WIN32,
            name: "relatório.txt".into(),
        };
        let parsed = FileName::parse(&name.encode(7)).unwrap();
        assert_eq!(parsed, name);
        assert_eq!(ref_record(parsed.parent), 5);
    }
}
