//! # Índices de diretório ($I30)
//!
//! ## Valor de $INDEX_ROOT
//!
//! | Offset | Tamanho | Descrição                              |
//! |--------|---------|----------------------------------------|
//! | 0x00   | 4       | Tipo indexado (0x30 = $FILE_NAME)      |
//! | 0x04   | 4       | Regra de collation (1 = nome)          |
//! | 0x08   | 4       | Tamanho do registro de índice          |
//! | 0x0C   | 1       | Clusters por registro de índice        |
//! | 0x10   | 16      | Cabeçalho do nó                        |
//!
//! ## Cabeçalho do nó
//!
//! | Offset | Tamanho | Descrição                               |
//! |--------|---------|-----------------------------------------|
//! | 0x00   | 4       | Offset da primeira entrada (do cabeçalho)|
//! | 0x04   | 4       | Fim das entradas                        |
//! | 0x08   | 4       | Tamanho alocado                         |
//! | 0x0C   | 1       | Flags (1 = tem $INDEX_ALLOCATION)       |
//!
//! ## Entrada
//!
//! | Offset | Tamanho | Descrição                          |
//! |--------|---------|------------------------------------|
//! | 0x00   | 8       | Referência do arquivo              |
//! | 0x08   | 2       | Tamanho da entrada                 |
//! | 0x0A   | 2       | Tamanho da chave ($FILE_NAME)      |
//! | 0x0C   | 2       | Flags (1 = subnó, 2 = última)      |
//! | 0x10   | ...     | Chave                              |

use alloc::vec::Vec;

use crate::fs::error::{FsError, FsResult};
use crate::klib::bytes::{read_u16, read_u32, read_u64, read_u8, write_u16, write_u32, write_u64};

use super::record::{FileName, ATTR_FILE_NAME};

pub const ENTRY_HAS_SUBNODE: u16 = 0x01;
pub const ENTRY_LAST: u16 = 0x02;

/// Cabeçalho do nó dentro do valor de $INDEX_ROOT.
pub const ROOT_NODE: usize = 0x10;
/// Cabeçalho do nó dentro de um registro INDX.
pub const INDX_NODE: usize = 0x18;

pub const NODE_LARGE: u8 = 0x01;

const ENTRY_HEADER: usize = 0x10;
const COLLATION_FILE_NAME: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub file_ref: u64,
    pub name: FileName,
}

/// Posição, tamanho e flags de cada entrada do nó (inclui a última).
fn layout(buf: &[u8], node: usize) -> FsResult<Vec<(usize, usize, u16)>> {
    let first = node + read_u32(buf, node) as usize;
    let end = (node + read_u32(buf, node + 4) as usize).min(buf.len());
    let mut out = Vec::new();
    let mut pos = first;
    loop {
        if pos + ENTRY_HEADER > end {
            return Err(FsError::Corrupt);
        }
        let len = read_u16(buf, pos + 8) as usize;
        let flags = read_u16(buf, pos + 0x0C);
        if len < ENTRY_HEADER || pos + len > end {
            return Err(FsError::Corrupt);
        }
        out.push((pos, len, flags));
        if flags & ENTRY_LAST != 0 {
            return Ok(out);
        }
        pos += len;
    }
}

/// Entradas de um nó (sem a sentinela).
pub fn parse_node(buf: &[u8], node: usize) -> FsResult<Vec<IndexEntry>> {
    let mut out = Vec::new();
    for (pos, _, flags) in layout(buf, node)? {
        if flags & ENTRY_LAST != 0 {
            break;
        }
        let key_len = read_u16(buf, pos + 0x0A) as usize;
        let key = buf.get(pos + ENTRY_HEADER..pos + ENTRY_HEADER + key_len).ok_or(FsError::Corrupt)?;
        out.push(IndexEntry {
            file_ref: read_u64(buf, pos),
            name: FileName::parse(key)?,
        });
    }
    Ok(out)
}

pub fn is_large(root_value: &[u8]) -> bool {
    read_u8(root_value, ROOT_NODE + 0x0C) & NODE_LARGE != 0
}

/// $INDEX_ROOT vazio: só a sentinela.
pub fn empty_root(index_record_size: u32, clusters_per_index: u8) -> Vec<u8> {
    let mut v = alloc::vec![0u8; ROOT_NODE + 0x10 + ENTRY_HEADER];
    write_u32(&mut v, 0x00, ATTR_FILE_NAME);
    write_u32(&mut v, 0x04, COLLATION_FILE_NAME);
    write_u32(&mut v, 0x08, index_record_size);
    v[0x0C] = clusters_per_index;
    write_u32(&mut v, ROOT_NODE, 0x10);
    write_u32(&mut v, ROOT_NODE + 4, 0x10 + ENTRY_HEADER as u32);
    write_u32(&mut v, ROOT_NODE + 8, 0x10 + ENTRY_HEADER as u32);
    let last = ROOT_NODE + 0x10;
    write_u16(&mut v, last + 8, ENTRY_HEADER as u16);
    write_u16(&mut v, last + 0x0C, ENTRY_LAST);
    v
}

pub fn build_entry(file_ref: u64, key: &[u8]) -> Vec<u8> {
    let len = (ENTRY_HEADER + key.len() + 7) & !7;
    let mut e = alloc::vec![0u8; len];
    write_u64(&mut e, 0, file_ref);
    write_u16(&mut e, 8, len as u16);
    write_u16(&mut e, 0x0A, key.len() as u16);
    e[ENTRY_HEADER..ENTRY_HEADER + key.len()].copy_from_slice(key);
    e
}

fn adjust_lengths(value: &mut [u8], delta: isize) {
    for off in [ROOT_NODE + 4, ROOT_NODE + 8] {
        let cur = read_u32(value, off) as isize;
        write_u32(value, off, (cur + delta) as u32);
    }
}

/// Insere `entry` em ordem de nome, sempre antes da sentinela.
pub fn root_insert(value: &[u8], entry: &[u8], name: &str) -> FsResult<Vec<u8>> {
    if is_large(value) {
        return Err(FsError::Unsupported);
    }
    let key = name.to_uppercase();
    let mut at = None;
    for (pos, len, flags) in layout(value, ROOT_NODE)? {
        if flags & ENTRY_LAST != 0 {
            at = Some(pos);
            break;
        }
        let key_len = read_u16(value, pos + 0x0A) as usize;
        let existing = FileName::parse(&value[pos + ENTRY_HEADER..pos + ENTRY_HEADER + key_len.min(len - ENTRY_HEADER)])?;
        if existing.name.to_uppercase() > key {
            at = Some(pos);
            break;
        }
    }
    let at = at.ok_or(FsError::Corrupt)?;

    let mut out = Vec::with_capacity(value.len() + entry.len());
    out.extend_from_slice(&value[..at]);
    out.extend_from_slice(entry);
    out.extend_from_slice(&value[at..]);
    adjust_lengths(&mut out, entry.len() as isize);
    Ok(out)
}

/// Remove a entrada que aponta para `record`. `None` se não estiver na raiz.
pub fn root_remove(value: &[u8], record: u64) -> FsResult<Option<Vec<u8>>> {
    for (pos, len, flags) in layout(value, ROOT_NODE)? {
        if flags & ENTRY_LAST != 0 {
            break;
        }
        if super::record::ref_record(read_u64(value, pos)) == record {
            let mut out = Vec::with_capacity(value.len() - len);
            out.extend_from_slice(&value[..pos]);
            out.extend_from_slice(&value[pos + len..]);
            adjust_lengths(&mut out, -(len as isize));
            return Ok(Some(out));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ntfs::record::{file_ref, NAMESPACE_WIN32};
    use alloc::string::String;

    fn key(name: &str) -> Vec<u8> {
        FileName {
            parent: file_ref(5, 5),
            allocated_size: 0,
            real_size: 0,
            flags: 0,
            namespace: NAMESPACE_WIN32,
            name: String::from(name),
        }
        .encode(0)
    }

    fn names(value: &[u8]) -> Vec<String> {
        parse_node(value, ROOT_NODE).unwrap().into_iter().map(|e| e.name.name).collect()
    }

    #[test]
    fn empty_root_has_only_the_sentinel() {
        let root = empty_root(4096, 1);
        assert!(parse_node(&root, ROOT_NODE).unwrap().is_empty());
        assert!(!is_large(&root));
    }

    #[test]
    fn inserts_keep_name_order_before_sentinel() {
        let mut root = empty_root(4096, 1);
        for (rec, name) in [(30, "zeta"), (31, "Alpha"), (32, "beta")] {
            let entry = build_entry(file_ref(rec, 1), &key(name));
            root = root_insert(&root, &entry, name).unwrap();
        }
        assert_eq!(names(&root), ["Alpha", "beta", "zeta"]);
        assert_eq!(read_u32(&root, ROOT_NODE + 4) as usize, root.len() - ROOT_NODE);

        let entries = parse_node(&root, ROOT_NODE).unwrap();
        assert_eq!(super::super::record::ref_record(entries[2].file_ref), 30);
    }

    #[test]
    fn remove_drops_only_the_matching_record() {
        let mut root = empty_root(4096, 1);
        for (rec, name) in [(40, "a"), (41, "b")] {
            root = root_insert(&root, &build_entry(file_ref(rec, 1), &key(name)), name).unwrap();
        }
        let without = root_remove(&root, 40).unwrap().unwrap();
        assert_eq!(names(&without), ["b"]);
        assert!(root_remove(&without, 99).unwrap().is_none());
        let empty = root_remove(&without, 41).unwrap().unwrap();
        assert_eq!(empty, empty_root(4096, 1));
    }

    #[test]
    fn large_index_refuses_root_insert() {
        let mut root = empty_root(4096, 1);
        root[ROOT_NODE + 0x0C] = NODE_LARGE;
        let entry = build_entry(file_ref(50, 1), &key("x"));
        assert_eq!(root_insert(&root, &entry, "x").unwrap_err(), FsError::Unsupported);
    }
}
