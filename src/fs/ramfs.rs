//! # RAMFS
//!
//! Árvore em memória guardada numa arena de índices.
//!
//! | Índice | Conteúdo                                |
//! |--------|-----------------------------------------|
//! | 0      | raiz (`parent = None`)                  |
//! | 1..N   | nós ativos ou slots livres (`None`)     |
//!
//! Todo nó ativo fora a raiz aponta para um diretório ativo. Como um nó
//! só pode ser criado dentro de um pai que já existe e um diretório só sai
//! vazio, o grafo de pais não tem ciclos.

use alloc::string::String;
use alloc::vec::Vec;

use super::config::{MAX_NAME_LEN, RAMFS_MAX_DATA, RAMFS_MAX_NODES};
use super::error::{FsError, FsResult};
use super::types::{DirEntry, FileStat, NodeKind};
use crate::sys::Tick;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
pub struct RamNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub data: Vec<u8>,
    pub created: Tick,
    pub modified: Tick,
}

pub struct RamFs {
    nodes: Vec<Option<RamNode>>,
}

fn now() -> Tick {
    crate::drivers::timer::ticks()
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

/// Separa `"/a/b/c"` em `("/a/b", "c")`.
fn split_last(path: &str) -> FsResult<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (parent, name) = match trimmed.rfind('/') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("", trimmed),
    };
    if name.is_empty() || name == "." || name == ".." || name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidName);
    }
    Ok((parent, name))
}

impl RamFs {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(16);
        nodes.push(Some(RamNode {
            name: String::from("/"),
            kind: NodeKind::Dir,
            parent: None,
            data: Vec::new(),
            created: now(),
            modified: now(),
        }));
        Self { nodes }
    }

    fn node(&self, idx: usize) -> Option<&RamNode> {
        self.nodes.get(idx)?.as_ref()
    }

    fn children(&self, dir: usize) -> impl Iterator<Item = (usize, &RamNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(move |(i, n)| n.as_ref().filter(|n| n.parent == Some(dir)).map(|n| (i, n)))
    }

    fn child(&self, dir: usize, name: &str) -> Option<usize> {
        self.children(dir).find(|(_, n)| n.name == name).map(|(i, _)| i)
    }

    fn resolve(&self, path: &str) -> FsResult<usize> {
        let mut cur = ROOT;
        for comp in components(path) {
            if comp == ".." {
                cur = self.node(cur).and_then(|n| n.parent).unwrap_or(ROOT);
                continue;
            }
            if self.node(cur).map(|n| n.kind) != Some(NodeKind::Dir) {
                return Err(FsError::NotDir);
            }
            cur = self.child(cur, comp).ok_or(FsError::NotFound)?;
        }
        Ok(cur)
    }

    fn resolve_dir(&self, path: &str) -> FsResult<usize> {
        let idx = self.resolve(path)?;
        match self.node(idx).map(|n| n.kind) {
            Some(NodeKind::Dir) => Ok(idx),
            _ => Err(FsError::NotDir),
        }
    }

    /// Primeiro slot livre, crescendo a arena até `RAMFS_MAX_NODES`.
    fn alloc_slot(&mut self) -> FsResult<usize> {
        if let Some(i) = self.nodes.iter().position(|n| n.is_none()) {
            return Ok(i);
        }
        if self.nodes.len() >= RAMFS_MAX_NODES {
            return Err(FsError::NoSpace);
        }
        self.nodes.push(None);
        Ok(self.nodes.len() - 1)
    }

    pub fn create(&mut self, path: &str, kind: NodeKind) -> FsResult<usize> {
        let (parent_path, name) = split_last(path)?;
        let parent = self.resolve_dir(parent_path)?;
        if self.child(parent, name).is_some() {
            return Err(FsError::Exists);
        }
        let slot = self.alloc_slot()?;
        let t = now();
        self.nodes[slot] = Some(RamNode {
            name: String::from(name),
            kind,
            parent: Some(parent),
            data: Vec::new(),
            created: t,
            modified: t,
        });
        if let Some(Some(p)) = self.nodes.get_mut(parent) {
            p.modified = t;
        }
        Ok(slot)
    }

    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        self.create(path, NodeKind::Dir).map(|_| ())
    }

    /// Substitui o conteúdo; cria o arquivo se não existir.
    pub fn write(&mut self, path: &str, data: &[u8]) -> FsResult<usize> {
        if data.len() > RAMFS_MAX_DATA {
            return Err(FsError::TooLarge);
        }
        let idx = match self.resolve(path) {
            Ok(idx) => idx,
            Err(FsError::NotFound) => self.create(path, NodeKind::File)?,
            Err(e) => return Err(e),
        };
        let node = self.nodes[idx].as_mut().ok_or(FsError::NotFound)?;
        if node.kind == NodeKind::Dir {
            return Err(FsError::IsDir);
        }
        node.data.clear();
        node.data.extend_from_slice(data);
        node.modified = now();
        Ok(data.len())
    }

    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        self.read_at(path, 0, buf)
    }

    /// Lê a partir de `offset`; 0 no fim do arquivo.
    pub fn read_at(&self, path: &str, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        let node = self.node(self.resolve(path)?).ok_or(FsError::NotFound)?;
        if node.kind == NodeKind::Dir {
            return Err(FsError::IsDir);
        }
        let src = node.data.get(offset..).unwrap_or(&[]);
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let node = self.node(self.resolve(path)?).ok_or(FsError::NotFound)?;
        if node.kind == NodeKind::Dir {
            return Err(FsError::IsDir);
        }
        Ok(node.data.clone())
    }

    pub fn delete(&mut self, path: &str) -> FsResult<()> {
        let idx = self.resolve(path)?;
        if idx == ROOT {
            return Err(FsError::InvalidName);
        }
        if self.children(idx).next().is_some() {
            return Err(FsError::DirNotEmpty);
        }
        let parent = self.nodes[idx].take().and_then(|n| n.parent);
        if let Some(Some(p)) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.modified = now();
        }
        Ok(())
    }

    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.resolve_dir(path)?;
        Ok(self
            .children(dir)
            .map(|(_, n)| DirEntry {
                name: n.name.clone(),
                kind: n.kind,
                size: n.data.len() as u64,
            })
            .collect())
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        let node = self.node(self.resolve(path)?).ok_or(FsError::NotFound)?;
        Ok(FileStat {
            kind: node.kind,
            size: node.data.len() as u64,
            created: node.created,
            modified: node.modified,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Bytes ocupados por dados de arquivos.
    pub fn used_bytes(&self) -> usize {
        self.nodes.iter().flatten().map(|n| n.data.len()).sum()
    }

    /// Todo pai é um diretório ativo e a subida até a raiz termina.
    pub fn check_tree(&self) -> bool {
        for (i, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            if i == ROOT {
                if node.parent.is_some() {
                    return false;
                }
                continue;
            }
            let mut cur = node.parent;
            let mut steps = 0;
            while let Some(p) = cur {
                match self.node(p) {
                    Some(parent) if parent.kind == NodeKind::Dir => cur = parent.parent,
                    _ => return false,
                }
                steps += 1;
                if steps > self.nodes.len() {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tmp() -> RamFs {
        let mut fs = RamFs::new();
        fs.mkdir("/tmp").unwrap();
        fs
    }

    #[test]
    fn write_then_read_hello() {
        let mut fs = with_tmp();
        assert_eq!(fs.write("/tmp/a", b"hello").unwrap(), 5);
        let mut buf = [0u8; 16];
        assert_eq!(fs.read("/tmp/a", &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn write_replaces_content() {
        let mut fs = with_tmp();
        fs.write("/tmp/a", b"first version").unwrap();
        fs.write("/tmp/a", b"v2").unwrap();
        assert_eq!(fs.read_file("/tmp/a").unwrap(), b"v2");
        assert_eq!(fs.stat("/tmp/a").unwrap().size, 2);
        assert_eq!(fs.list("/tmp").unwrap().len(), 1);
    }

    #[test]
    fn read_at_end_returns_zero() {
        let mut fs = with_tmp();
        fs.write("/tmp/a", b"abc").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read_at("/tmp/a", 1, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
        assert_eq!(fs.read_at("/tmp/a", 3, &mut buf).unwrap(), 0);
        assert_eq!(fs.read_at("/tmp/a", 99, &mut buf).unwrap(), 0);
    }

    #[test]
    fn missing_parent_and_bad_names() {
        let mut fs = RamFs::new();
        assert_eq!(fs.write("/nope/a", b"x").unwrap_err(), FsError::NotFound);
        assert_eq!(fs.create("/", NodeKind::File).unwrap_err(), FsError::InvalidName);
        assert_eq!(fs.mkdir("/a/..").unwrap_err(), FsError::InvalidName);
        fs.write("/file", b"x").unwrap();
        assert_eq!(fs.write("/file/sub", b"x").unwrap_err(), FsError::NotDir);
    }

    #[test]
    fn size_limit() {
        let mut fs = RamFs::new();
        let big = std::vec![0u8; RAMFS_MAX_DATA + 1];
        assert_eq!(fs.write("/big", &big).unwrap_err(), FsError::TooLarge);
        assert_eq!(fs.write("/max", &big[..RAMFS_MAX_DATA]).unwrap(), RAMFS_MAX_DATA);
    }

    #[test]
    fn directories_must_be_empty_to_delete() {
        let mut fs = with_tmp();
        fs.mkdir("/tmp/sub").unwrap();
        fs.write("/tmp/sub/f", b"1").unwrap();
        assert_eq!(fs.delete("/tmp/sub").unwrap_err(), FsError::DirNotEmpty);
        assert_eq!(fs.delete("/").unwrap_err(), FsError::InvalidName);
        fs.delete("/tmp/sub/f").unwrap();
        fs.delete("/tmp/sub").unwrap();
        assert_eq!(fs.stat("/tmp/sub").unwrap_err(), FsError::NotFound);
        assert!(fs.check_tree());
    }

    #[test]
    fn directory_is_not_a_file() {
        let mut fs = with_tmp();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/tmp", &mut buf).unwrap_err(), FsError::IsDir);
        assert_eq!(fs.write("/tmp", b"x").unwrap_err(), FsError::IsDir);
        assert_eq!(fs.list("/").unwrap()[0].kind, NodeKind::Dir);
    }

    #[test]
    fn node_table_fills_and_slots_are_reused() {
        let mut fs = RamFs::new();
        for i in 1..RAMFS_MAX_NODES {
            fs.write(&std::format!("/f{}", i), b"").unwrap();
        }
        assert_eq!(fs.node_count(), RAMFS_MAX_NODES);
        assert_eq!(fs.write("/extra", b"").unwrap_err(), FsError::NoSpace);
        fs.delete("/f7").unwrap();
        fs.write("/extra", b"ok").unwrap();
        assert_eq!(fs.read_file("/extra").unwrap(), b"ok");
    }

    #[test]
    fn dot_components_resolve() {
        let mut fs = with_tmp();
        fs.write("/tmp/a", b"x").unwrap();
        assert_eq!(fs.read_file("/tmp/./a").unwrap(), b"x");
        assert_eq!(fs.read_file("/tmp/../tmp/a").unwrap(), b"x");
    }

    #[test]
    fn tree_invariant_holds_after_mixed_operations() {
        let mut fs = with_tmp();
        for d in ["/a", "/a/b", "/a/b/c", "/tmp/x"] {
            fs.mkdir(d).unwrap();
        }
        fs.write("/a/b/c/file", b"deep").unwrap();
        fs.delete("/tmp/x").unwrap();
        assert!(fs.check_tree());
        assert_eq!(fs.used_bytes(), 4);
    }
}
