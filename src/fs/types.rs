//! Tipos comuns a todos os filesystems.

use alloc::string::String;

use crate::sys::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
        }
    }
}

/// Uma entrada devolvida por `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: NodeKind,
    pub size: u64,
    /// Ticks de criação/modificação (0 em volumes de disco)
    pub created: Tick,
    pub modified: Tick,
}

impl FileStat {
    pub const fn disk(kind: NodeKind, size: u64) -> Self {
        Self {
            kind,
            size,
            created: 0,
            modified: 0,
        }
    }
}

/// Resumo de um volume montado (`/proc/mounts`, syscalls `*_mounted`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub fs_type: &'static str,
    pub label: String,
    pub total_sectors: u64,
    pub cluster_size: u32,
}
