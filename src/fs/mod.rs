//! # Filesystem Subsystem
//!
//! | Módulo    | Papel                                               |
//! |-----------|-----------------------------------------------------|
//! | `vfs`     | roteamento por prefixo, cwd e descritores           |
//! | `ramfs`   | árvore em memória (tudo fora de `/proc` e `/disk*`) |
//! | `procfs`  | arquivos gerados na leitura                         |
//! | `fat16`   | motor FAT16 com LFN e formatação                    |
//! | `ntfs`    | motor NTFS sem journaling                           |
//!
//! Os motores de disco falam com `drivers::block::BlockDevice`; os testes
//! usam `RamDisk` no lugar do ATA.

pub mod config;
pub mod error;
pub mod fat16;
pub mod ntfs;
pub mod procfs;
pub mod ramfs;
pub mod types;
pub mod vfs;

#[cfg(feature = "self_test")]
pub mod test;

pub use error::{FsError, FsResult};
pub use types::{DirEntry, FileStat, NodeKind, VolumeInfo};

/// Sobe o RAMFS e monta os drives ATA presentes.
pub fn init() {
    vfs::init();
    crate::kinfo!("(FS) Volumes montados=", vfs::mounts().len() as u64);
}
