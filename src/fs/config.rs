//! Limites dos filesystems.

/// Capacidade da tabela de nós do RAMFS (inclui a raiz).
pub const RAMFS_MAX_NODES: usize = 128;

/// Tamanho máximo de um arquivo do RAMFS.
pub const RAMFS_MAX_DATA: usize = 64 * 1024;

/// Teto de cada arquivo sintetizado pelo procfs.
pub const PROCFS_MAX_FILE: usize = 4096;

/// Descritores abertos ao mesmo tempo (todas as tasks).
pub const MAX_OPEN_FILES: usize = 32;

/// Primeiro fd devolvido por `open` (0, 1 e 2 são console).
pub const FIRST_FD: usize = 3;

/// Maior componente de caminho aceito.
pub const MAX_NAME_LEN: usize = 255;
