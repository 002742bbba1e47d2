//! Erros dos filesystems.
//!
//! Todos os motores (FAT16, NTFS, RAMFS, procfs) devolvem `FsError`; o VFS
//! repassa o erro e a fronteira de syscall o converte em `Errno`.

use core::fmt;

use crate::drivers::block::BlockError;
use crate::sys::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    Exists,
    NotDir,
    IsDir,
    /// Sem clusters, registros MFT, slots de diretório ou nós livres
    NoSpace,
    /// Estrutura em disco inconsistente (cadeia FAT, fixup, atributo)
    Corrupt,
    Io(BlockError),
    InvalidName,
    /// Nenhum volume montado no drive
    NotMounted,
    TooLarge,
    Unsupported,
    DirNotEmpty,
}

pub type FsResult<T> = Result<T, FsError>;

impl From<BlockError> for FsError {
    fn from(e: BlockError) -> Self {
        FsError::Io(e)
    }
}

impl From<FsError> for Errno {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound => Errno::ENOENT,
            FsError::Exists => Errno::EEXIST,
            FsError::NotDir => Errno::ENOTDIR,
            FsError::IsDir => Errno::EISDIR,
            FsError::NoSpace => Errno::ENOSPC,
            FsError::Corrupt | FsError::Io(_) => Errno::EIO,
            FsError::InvalidName => Errno::EINVAL,
            FsError::NotMounted => Errno::ENODEV,
            FsError::TooLarge => Errno::EFBIG,
            FsError::Unsupported => Errno::ENOSYS,
            FsError::DirNotEmpty => Errno::ENOTEMPTY,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => write!(f, "Não encontrado"),
            FsError::Exists => write!(f, "Já existe"),
            FsError::NotDir => write!(f, "Não é diretório"),
            FsError::IsDir => write!(f, "É diretório"),
            FsError::NoSpace => write!(f, "Sem espaço"),
            FsError::Corrupt => write!(f, "Estrutura corrompida"),
            FsError::Io(e) => write!(f, "I/O: {}", e),
            FsError::InvalidName => write!(f, "Nome inválido"),
            FsError::NotMounted => write!(f, "Volume não montado"),
            FsError::TooLarge => write!(f, "Grande demais"),
            FsError::Unsupported => write!(f, "Não suportado"),
            FsError::DirNotEmpty => write!(f, "Diretório não vazio"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_errno() {
        assert_eq!(Errno::from(FsError::NotFound), Errno::ENOENT);
        assert_eq!(Errno::from(FsError::Io(BlockError::Timeout)), Errno::EIO);
        assert_eq!(Errno::from(FsError::DirNotEmpty), Errno::ENOTEMPTY);
        assert_eq!(FsError::from(BlockError::OutOfRange), FsError::Io(BlockError::OutOfRange));
    }
}
