//! # Program Loader (exec)
//!
//! Carrega executáveis ELF32 estáticos (módulos multiboot) em espaços de
//! endereçamento isolados e entrega o resultado ao scheduler.
//!
//! ## Layout de usuário
//!
//! ```text
//! 0xC0000000  imagem (PT_LOAD)
//! 0xD0000000  heap de usuário (malloc)
//! 0xD8000000  framebuffer da janela GUI
//! 0xDFFF0000  pilha (16 páginas)
//! 0xE0000000  topo da pilha
//! ```

pub mod elf;
pub mod loader;

pub use elf::validate;
pub use loader::{load, load_image, map_user_stack, KernelMapper, LoadedImage, SegmentMapper, ELF_FLAG_MAP_VGA};

use crate::mm::MmError;
use crate::sys::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    BadMagic,
    NotElf32,
    NotLittleEndian,
    NotExecutable,
    WrongMachine,
    NoProgramHeaders,
    HeadersOutOfFile,
    /// Segmento com `filesz > memsz` ou bytes fora do arquivo
    SegmentOutOfFile,
    EntryBelowUserBase,
    SegmentInKernelSpace,
    OutOfMemory,
    TaskTableFull,
}

impl ElfError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadMagic => "magic ELF inválido",
            Self::NotElf32 => "não é ELFCLASS32",
            Self::NotLittleEndian => "não é little-endian",
            Self::NotExecutable => "não é ET_EXEC",
            Self::WrongMachine => "máquina diferente de EM_386",
            Self::NoProgramHeaders => "sem program headers",
            Self::HeadersOutOfFile => "program headers fora do arquivo",
            Self::SegmentOutOfFile => "segmento fora do arquivo",
            Self::EntryBelowUserBase => "entry abaixo da base de usuário",
            Self::SegmentInKernelSpace => "segmento fora da região de imagem",
            Self::OutOfMemory => "sem memória",
            Self::TaskTableFull => "tabela de tasks cheia",
        }
    }
}

impl core::fmt::Display for ElfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MmError> for ElfError {
    fn from(e: MmError) -> Self {
        match e {
            MmError::OutOfMemory => Self::OutOfMemory,
            _ => Self::SegmentInKernelSpace,
        }
    }
}

impl From<ElfError> for Errno {
    fn from(e: ElfError) -> Self {
        match e {
            ElfError::OutOfMemory => Errno::ENOMEM,
            ElfError::TaskTableFull => Errno::EAGAIN,
            _ => Errno::ENOEXEC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(Errno::from(ElfError::OutOfMemory), Errno::ENOMEM);
        assert_eq!(Errno::from(ElfError::TaskTableFull), Errno::EAGAIN);
        assert_eq!(Errno::from(ElfError::BadMagic), Errno::ENOEXEC);
        assert_eq!(ElfError::from(MmError::OutOfMemory), ElfError::OutOfMemory);
        assert_eq!(ElfError::from(MmError::KernelSpace), ElfError::SegmentInKernelSpace);
    }
}
