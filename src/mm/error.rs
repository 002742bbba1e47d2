//! Erros do subsistema de memória.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem frames físicos livres
    OutOfMemory,
    /// Página não mapeada
    NotMapped,
    /// Página já mapeada
    AlreadyMapped,
    /// Endereço fora da faixa permitida
    InvalidAddress,
    /// Endereço não alinhado a página
    NotAligned,
    /// Tentativa de mapear na região do kernel a partir de um caminho de usuário
    KernelSpace,
}

impl MmError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem frames físicos disponíveis",
            Self::NotMapped => "página não mapeada",
            Self::AlreadyMapped => "página já mapeada",
            Self::InvalidAddress => "endereço inválido",
            Self::NotAligned => "endereço não alinhado a página",
            Self::KernelSpace => "endereço na região do kernel",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MmError> for crate::sys::Errno {
    fn from(e: MmError) -> Self {
        match e {
            MmError::OutOfMemory => Self::ENOMEM,
            MmError::NotMapped | MmError::InvalidAddress | MmError::KernelSpace => Self::EFAULT,
            MmError::AlreadyMapped => Self::EEXIST,
            MmError::NotAligned => Self::EINVAL,
        }
    }
}

pub type MmResult<T> = Result<T, MmError>;
