//! # Códigos de erro do kernel (Errno)
//!
//! Numeração POSIX. Dentro do kernel os erros trafegam como `Result<_, Errno>`;
//! na fronteira de syscall todo `Err` vira `-1` (`SYSCALL_FAILURE`).

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    EPERM = 1,    // Operation not permitted
    ENOENT = 2,   // No such file or directory
    ESRCH = 3,    // No such process
    EIO = 5,      // I/O error
    ENOEXEC = 8,  // Exec format error
    EBADF = 9,    // Bad file number
    EAGAIN = 11,  // Try again
    ENOMEM = 12,  // Out of memory
    EFAULT = 14,  // Bad address
    EBUSY = 16,   // Device or resource busy
    EEXIST = 17,  // File exists
    ENODEV = 19,  // No such device
    ENOTDIR = 20, // Not a directory
    EISDIR = 21,  // Is a directory
    EINVAL = 22,  // Invalid argument
    EMFILE = 24,  // Too many open files
    EFBIG = 27,   // File too large
    ENOSPC = 28,  // No space left on device
    ENOSYS = 38,  // Function not implemented
    ENOTEMPTY = 39, // Directory not empty
    ETIMEDOUT = 110, // Timed out
}

/// Valor devolvido em EAX para qualquer falha de syscall ou do loader.
pub const SYSCALL_FAILURE: isize = -1;

impl Errno {
    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EPERM => "operação não permitida",
            Self::ENOENT => "não encontrado",
            Self::ESRCH => "processo inexistente",
            Self::EIO => "erro de I/O",
            Self::ENOEXEC => "formato executável inválido",
            Self::EBADF => "descritor inválido",
            Self::EAGAIN => "tente novamente",
            Self::ENOMEM => "sem memória",
            Self::EFAULT => "endereço inválido",
            Self::EBUSY => "ocupado",
            Self::EEXIST => "já existe",
            Self::ENODEV => "dispositivo inexistente",
            Self::ENOTDIR => "não é diretório",
            Self::EISDIR => "é diretório",
            Self::EINVAL => "argumento inválido",
            Self::EMFILE => "tabela de descritores cheia",
            Self::EFBIG => "arquivo grande demais",
            Self::ENOSPC => "sem espaço",
            Self::ENOSYS => "não implementado",
            Self::ENOTEMPTY => "diretório não vazio",
            Self::ETIMEDOUT => "tempo esgotado",
        }
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_is_negative_at_boundary() {
        assert_eq!(Errno::ENOENT.as_isize(), -2);
        assert_eq!(Errno::ENOSYS.as_isize(), -38);
    }
}
