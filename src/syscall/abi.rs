//! # Syscall ABI
//!
//! Extração de argumentos do `TrapFrame` e acesso validado à memória do
//! chamador.
//!
//! Convenção de registradores (i686, `int 0x80`):
//! - EAX: número da syscall / resultado
//! - EBX, ECX, EDX, ESI, EDI: arg1..arg5

use core::mem::size_of;

use crate::arch::trap::TrapFrame;
use crate::ipc::message::Message;
use crate::mm::vmm;
use crate::sys::{Errno, SYSCALL_FAILURE};

pub type SysResult<T> = Result<T, Errno>;

/// Maior string aceita (caminhos, nomes de serviço, títulos).
pub const MAX_STR_LEN: usize = 256;
/// Maior buffer aceito numa única chamada.
pub const MAX_BUF_LEN: usize = 1024 * 1024;

/// Argumentos de syscall extraídos do frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyscallArgs {
    pub num: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
    pub arg5: usize,
}

impl SyscallArgs {
    pub fn from_frame(frame: &TrapFrame) -> Self {
        Self {
            num: frame.eax as usize,
            arg1: frame.ebx as usize,
            arg2: frame.ecx as usize,
            arg3: frame.edx as usize,
            arg4: frame.esi as usize,
            arg5: frame.edi as usize,
        }
    }
}

/// Valor final de EAX. Toda falha vira `-1`.
pub fn encode(result: SysResult<usize>) -> u32 {
    match result {
        Ok(value) => value as u32,
        Err(_) => SYSCALL_FAILURE as u32,
    }
}

/// Checagens que não dependem do mapeamento: ponteiro nulo, overflow e
/// tamanho máximo.
pub fn check_span(ptr: usize, len: usize, max: usize) -> SysResult<()> {
    if len > max {
        return Err(Errno::EINVAL);
    }
    if len == 0 {
        return Ok(());
    }
    if ptr == 0 {
        return Err(Errno::EFAULT);
    }
    if ptr as u64 + len as u64 > 1 << 32 {
        return Err(Errno::EFAULT);
    }
    Ok(())
}

fn check_user(ptr: usize, len: usize, max: usize, write: bool) -> SysResult<()> {
    check_span(ptr, len, max)?;
    vmm::check_user_range(ptr as u32, len, write).map_err(|_| Errno::EFAULT)
}

/// Buffer de leitura do chamador.
pub fn user_bytes<'a>(ptr: usize, len: usize) -> SysResult<&'a [u8]> {
    check_user(ptr, len, MAX_BUF_LEN, false)?;
    if len == 0 {
        return Ok(&[]);
    }
    // SAFETY: faixa mapeada para o usuário no diretório ativo
    Ok(unsafe { core::slice::from_raw_parts(ptr as *const u8, len) })
}

/// Buffer de escrita do chamador.
pub fn user_bytes_mut<'a>(ptr: usize, len: usize) -> SysResult<&'a mut [u8]> {
    check_user(ptr, len, MAX_BUF_LEN, true)?;
    if len == 0 {
        return Ok(&mut []);
    }
    // SAFETY: faixa mapeada e gravável no diretório ativo
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len) })
}

/// String UTF-8 `(ptr, len)` do chamador.
pub fn user_str<'a>(ptr: usize, len: usize) -> SysResult<&'a str> {
    if len == 0 {
        return Err(Errno::EINVAL);
    }
    check_user(ptr, len, MAX_STR_LEN, false)?;
    // SAFETY: faixa validada acima
    let bytes = unsafe { core::slice::from_raw_parts(ptr as *const u8, len) };
    core::str::from_utf8(bytes).map_err(|_| Errno::EINVAL)
}

pub fn read_message(ptr: usize) -> SysResult<Message> {
    check_user(ptr, size_of::<Message>(), size_of::<Message>(), false)?;
    // SAFETY: faixa validada; Message é repr(C) e Copy
    Ok(unsafe { core::ptr::read_unaligned(ptr as *const Message) })
}

pub fn write_message(ptr: usize, msg: &Message) -> SysResult<()> {
    check_user(ptr, size_of::<Message>(), size_of::<Message>(), true)?;
    // SAFETY: faixa validada e gravável
    unsafe { core::ptr::write_unaligned(ptr as *mut Message, *msg) };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_register_convention() {
        let frame = TrapFrame {
            eax: 0x22,
            ebx: 1,
            ecx: 2,
            edx: 3,
            esi: 4,
            edi: 5,
            ..TrapFrame::default()
        };
        let args = SyscallArgs::from_frame(&frame);
        assert_eq!(args.num, 0x22);
        assert_eq!((args.arg1, args.arg2, args.arg3, args.arg4, args.arg5), (1, 2, 3, 4, 5));
    }

    #[test]
    fn failures_encode_as_minus_one() {
        assert_eq!(encode(Ok(7)), 7);
        assert_eq!(encode(Err(Errno::ENOENT)), 0xFFFF_FFFF);
        assert_eq!(encode(Err(Errno::ENOSYS)) as i32, -1);
    }

    #[test]
    fn span_checks() {
        assert_eq!(check_span(0, 0, 16), Ok(()));
        assert_eq!(check_span(0, 4, 16), Err(Errno::EFAULT));
        assert_eq!(check_span(0x1000, 17, 16), Err(Errno::EINVAL));
        assert_eq!(check_span(0xFFFF_FFF0, 16, 16), Ok(()));
        assert_eq!(check_span(0xFFFF_FFF1, 16, 16), Err(Errno::EFAULT));
    }
}
