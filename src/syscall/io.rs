//! # I/O Syscalls
//!
//! Descritores legados. 0..2 são o console; a partir de `FIRST_FD` cada
//! descritor aponta para um caminho do VFS.
//!
//! | fd  | `read`                  | `write`          |
//! |-----|-------------------------|------------------|
//! | 0   | ring do teclado         | erro             |
//! | 1,2 | erro                    | serial COM1      |
//! | 3.. | VFS (`fd_read`)         | VFS (`fd_write`) |

use super::abi::{user_bytes, user_bytes_mut, user_str, SysResult, SyscallArgs};
use crate::drivers::{keyboard, serial};
use crate::fs::vfs::{self, OpenFlags};
use crate::sched;
use crate::sys::{Errno, Pid};

const STDIN: usize = 0;
const STDOUT: usize = 1;
const STDERR: usize = 2;

// === WRAPPERS ===

pub fn sys_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let data = user_bytes(args.arg2, args.arg3)?;
    sys_write(sched::task_get_current(), args.arg1, data)
}

pub fn sys_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let buf = user_bytes_mut(args.arg2, args.arg3)?;
    sys_read(sched::task_get_current(), args.arg1, buf)
}

pub fn sys_open_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let flags = OpenFlags::from_abi(args.arg3 as u32);
    vfs::vfs().open(sched::task_get_current(), path, flags)
}

pub fn sys_close_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    vfs::vfs().close(sched::task_get_current(), args.arg1)?;
    Ok(0)
}

pub fn sys_chdir_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    vfs::vfs().chdir(sched::task_get_current(), path)?;
    Ok(0)
}

pub fn sys_getcwd_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let buf = user_bytes_mut(args.arg1, args.arg2)?;
    let cwd = vfs::vfs().cwd(sched::task_get_current());
    copy_out(cwd.as_bytes(), buf)
}

// === IMPLEMENTAÇÕES ===

pub fn sys_write(pid: Pid, fd: usize, data: &[u8]) -> SysResult<usize> {
    match fd {
        STDOUT | STDERR => {
            serial::emit_bytes(data);
            Ok(data.len())
        }
        STDIN => Err(Errno::EBADF),
        _ => vfs::vfs().fd_write(pid, fd, data),
    }
}

/// O teclado nunca bloqueia: devolve o que houver no ring (talvez 0).
pub fn sys_read(pid: Pid, fd: usize, buf: &mut [u8]) -> SysResult<usize> {
    match fd {
        STDIN => Ok(drain(buf, keyboard::getchar)),
        STDOUT | STDERR => Err(Errno::EBADF),
        _ => vfs::vfs().fd_read(pid, fd, buf),
    }
}

fn drain(buf: &mut [u8], mut next: impl FnMut() -> Option<u8>) -> usize {
    let mut n = 0;
    while n < buf.len() {
        match next() {
            Some(byte) => {
                buf[n] = byte;
                n += 1;
            }
            None => break,
        }
    }
    n
}

/// Copia `src` inteiro para `dst`; buffer curto é erro, não truncamento.
pub fn copy_out(src: &[u8], dst: &mut [u8]) -> SysResult<usize> {
    let target = dst.get_mut(..src.len()).ok_or(Errno::EINVAL)?;
    target.copy_from_slice(src);
    Ok(src.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_stops_when_ring_is_empty() {
        let mut source = b"ab".iter().copied();
        let mut buf = [0u8; 4];
        assert_eq!(drain(&mut buf, || source.next()), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(drain(&mut buf, || None), 0);
    }

    #[test]
    fn copy_out_rejects_short_buffers() {
        let mut buf = [0u8; 4];
        assert_eq!(copy_out(b"/tmp", &mut buf), Ok(4));
        assert_eq!(copy_out(b"/disk", &mut buf), Err(Errno::EINVAL));
    }

    #[test]
    fn console_descriptors() {
        let mut buf = [0u8; 4];
        assert_eq!(sys_read(Pid(1), STDOUT, &mut buf), Err(Errno::EBADF));
        assert_eq!(sys_write(Pid(1), STDIN, b"x"), Err(Errno::EBADF));
    }
}
