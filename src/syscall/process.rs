//! # Process & Time Syscalls
//!
//! exit, getpid, sleep, yield, exec, waitpid e os três relógios.
//!
//! | Syscall     | Fonte                              |
//! |-------------|------------------------------------|
//! | `time`      | segundos desde o boot              |
//! | `get_time`  | milissegundos desde o boot         |
//! | `get_ticks` | ticks do PIT (100 Hz)              |

use super::abi::{user_str, SysResult, SyscallArgs};
use crate::drivers::timer;
use crate::fs::vfs;
use crate::sched::{self, config::PRIORITY_NORMAL, exec};
use crate::sys::{Errno, Pid};

// === WRAPPERS ===

pub fn sys_exit_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_exit(args.arg1 as i32)
}

pub fn sys_getpid_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(sched::task_get_current().as_u32() as usize)
}

pub fn sys_sleep_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sched::task_sleep(args.arg1 as u64);
    Ok(0)
}

pub fn sys_yield_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    sched::task_yield();
    Ok(0)
}

pub fn sys_exec_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    sys_exec(sched::task_get_current(), path)
}

pub fn sys_waitpid_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let code = sched::task_wait(Pid::new(args.arg1 as u32))?;
    Ok(code as u32 as usize)
}

pub fn sys_time_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok((timer::uptime_ms() / 1000) as usize)
}

pub fn sys_get_time_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(timer::uptime_ms() as usize)
}

pub fn sys_get_ticks_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(timer::ticks() as usize)
}

// === IMPLEMENTAÇÕES ===

/// Encerra a task atual. Nunca retorna.
pub fn sys_exit(code: i32) -> ! {
    crate::kdebug!("(Syscall) exit code=", code as u32);
    sched::task_exit(code)
}

/// Lê o executável pelo VFS (relativo ao cwd) e instancia a task.
pub fn sys_exec(caller: Pid, path: &str) -> SysResult<usize> {
    let fs = vfs::vfs();
    let abs = fs.resolve(caller, path);
    let image = fs.read_file(&abs)?;
    let pid = exec::load(&image, task_name(&abs), PRIORITY_NORMAL, false, 0).map_err(|err| {
        crate::kwarn!("(Syscall) exec falhou:");
        crate::kwarn!(err.as_str());
        Errno::from(err)
    })?;
    crate::kinfo!("(Syscall) exec pid=", pid.as_u32());
    Ok(pid.as_u32() as usize)
}

/// Nome da task: o último componente do caminho.
pub fn task_name(path: &str) -> &str {
    path.rsplit('/').find(|c| !c.is_empty()).unwrap_or("exec")
}
