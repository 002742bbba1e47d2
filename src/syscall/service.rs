//! # Service Syscalls
//!
//! Registro de nomes, IRQs e privilégios de I/O para os servidores.
//!
//! `grant_io` só marca a task; o bit IOPL entra no EFLAGS salvo quando a
//! task alvo volta de uma syscall (ver `dispatch`).

use super::abi::{user_str, SysResult, SyscallArgs};
use crate::ipc;
use crate::sched::{self, config::PRIORITY_IDLE};
use crate::sys::{Errno, Pid};

/// A task corrente tem IOPL=3?
pub fn caller_has_iopl() -> bool {
    sched::with_tasks(|table| table.current().is_some_and(|t| t.iopl))
}

fn require_iopl() -> SysResult<()> {
    if caller_has_iopl() {
        Ok(())
    } else {
        crate::kwarn!("(Syscall) operação privilegiada negada, pid=", sched::task_get_current().as_u32());
        Err(Errno::EPERM)
    }
}

pub fn sys_register_service_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    ipc::register_service(user_str(args.arg1, args.arg2)?)?;
    Ok(0)
}

pub fn sys_lookup_service_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let pid = ipc::lookup_service(user_str(args.arg1, args.arg2)?);
    Ok(pid.as_u32() as usize)
}

pub fn sys_grant_io_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    require_iopl()?;
    let me = sched::task_get_current();
    let pid = if args.arg1 == 0 { me } else { Pid::new(args.arg1 as u32) };
    sched::with_tasks(|table| {
        let task = table.get_mut(pid).filter(|t| t.is_alive()).ok_or(Errno::ESRCH)?;
        task.iopl = true;
        Ok::<_, Errno>(())
    })?;
    crate::kinfo!("(Syscall) IOPL concedido ao pid=", pid.as_u32());
    Ok(0)
}

pub fn sys_register_irq_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    require_iopl()?;
    let irq = u8::try_from(args.arg1).map_err(|_| Errno::EINVAL)?;
    ipc::irq::register_irq(irq, sched::task_get_current())?;
    Ok(0)
}

/// `entry` precisa ser código visível em ring 3 no espaço shared-kernel.
pub fn sys_create_task_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let entry = args.arg1 as u32;
    let priority = u8::try_from(args.arg2).map_err(|_| Errno::EINVAL)?;
    let iopl = args.arg3 != 0;
    if entry == 0 || priority > PRIORITY_IDLE {
        return Err(Errno::EINVAL);
    }
    if iopl {
        require_iopl()?;
    }
    let pid = sched::task_spawn_user("task", entry, priority, iopl)?;
    Ok(pid.as_u32() as usize)
}
