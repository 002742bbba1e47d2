//! # IPC Syscalls
//!
//! Ponte fina para `crate::ipc`. A mensagem do usuário é copiada inteira
//! (`Message` é `repr(C)`, 88 bytes); o kernel preenche `sender`.

use super::abi::{read_message, write_message, SysResult, SyscallArgs};
use crate::ipc::{self, Message, MessageType, Source};
use crate::sys::Pid;

fn target(raw: usize) -> Pid {
    Pid::new(raw as u32)
}

pub fn sys_send_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let msg = read_message(args.arg2)?;
    ipc::send(target(args.arg1), msg)?;
    Ok(0)
}

pub fn sys_receive_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    // valida o destino antes de bloquear: a mensagem não pode se perder
    write_message(args.arg2, &Message::empty())?;
    let msg = ipc::receive(Source::from_raw(args.arg1 as u32))?;
    write_message(args.arg2, &msg)?;
    Ok(msg.sender as usize)
}

pub fn sys_sendrec_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let msg = read_message(args.arg2)?;
    write_message(args.arg2, &msg)?;
    let reply = ipc::sendrec(target(args.arg1), msg)?;
    write_message(args.arg2, &reply)?;
    Ok(0)
}

pub fn sys_reply_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let msg = read_message(args.arg2)?;
    ipc::reply(target(args.arg1), msg)?;
    Ok(0)
}

pub fn sys_notify_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let msg = Message::new(MessageType::Notify).with_arg(0, args.arg2 as u32);
    ipc::notify(target(args.arg1), msg)?;
    Ok(0)
}
