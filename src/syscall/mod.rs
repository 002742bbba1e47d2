//! # Syscall Gate (`int 0x80`)
//!
//! Numeração própria do Basalt (não é Linux). Cada handler recebe os
//! argumentos crus e devolve `SysResult<usize>`; na fronteira qualquer
//! `Err` vira `-1` em EAX e o código específico só aparece no log.
//!
//! | Módulo    | Conteúdo                                            |
//! |-----------|-----------------------------------------------------|
//! | `abi`     | `SyscallArgs`, acesso validado à memória do usuário |
//! | `numbers` | constantes `SYS_*`                                  |
//! | `table`   | tabela estática número → handler                    |
//! | `process` | exit, getpid, sleep, yield, exec, waitpid, relógios |
//! | `io`      | read, write, open, close, chdir, getcwd             |
//! | `memory`  | malloc, free                                        |
//! | `ipc`     | send, receive, sendrec, reply, notify               |
//! | `service` | registro de serviços, IRQs, IOPL, create_task       |
//! | `support` | teclado, ramfs, procfs, fat16, ntfs, ata, net, log  |
//! | `gui`     | janelas e GPU 3D                                    |

pub mod abi;
pub mod gui;
pub mod io;
pub mod ipc;
pub mod memory;
pub mod numbers;
pub mod process;
pub mod service;
pub mod support;
pub mod table;

pub use abi::{SysResult, SyscallArgs};
pub use table::SYSCALL_TABLE;

use crate::arch::trap::TrapFrame;
use crate::sys::Errno;

/// IOPL=3 em EFLAGS.
const EFLAGS_IOPL3: u32 = 3 << 12;

/// Entrada do vetor 0x80, chamada por `trap_dispatch`.
pub fn dispatch(frame: &mut TrapFrame) {
    let args = SyscallArgs::from_frame(frame);

    let result = match table::lookup(args.num) {
        Some(handler) => handler(&args),
        None => Err(Errno::ENOSYS),
    };

    if let Err(err) = result {
        crate::ktrace!("(Syscall) Falha num=", args.num);
        crate::ktrace!(err.as_str());
    }
    frame.eax = abi::encode(result);

    // IOPL concedido por grant_io vale a partir da próxima volta a ring 3
    if frame.from_user() && service::caller_has_iopl() {
        frame.eflags |= EFLAGS_IOPL3;
    }
}
