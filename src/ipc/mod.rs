//! # Inter-Process Communication (IPC)
//!
//! Rendezvous síncrono entre tasks, no estilo das mensagens de tamanho fixo.
//!
//! ## Mecanismos
//!
//! | Operação   | Bloqueia | Efeito                                         |
//! |------------|----------|------------------------------------------------|
//! | `send`     | Sim      | até o destino fazer `receive`                  |
//! | `receive`  | Sim      | até chegar mensagem (de `src` ou `Any`)        |
//! | `sendrec`  | Sim      | `send` + espera a resposta do mesmo destino    |
//! | `reply`    | Não      | só para quem está esperando resposta de mim    |
//! | `notify`   | Não      | entrega ou fica pendente (uma por remetente)   |
//!
//! A lógica fica em `rendezvous` (pura, testável no host). Aqui só se pega
//! o lock da tabela de tasks e, quando o resultado é `Blocked`, cede a CPU.

pub mod irq;
pub mod message;
pub mod registry;
pub mod rendezvous;

use alloc::vec::Vec;

pub use message::{Message, MessageType, Source};
pub use registry::ServiceEntry;

use crate::sched;
use crate::sync::Spinlock;
use crate::sys::{Errno, Pid};
use registry::ServiceRegistry;
use rendezvous::Outcome;

static REGISTRY: Spinlock<ServiceRegistry> = Spinlock::new(ServiceRegistry::new());

pub fn init() {
    crate::kinfo!("(IPC) Registro de serviços pronto, capacidade=", registry::MAX_SERVICES);
}

/// Cede a CPU até a task corrente sair do estado bloqueado.
fn park(me: Pid) {
    loop {
        sched::reschedule();
        let blocked = sched::with_tasks(|t| t.get(me).map(|task| task.state.is_blocked()));
        if blocked != Some(true) {
            break;
        }
    }
}

pub fn send(dst: Pid, msg: Message) -> Result<(), Errno> {
    let me = sched::task_get_current();
    match sched::with_tasks(|t| rendezvous::send(t, me, dst, msg))? {
        Outcome::Blocked => {
            park(me);
            sched::with_tasks(|t| rendezvous::take_send_result(t, me))
        }
        _ => Ok(()),
    }
}

pub fn receive(src: Source) -> Result<Message, Errno> {
    let me = sched::task_get_current();
    match sched::with_tasks(|t| rendezvous::receive(t, me, src))? {
        Outcome::Received(msg) => Ok(msg),
        _ => {
            park(me);
            sched::with_tasks(|t| rendezvous::take_delivered(t, me))
        }
    }
}

/// Envia e espera a resposta de `dst`.
pub fn sendrec(dst: Pid, msg: Message) -> Result<Message, Errno> {
    let me = sched::task_get_current();
    sched::with_tasks(|t| rendezvous::sendrec(t, me, dst, msg))?;
    park(me);
    sched::with_tasks(|t| rendezvous::take_delivered(t, me))
}

pub fn reply(dst: Pid, msg: Message) -> Result<(), Errno> {
    let me = sched::task_get_current();
    sched::with_tasks(|t| rendezvous::reply(t, me, dst, msg))
}

pub fn notify(dst: Pid, msg: Message) -> Result<(), Errno> {
    let me = sched::task_get_current();
    sched::with_tasks(|t| rendezvous::notify(t, me, dst, msg))
}

/// Chamado em contexto de IRQ; não reescalona.
pub fn post_irq(dst: Pid, irq: u8) -> Result<(), Errno> {
    sched::with_tasks(|t| rendezvous::post_irq(t, dst, irq))
}

pub fn register_service(name: &str) -> Result<(), Errno> {
    let me = sched::task_get_current();
    REGISTRY.lock().register(name, me)?;
    crate::kdebug!("(IPC) Serviço registrado por pid=", me.as_u32());
    Ok(())
}

/// Pid do serviço, ou `Pid::NONE`.
pub fn lookup_service(name: &str) -> Pid {
    REGISTRY.lock().lookup(name).unwrap_or(Pid::NONE)
}

/// Cópia do registro (para `/proc/services`).
pub fn services() -> Vec<ServiceEntry> {
    REGISTRY.lock().entries().to_vec()
}

/// Limpeza na morte de `pid`: serviços e IRQs.
pub fn unregister_all(pid: Pid) {
    let removed = REGISTRY.lock().unregister_all(pid);
    if removed > 0 {
        crate::ktrace!("(IPC) Serviços removidos: ", removed);
    }
    irq::release_all(pid);
}
