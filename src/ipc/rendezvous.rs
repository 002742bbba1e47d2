//! Máquina de estados do IPC síncrono.
//!
//! Só manipula a tabela de tasks: decide se a operação completou
//! (`Delivered`/`Received`) ou se o chamador deve ser estacionado
//! (`Blocked`). Quem chama (`ipc::mod`) segura o lock da tabela e, no caso
//! `Blocked`, entrega a CPU ao scheduler.
//!
//! Ordem de entrega no `receive`:
//! 1. IRQs pendentes (só para `Source::Any`)
//! 2. notificações pendentes, uma por remetente
//! 3. remetentes bloqueados, em ordem FIFO

use super::message::{Message, MessageType, Source};
use crate::sched::scheduler::TaskTable;
use crate::sched::task::TaskState;
use crate::sys::{Errno, Pid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A mensagem foi entregue ao destino.
    Delivered,
    /// Mensagem disponível de imediato.
    Received(Message),
    /// O chamador ficou bloqueado.
    Blocked,
}

fn alive(table: &TaskTable, pid: Pid) -> Result<(), Errno> {
    match table.get(pid) {
        Some(task) if task.is_alive() => Ok(()),
        _ => Err(Errno::ESRCH),
    }
}

/// O destino está em `receive` aceitando `from`?
fn is_receiving_from(table: &TaskTable, dst: Pid, from: Pid) -> bool {
    matches!(
        table.get(dst).map(|t| t.state),
        Some(TaskState::ReceiveBlocked(src)) if src.accepts(from)
    )
}

fn deliver(table: &mut TaskTable, from: Pid, dst: Pid, mut msg: Message) {
    msg.sender = from.as_u32();
    if let Some(task) = table.get_mut(dst) {
        task.ipc_slot = Some(msg);
        task.ipc_error = None;
    }
    table.make_ready(dst);
}

pub fn send(table: &mut TaskTable, me: Pid, dst: Pid, msg: Message) -> Result<Outcome, Errno> {
    if me == dst {
        return Err(Errno::EINVAL);
    }
    alive(table, dst)?;

    if is_receiving_from(table, dst, me) {
        deliver(table, me, dst, msg);
        return Ok(Outcome::Delivered);
    }

    if let Some(task) = table.get_mut(me) {
        let mut msg = msg;
        msg.sender = me.as_u32();
        task.outgoing = Some(msg);
        task.ipc_error = None;
    }
    table.set_state(me, TaskState::SendBlocked(dst));
    if let Some(target) = table.get_mut(dst) {
        target.send_waiters.push_back(me);
    }
    Ok(Outcome::Blocked)
}

/// `send` seguido de `receive(dst)`, sem janela para outro remetente.
pub fn sendrec(table: &mut TaskTable, me: Pid, dst: Pid, msg: Message) -> Result<Outcome, Errno> {
    match send(table, me, dst, msg)? {
        Outcome::Delivered => {
            if let Some(task) = table.get_mut(me) {
                task.ipc_slot = None;
            }
            table.set_state(me, TaskState::ReceiveBlocked(Source::Task(dst)));
        }
        _ => {
            if let Some(task) = table.get_mut(me) {
                task.expects_reply = true;
            }
        }
    }
    Ok(Outcome::Blocked)
}

pub fn receive(table: &mut TaskTable, me: Pid, src: Source) -> Result<Outcome, Errno> {
    if let Source::Task(pid) = src {
        if pid == me {
            return Err(Errno::EINVAL);
        }
        alive(table, pid)?;
    }

    let task = table.get_mut(me).ok_or(Errno::ESRCH)?;

    if src == Source::Any && task.pending_irqs != 0 {
        let irq = task.pending_irqs.trailing_zeros();
        task.pending_irqs &= !(1 << irq);
        let msg = Message::new(MessageType::Irq).with_arg(0, irq);
        return Ok(Outcome::Received(msg));
    }

    let notifier = task.pending_notify.keys().copied().find(|&p| src.accepts(p));
    if let Some(from) = notifier {
        if let Some(msg) = task.pending_notify.remove(&from) {
            return Ok(Outcome::Received(msg));
        }
    }

    let position = task.send_waiters.iter().position(|&p| src.accepts(p));
    if let Some(sender) = position.and_then(|i| task.send_waiters.remove(i)) {
        let waiter = table.get_mut(sender).ok_or(Errno::ESRCH)?;
        let msg = waiter.outgoing.take().unwrap_or_else(Message::empty);
        if waiter.expects_reply {
            waiter.expects_reply = false;
            table.set_state(sender, TaskState::ReceiveBlocked(Source::Task(me)));
        } else {
            table.make_ready(sender);
        }
        return Ok(Outcome::Received(msg));
    }

    if let Some(task) = table.get_mut(me) {
        task.ipc_slot = None;
        task.ipc_error = None;
    }
    table.set_state(me, TaskState::ReceiveBlocked(src));
    Ok(Outcome::Blocked)
}

/// Resposta a quem está em `receive` de `me`. Nunca bloqueia; fora desse
/// estado é erro e nada muda.
pub fn reply(table: &mut TaskTable, me: Pid, dst: Pid, msg: Message) -> Result<(), Errno> {
    alive(table, dst)?;
    match table.get(dst).map(|t| t.state) {
        Some(TaskState::ReceiveBlocked(Source::Task(p))) if p == me => {
            deliver(table, me, dst, msg);
            Ok(())
        }
        _ => Err(Errno::EINVAL),
    }
}

/// Não bloqueante: entrega agora ou guarda (uma por remetente).
pub fn notify(table: &mut TaskTable, me: Pid, dst: Pid, msg: Message) -> Result<(), Errno> {
    if me == dst {
        return Err(Errno::EINVAL);
    }
    alive(table, dst)?;
    if is_receiving_from(table, dst, me) {
        deliver(table, me, dst, msg);
        return Ok(());
    }
    let mut msg = msg;
    msg.sender = me.as_u32();
    if let Some(task) = table.get_mut(dst) {
        task.pending_notify.insert(me, msg);
    }
    Ok(())
}

/// Notificação de IRQ vinda do kernel (remetente 0).
pub fn post_irq(table: &mut TaskTable, dst: Pid, irq: u8) -> Result<(), Errno> {
    alive(table, dst)?;
    if matches!(
        table.get(dst).map(|t| t.state),
        Some(TaskState::ReceiveBlocked(Source::Any))
    ) {
        let msg = Message::new(MessageType::Irq).with_arg(0, irq as u32);
        deliver(table, Pid::NONE, dst, msg);
    } else if let Some(task) = table.get_mut(dst) {
        task.pending_irqs |= 1 << (irq & 0xF);
    }
    Ok(())
}

/// Mensagem entregue enquanto `me` estava bloqueada.
pub fn take_delivered(table: &mut TaskTable, me: Pid) -> Result<Message, Errno> {
    let task = table.get_mut(me).ok_or(Errno::ESRCH)?;
    if let Some(err) = task.ipc_error.take() {
        return Err(err);
    }
    task.ipc_slot.take().ok_or(Errno::EAGAIN)
}

/// Resultado de um `send` que bloqueou: `Ok` se o destino consumiu.
pub fn take_send_result(table: &mut TaskTable, me: Pid) -> Result<(), Errno> {
    let task = table.get_mut(me).ok_or(Errno::ESRCH)?;
    match task.ipc_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Libera quem depende de `dead`: remetentes na fila dele e receptores
/// esperando por ele acordam com `ESRCH`.
pub fn cancel(table: &mut TaskTable, dead: Pid) {
    let waiters = match table.get_mut(dead) {
        Some(task) => {
            task.outgoing = None;
            task.pending_notify.clear();
            core::mem::take(&mut task.send_waiters)
        }
        None => Default::default(),
    };

    let mut orphans: alloc::vec::Vec<Pid> = waiters.into_iter().collect();
    for task in table.iter_mut() {
        task.send_waiters.retain(|&p| p != dead);
        task.pending_notify.remove(&dead);
        if task.state == TaskState::ReceiveBlocked(Source::Task(dead)) {
            orphans.push(task.pid);
        }
    }

    for pid in orphans {
        if pid == dead {
            continue;
        }
        if let Some(task) = table.get_mut(pid) {
            task.outgoing = None;
            task.expects_reply = false;
            task.ipc_error = Some(Errno::ESRCH);
        }
        table.make_ready(pid);
    }
}
