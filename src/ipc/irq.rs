//! IRQ → IPC: o dono de uma IRQ recebe uma notificação `Irq` a cada disparo.

use crate::arch::trap::IRQ_COUNT;
use crate::sync::Spinlock;
use crate::sys::{Errno, Pid};

/// Dono de cada linha (`Pid::NONE` = livre).
static IRQ_OWNERS: Spinlock<[Pid; IRQ_COUNT]> = Spinlock::new([Pid::NONE; IRQ_COUNT]);

/// IRQ 0 é do scheduler e nunca é encaminhada.
pub fn register_irq(irq: u8, owner: Pid) -> Result<(), Errno> {
    if irq == 0 || irq as usize >= IRQ_COUNT {
        return Err(Errno::EINVAL);
    }
    {
        let mut owners = IRQ_OWNERS.lock();
        let slot = &mut owners[irq as usize];
        if !slot.is_none() && *slot != owner {
            return Err(Errno::EBUSY);
        }
        *slot = owner;
    }
    crate::drivers::pic::unmask(irq);
    crate::kdebug!("(IPC) IRQ registrada: ", irq);
    Ok(())
}

pub fn owner(irq: u8) -> Option<Pid> {
    IRQ_OWNERS
        .lock()
        .get(irq as usize)
        .copied()
        .filter(|p| !p.is_none())
}

/// Chamado pelo roteador de traps, depois do handler do kernel.
pub fn forward_irq(irq: u8) {
    if let Some(pid) = owner(irq) {
        if crate::ipc::post_irq(pid, irq).is_err() {
            // dono morreu sem passar pelo cleanup
            release_all(pid);
        }
    }
}

pub fn release_all(pid: Pid) {
    for slot in IRQ_OWNERS.lock().iter_mut() {
        if *slot == pid {
            *slot = Pid::NONE;
        }
    }
}
