//! # Multitasking & Scheduler Subsystem
//!
//! Tasks preemptivas com prioridade estrita (0 realtime .. 3 idle),
//! round-robin dentro da classe, sobre um único CPU.
//!
//! ## Arquitetura
//! - `scheduler::TaskTable`: tabela de tasks + filas prontas (lógica pura).
//! - Este módulo: a tabela global, a troca de contexto e a API `task_*`.
//! - `exec`: carregador ELF32 que termina em `task_create_from_elf`.
//!
//! ## Pontos de reescalonamento
//! 1. **Preemptivo:** cada tick do timer (IRQ 0) chama `on_timer_tick`.
//! 2. **Cooperativo:** `task_yield`, `task_sleep`, IPC bloqueante, `task_exit`.
//!
//! A troca roda com interrupções desligadas; cada task restaura o seu IF ao
//! voltar de `schedule` (tasks novas ligam no trampolim ou via `iretd`).

pub mod config;
pub mod exec;
pub mod scheduler;
pub mod task;

#[cfg(feature = "self_test")]
pub mod test;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::platform::{context, gdt};
use crate::arch::{Cpu, CpuOps};
use crate::drivers::timer;
use crate::ipc::rendezvous;
use crate::mm::addr::PhysAddr;
use crate::mm::{pmm, vmm};
use crate::sync::Spinlock;
use crate::sys::{Errno, Pid};

use config::{PRIORITY_IDLE, PRIORITY_LEVELS, ZOMBIE_TTL_TICKS};
use exec::SegmentMapper;
use scheduler::TaskTable;
use task::{KernelStack, Task, TaskInfo, TaskState};

pub use context::TaskEntry;

static TASKS: Spinlock<TaskTable> = Spinlock::new(TaskTable::new());

/// Pid da idle (não pode ser morta).
static IDLE_PID: AtomicU32 = AtomicU32::new(0);

/// Acesso à tabela sob o lock (IRQs desligadas durante `f`).
pub(crate) fn with_tasks<R>(f: impl FnOnce(&mut TaskTable) -> R) -> R {
    f(&mut TASKS.lock())
}

/// Adota o contexto de boot como a task idle (pid 1, prioridade 3).
pub fn task_init() {
    let mut table = TASKS.lock();
    let pid = table.alloc_pid().unwrap_or(Pid::new(1));
    let idle = Task::new(pid, "idle", PRIORITY_IDLE, vmm::kernel_directory());
    table.install_current(idle);
    IDLE_PID.store(pid.as_u32(), Ordering::SeqCst);
    crate::kinfo!("(Sched) Idle instalada, pid=", pid.as_u32());
}

fn check_priority(priority: u8) -> Result<(), Errno> {
    if (priority as usize) < PRIORITY_LEVELS {
        Ok(())
    } else {
        Err(Errno::EINVAL)
    }
}

/// Reserva um pid e instala a task construída por `make`.
///
/// Tabela cheia: tenta recolher zumbis antes de desistir.
fn insert_new(make: impl FnOnce(Pid) -> Task) -> Result<Pid, Errno> {
    if TASKS.lock().alloc_pid().is_none() {
        reap_zombies(0);
    }
    let mut table = TASKS.lock();
    let pid = table.alloc_pid().ok_or(Errno::EAGAIN)?;
    Ok(table.insert(make(pid)))
}

/// Task ring 0 no diretório do kernel, com stack própria no heap.
pub fn task_create_kernel(name: &str, entry: TaskEntry, priority: u8) -> Result<Pid, Errno> {
    check_priority(priority)?;
    let stack = KernelStack::new()?;
    // SAFETY: stack recém alocada, exclusiva da task
    let esp = unsafe { context::prepare_kernel_stack(stack.top(), entry) };
    let pd = vmm::kernel_directory();

    let pid = insert_new(|pid| {
        let mut task = Task::new(pid, name, priority, pd);
        task.kernel_stack = Some(stack);
        task.esp = esp;
        task
    })?;
    crate::kdebug!("(Sched) Task de kernel criada, pid=", pid.as_u32());
    Ok(pid)
}

/// Task ring 3 num espaço shared-kernel: `entry` é código do próprio kernel,
/// executável em ring 3 porque o identity map leva USER nesse espaço.
pub fn task_create_user(name: &str, entry: TaskEntry, priority: u8, iopl: bool) -> Result<Pid, Errno> {
    task_spawn_user(name, entry as usize as u32, priority, iopl)
}

/// Igual a `task_create_user`, com o entry já como endereço (`create_task`).
pub fn task_spawn_user(name: &str, entry: u32, priority: u8, iopl: bool) -> Result<Pid, Errno> {
    check_priority(priority)?;
    let pd = vmm::create_address_space().map_err(Errno::from)?;
    let mut mapper = exec::KernelMapper::new(pd);

    let built = exec::map_user_stack(&mut mapper)
        .map_err(Errno::from)
        .and_then(|top| KernelStack::new().map(|stack| (top, stack)));
    let (user_top, stack) = match built {
        Ok(parts) => parts,
        Err(err) => {
            mapper.rollback();
            return Err(err);
        }
    };

    let frames = mapper.take_frames();
    task_create_from_elf(name, entry, user_top, pd, stack, priority, iopl, frames)
}

/// Instala uma task de usuário já montada (diretório, stack de usuário,
/// frames). Em caso de erro os frames e o diretório são devolvidos aqui;
/// a stack de kernel cai junto com `kstack`.
#[allow(clippy::too_many_arguments)]
pub fn task_create_from_elf(
    name: &str,
    entry: u32,
    user_stack_top: u32,
    pd: PhysAddr,
    kstack: KernelStack,
    priority: u8,
    iopl: bool,
    frames: Vec<PhysAddr>,
) -> Result<Pid, Errno> {
    // SAFETY: stack de kernel exclusiva da nova task
    let esp = unsafe { context::prepare_user_stack(kstack.top(), entry, user_stack_top, iopl) };

    let mut frames = Some(frames);
    let result = check_priority(priority).and_then(|_| insert_new(|pid| {
        let mut task = Task::new(pid, name, priority, pd);
        task.kernel_stack = Some(kstack);
        task.esp = esp;
        task.user_stack_top = user_stack_top;
        task.owns_directory = true;
        task.is_user = true;
        task.iopl = iopl;
        task.owned_frames = frames.take().unwrap_or_default();
        task.user_heap.cursor = crate::mm::config::USER_HEAP_BASE;
        task
    }));

    match result {
        Ok(pid) => {
            crate::kdebug!("(Sched) Task de usuário criada, pid=", pid.as_u32());
            Ok(pid)
        }
        Err(err) => {
            // devolve o que a task teria possuído
            for frame in frames.take().unwrap_or_default() {
                pmm::free_page(frame);
            }
            vmm::destroy_address_space(pd);
            Err(err)
        }
    }
}

/// Dados da troca decidida sob o lock.
struct Switch {
    old_esp: *mut usize,
    new_esp: usize,
    kstack_top: Option<usize>,
    page_dir: PhysAddr,
}

/// Dispatcher: acorda quem dormiu o bastante, escolhe e troca.
fn schedule(rotate: bool) {
    let interrupts = Cpu::are_interrupts_enabled();
    Cpu::disable_interrupts();

    let switch = {
        let mut table = TASKS.lock();
        table.wake_sleepers(timer::ticks());
        table.select(rotate).and_then(|(old, new)| {
            let old_esp = &mut table.get_mut(old)?.esp as *mut usize;
            let next = table.get(new)?;
            Some(Switch {
                old_esp,
                new_esp: next.esp,
                kstack_top: next.kernel_stack_top(),
                page_dir: next.page_dir,
            })
        })
    };

    if let Some(sw) = switch {
        if let Some(top) = sw.kstack_top {
            gdt::set_kernel_stack(top as u32);
        }
        // SAFETY: o diretório da próxima task mapeia o kernel e a sua stack;
        // `old_esp` aponta para o TCB (Box) da task que sai, vivo até o reap
        unsafe {
            vmm::switch(sw.page_dir);
            context::switch(sw.old_esp, sw.new_esp);
        }
    }

    if interrupts {
        Cpu::enable_interrupts();
    }
}

/// IRQ 0: quantum e preempção.
pub fn on_timer_tick() {
    let expired = {
        let mut table = TASKS.lock();
        if table.current_pid().is_none() {
            return;
        }
        table.tick()
    };
    schedule(expired);
}

/// Bloqueia a corrente (o estado já foi ajustado sob o lock) e troca.
pub(crate) fn reschedule() {
    schedule(false);
}

pub fn task_yield() {
    schedule(true);
}

/// Dorme ao menos `ms` (arredondado para cima, mínimo 1 tick).
pub fn task_sleep(ms: u64) {
    let until = timer::ticks() + timer::ms_to_ticks(ms).max(1);
    with_tasks(|table| {
        let pid = table.current_pid();
        table.sleep(pid, until);
    });
    schedule(false);
}

/// Marca `pid` como terminada e solta tudo que outras tasks esperam dela.
fn terminate(pid: Pid, code: i32) -> Result<(), Errno> {
    with_tasks(|table| {
        let task = table.get_mut(pid).filter(|t| t.is_alive()).ok_or(Errno::ESRCH)?;
        task.exit_code = Some(code);
        task.terminated_at = timer::ticks();
        table.set_state(pid, TaskState::Terminated);
        rendezvous::cancel(table, pid);
        Ok::<(), Errno>(())
    })?;

    crate::ipc::unregister_all(pid);
    crate::gui::on_task_exit(pid);
    crate::fs::vfs::close_all(pid);
    crate::drivers::virtio::gpu3d::release(pid);
    crate::kdebug!("(Sched) Task terminada, pid=", pid.as_u32());
    Ok(())
}

pub fn task_exit(code: i32) -> ! {
    let pid = task_get_current();
    if terminate(pid, code).is_err() {
        crate::kerror!("(Sched) exit sem task corrente");
    }
    schedule(false);
    // nunca volta: ninguém reagenda uma task terminada
    loop {
        Cpu::halt();
    }
}

/// Mata `pid`. Se for a corrente, cede a CPU na hora.
pub fn task_kill(pid: Pid) -> Result<(), Errno> {
    if pid.as_u32() == IDLE_PID.load(Ordering::SeqCst) {
        return Err(Errno::EPERM);
    }
    terminate(pid, -1)?;
    if pid == task_get_current() {
        schedule(false);
    }
    Ok(())
}

/// Falha de CPU em ring 3: a task morre e o trap nunca retorna.
pub fn kill_current_after_fault() -> ! {
    let pid = task_get_current();
    crate::kerror!("(Sched) Matando task após falha, pid=", pid.as_u32());
    let _ = terminate(pid, -1);
    schedule(false);
    loop {
        Cpu::halt();
    }
}

/// Retorno de `entry` numa task de kernel.
#[no_mangle]
pub extern "C" fn task_exit_trampoline(code: i32) -> ! {
    task_exit(code)
}

pub fn task_get_current() -> Pid {
    TASKS.lock().current_pid()
}

/// Pid corrente, `None` antes do `task_init`.
pub fn current_pid() -> Option<Pid> {
    Some(task_get_current()).filter(|p| !p.is_none())
}

pub fn task_get_by_pid(pid: Pid) -> Option<TaskInfo> {
    TASKS.lock().get(pid).map(TaskInfo::from)
}

pub fn task_get_all() -> Vec<TaskInfo> {
    TASKS.lock().iter().map(TaskInfo::from).collect()
}

pub fn task_count() -> usize {
    TASKS.lock().count()
}

/// Diretório da task corrente.
pub fn current_directory() -> PhysAddr {
    TASKS
        .lock()
        .current()
        .map(|t| t.page_dir)
        .unwrap_or_else(vmm::kernel_directory)
}

/// Remove uma task terminada e libera stack, frames e diretório.
/// Devolve o código de saída.
pub fn task_reap(pid: Pid) -> Result<i32, Errno> {
    let task = with_tasks(|table| {
        match table.get(pid) {
            Some(t) if t.state == TaskState::Terminated => {}
            Some(_) => return Err(Errno::EBUSY),
            None => return Err(Errno::ESRCH),
        }
        table.remove(pid).ok_or(Errno::EBUSY)
    })?;

    let code = task.exit_code.unwrap_or(0);
    for &frame in &task.owned_frames {
        pmm::free_page(frame);
    }
    if task.owns_directory {
        vmm::destroy_address_space(task.page_dir);
    }
    crate::ktrace!("(Sched) Task recolhida, pid=", pid.as_u32());
    Ok(code)
}

/// Espera `pid` terminar e devolve o código de saída.
pub fn task_wait(pid: Pid) -> Result<i32, Errno> {
    if pid == task_get_current() {
        return Err(Errno::EINVAL);
    }
    loop {
        match task_get_by_pid(pid) {
            None => return Err(Errno::ESRCH),
            Some(info) if info.state == TaskState::Terminated => return task_reap(pid),
            Some(_) => task_sleep(10),
        }
    }
}

/// Recolhe zumbis terminados há pelo menos `ttl` ticks.
pub fn reap_zombies(ttl: u64) -> usize {
    let due = TASKS.lock().expired_zombies(timer::ticks(), ttl);
    due.into_iter().filter(|&pid| task_reap(pid).is_ok()).count()
}

/// Laço da task idle: recolhe zumbis antigos e espera interrupções.
pub fn idle_loop() -> ! {
    loop {
        reap_zombies(ZOMBIE_TTL_TICKS);
        crate::drivers::virtio::poll_input();
        Cpu::enable_interrupts();
        Cpu::halt();
    }
}
