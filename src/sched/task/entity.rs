//! Thread Control Block

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use super::state::TaskState;
use crate::ipc::message::Message;
use crate::klib::string::FixedName;
use crate::mm::addr::PhysAddr;
use crate::sched::config::{DEFAULT_QUANTUM, KERNEL_STACK_SIZE};
use crate::sys::{Errno, Pid, Tick};

/// Stack de kernel alocada no heap.
pub struct KernelStack {
    memory: Box<[u8]>,
}

impl KernelStack {
    pub fn new() -> Result<Self, Errno> {
        Self::with_size(KERNEL_STACK_SIZE)
    }

    pub fn with_size(size: usize) -> Result<Self, Errno> {
        let mut memory = Vec::new();
        memory.try_reserve_exact(size).map_err(|_| Errno::ENOMEM)?;
        memory.resize(size, 0u8);
        Ok(Self {
            memory: memory.into_boxed_slice(),
        })
    }

    /// Endereço logo após o último byte, alinhado a 16.
    pub fn top(&self) -> usize {
        (self.memory.as_ptr() as usize + self.memory.len()) & !0xF
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }
}

/// Blocos do heap de usuário (`malloc`/`free`), em páginas.
#[derive(Default)]
pub struct UserHeap {
    /// Próximo endereço nunca usado
    pub cursor: u32,
    /// início → número de páginas
    pub blocks: BTreeMap<u32, usize>,
}

impl UserHeap {
    /// Reserva `pages` páginas: primeiro no cursor, depois no primeiro
    /// buraco deixado por `release`.
    pub fn reserve(&mut self, pages: usize) -> Option<u32> {
        use crate::mm::config::{PAGE_SIZE, USER_HEAP_BASE, USER_HEAP_END};
        let size = (pages as u64) * PAGE_SIZE as u64;
        if pages == 0 {
            return None;
        }
        let cursor = self.cursor.max(USER_HEAP_BASE);
        let addr = if cursor as u64 + size <= USER_HEAP_END as u64 {
            self.cursor = cursor + size as u32;
            cursor
        } else {
            let mut prev_end = USER_HEAP_BASE as u64;
            let mut found = None;
            for (&start, &len) in &self.blocks {
                if start as u64 - prev_end >= size {
                    found = Some(prev_end as u32);
                    break;
                }
                prev_end = start as u64 + (len * PAGE_SIZE) as u64;
            }
            found?
        };
        self.blocks.insert(addr, pages);
        Some(addr)
    }

    /// Devolve o número de páginas do bloco que começa em `addr`.
    pub fn release(&mut self, addr: u32) -> Option<usize> {
        self.blocks.remove(&addr)
    }
}

pub struct Task {
    pub pid: Pid,
    pub name: FixedName<32>,
    pub state: TaskState,
    /// 0 = realtime ... 3 = idle
    pub priority: u8,
    /// `None` só para a task de boot (idle), que usa a stack do boot.
    pub kernel_stack: Option<KernelStack>,
    /// ESP salvo pelo `switch_context`.
    pub esp: usize,
    pub user_stack_top: u32,
    pub page_dir: PhysAddr,
    /// O diretório é da task (destruído no reap).
    pub owns_directory: bool,
    pub iopl: bool,
    pub is_user: bool,
    pub sleep_until: Tick,
    pub quantum_left: u32,

    // --- IPC ---
    /// Mensagem entregue enquanto a task estava bloqueada.
    pub ipc_slot: Option<Message>,
    /// Mensagem que uma task em SendBlocked quer entregar.
    pub outgoing: Option<Message>,
    /// Depois do send, a task espera a resposta (sendrec).
    pub expects_reply: bool,
    /// Falha assíncrona (contraparte morreu).
    pub ipc_error: Option<Errno>,
    /// Remetentes bloqueados esperando esta task, em ordem FIFO.
    pub send_waiters: VecDeque<Pid>,
    /// Notificações pendentes, uma por remetente (coalescidas).
    pub pending_notify: BTreeMap<Pid, Message>,
    /// IRQs pendentes (bit = número da IRQ).
    pub pending_irqs: u16,

    // --- Fim de vida ---
    pub exit_code: Option<i32>,
    pub terminated_at: Tick,
    /// Frames de usuário a liberar no reap.
    pub owned_frames: Vec<PhysAddr>,
    pub user_heap: UserHeap,
}

impl Task {
    pub fn new(pid: Pid, name: &str, priority: u8, page_dir: PhysAddr) -> Self {
        Self {
            pid,
            name: FixedName::new(name),
            state: TaskState::Ready,
            priority,
            kernel_stack: None,
            esp: 0,
            user_stack_top: 0,
            page_dir,
            owns_directory: false,
            iopl: false,
            is_user: false,
            sleep_until: 0,
            quantum_left: DEFAULT_QUANTUM,
            ipc_slot: None,
            outgoing: None,
            expects_reply: false,
            ipc_error: None,
            send_waiters: VecDeque::new(),
            pending_notify: BTreeMap::new(),
            pending_irqs: 0,
            exit_code: None,
            terminated_at: 0,
            owned_frames: Vec::new(),
            user_heap: UserHeap::default(),
        }
    }

    /// Topo da stack de kernel (para o TSS esp0).
    pub fn kernel_stack_top(&self) -> Option<usize> {
        self.kernel_stack.as_ref().map(KernelStack::top)
    }

    pub fn is_alive(&self) -> bool {
        self.state != TaskState::Terminated
    }
}

/// Resumo copiável de uma task (`task_get_all`, procfs, `ps`).
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo {
    pub pid: Pid,
    pub name: FixedName<32>,
    pub state: TaskState,
    pub priority: u8,
    pub is_user: bool,
    pub exit_code: Option<i32>,
}

impl From<&Task> for TaskInfo {
    fn from(task: &Task) -> Self {
        Self {
            pid: task.pid,
            name: task.name,
            state: task.state,
            priority: task.priority,
            is_user: task.is_user,
            exit_code: task.exit_code,
        }
    }
}
