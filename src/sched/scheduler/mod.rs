//! # Tabela de tasks e política de escalonamento
//!
//! Lógica pura, sem troca de contexto: `sched` segura a tabela global sob
//! um `Spinlock`, pede a `select` quem roda e só então troca de pilha.
//!
//! ## Política
//! - Prioridade estrita: a classe mais baixa numericamente ganha.
//! - FIFO dentro da classe; a task preemptada vai para o fim da sua classe.
//! - A task corrente continua enquanto for a melhor, a não ser que o
//!   quantum tenha acabado e haja outra da mesma classe pronta.

pub mod runqueue;

use alloc::boxed::Box;
use alloc::vec::Vec;

pub use runqueue::RunQueue;

use crate::sched::config::{DEFAULT_QUANTUM, MAX_TASKS};
use crate::sched::task::{Task, TaskState};
use crate::sys::{Pid, Tick};

pub struct TaskTable {
    /// Índice = pid; slot 0 nunca é usado.
    slots: Vec<Option<Box<Task>>>,
    ready: RunQueue,
    current: Pid,
}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            ready: RunQueue::new(),
            current: Pid::NONE,
        }
    }

    pub fn current_pid(&self) -> Pid {
        self.current
    }

    pub fn get(&self, pid: Pid) -> Option<&Task> {
        self.slots.get(pid.as_u32() as usize)?.as_deref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Task> {
        self.slots.get_mut(pid.as_u32() as usize)?.as_deref_mut()
    }

    pub fn current(&self) -> Option<&Task> {
        self.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Task> {
        let pid = self.current;
        self.get_mut(pid)
    }

    /// Primeiro pid livre em 1..=MAX_TASKS.
    pub fn alloc_pid(&self) -> Option<Pid> {
        (1..=MAX_TASKS)
            .find(|&i| self.slots.get(i).map_or(true, Option::is_none))
            .map(|i| Pid::new(i as u32))
    }

    /// Instala `task` no slot do seu pid. Tasks `Ready` entram na fila.
    pub fn insert(&mut self, task: Task) -> Pid {
        let pid = task.pid;
        let index = pid.as_u32() as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let ready = task.state == TaskState::Ready;
        let priority = task.priority;
        self.slots[index] = Some(Box::new(task));
        if ready {
            self.ready.push(pid, priority);
        }
        pid
    }

    /// Adota o contexto em execução (boot) como task corrente.
    pub fn install_current(&mut self, mut task: Task) -> Pid {
        task.state = TaskState::Running;
        let pid = self.insert(task);
        self.current = pid;
        pid
    }

    /// Remove a task da tabela (reap). Nunca remove a corrente.
    pub fn remove(&mut self, pid: Pid) -> Option<Box<Task>> {
        if pid == self.current {
            return None;
        }
        self.ready.remove(pid);
        self.slots.get_mut(pid.as_u32() as usize)?.take()
    }

    pub fn make_ready(&mut self, pid: Pid) {
        let is_current = pid == self.current;
        let priority = match self.get_mut(pid) {
            Some(task) if task.state != TaskState::Terminated => {
                task.state = if is_current { TaskState::Running } else { TaskState::Ready };
                task.priority
            }
            _ => return,
        };
        if !is_current {
            self.ready.push(pid, priority);
        }
    }

    /// Muda o estado de uma task não pronta (bloqueio, sono, término).
    pub fn set_state(&mut self, pid: Pid, state: TaskState) {
        if let Some(task) = self.get_mut(pid) {
            task.state = state;
            self.ready.remove(pid);
        }
    }

    pub fn sleep(&mut self, pid: Pid, until: Tick) {
        if let Some(task) = self.get_mut(pid) {
            task.sleep_until = until;
        }
        self.set_state(pid, TaskState::Sleeping);
    }

    /// Acorda quem tem prazo `<= now`. Devolve quantas acordaram.
    pub fn wake_sleepers(&mut self, now: Tick) -> usize {
        let due: Vec<Pid> = self
            .iter()
            .filter(|t| t.state == TaskState::Sleeping && t.sleep_until <= now)
            .map(|t| t.pid)
            .collect();
        for &pid in &due {
            self.make_ready(pid);
        }
        due.len()
    }

    /// Consome um tick do quantum da corrente; `true` quando acabou.
    pub fn tick(&mut self) -> bool {
        match self.current_mut() {
            Some(task) => {
                task.quantum_left = task.quantum_left.saturating_sub(1);
                task.quantum_left == 0
            }
            None => false,
        }
    }

    /// Decide a próxima task. `rotate` cede a vez a iguais (yield ou
    /// quantum esgotado). Devolve `(anterior, próxima)` quando há troca.
    pub fn select(&mut self, rotate: bool) -> Option<(Pid, Pid)> {
        let old = self.current;
        let best = self.ready.best_priority();

        let running = self
            .get(old)
            .filter(|t| t.state == TaskState::Running)
            .map(|t| t.priority);

        if let Some(priority) = running {
            let keep = match best {
                None => true,
                Some(p) if p < priority => false,
                Some(p) => !(rotate && p == priority),
            };
            if keep {
                if rotate {
                    if let Some(task) = self.current_mut() {
                        task.quantum_left = DEFAULT_QUANTUM;
                    }
                }
                return None;
            }
            if let Some(task) = self.get_mut(old) {
                task.state = TaskState::Ready;
                task.quantum_left = DEFAULT_QUANTUM;
            }
            self.ready.push(old, priority);
        }

        let next = self.ready.pop()?;
        if let Some(task) = self.get_mut(next) {
            task.state = TaskState::Running;
            task.quantum_left = DEFAULT_QUANTUM;
        }
        self.current = next;
        (next != old).then_some((old, next))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.slots.iter().filter_map(|s| s.as_deref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.slots.iter_mut().filter_map(|s| s.as_deref_mut())
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Tasks terminadas há pelo menos `ttl` ticks (exceto a corrente).
    pub fn expired_zombies(&self, now: Tick, ttl: Tick) -> Vec<Pid> {
        self.iter()
            .filter(|t| t.state == TaskState::Terminated && t.pid != self.current)
            .filter(|t| now.saturating_sub(t.terminated_at) >= ttl)
            .map(|t| t.pid)
            .collect()
    }
}
