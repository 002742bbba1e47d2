//! Filas de tasks prontas, uma FIFO por classe de prioridade.

use alloc::collections::VecDeque;

use crate::sched::config::PRIORITY_LEVELS;
use crate::sys::Pid;

pub struct RunQueue {
    classes: [VecDeque<Pid>; PRIORITY_LEVELS],
}

impl RunQueue {
    pub const fn new() -> Self {
        Self {
            classes: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
        }
    }

    fn class(priority: u8) -> usize {
        (priority as usize).min(PRIORITY_LEVELS - 1)
    }

    /// Entra no fim da classe (ignorado se já está na fila).
    pub fn push(&mut self, pid: Pid, priority: u8) {
        let queue = &mut self.classes[Self::class(priority)];
        if !queue.contains(&pid) {
            queue.push_back(pid);
        }
    }

    pub fn remove(&mut self, pid: Pid) {
        for queue in &mut self.classes {
            queue.retain(|&p| p != pid);
        }
    }

    /// Melhor classe não vazia.
    pub fn best_priority(&self) -> Option<u8> {
        self.classes
            .iter()
            .position(|q| !q.is_empty())
            .map(|c| c as u8)
    }

    /// Cabeça da melhor classe.
    pub fn pop(&mut self) -> Option<Pid> {
        self.classes.iter_mut().find_map(|q| q.pop_front())
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.classes.iter().any(|q| q.contains(&pid))
    }

    pub fn len(&self) -> usize {
        self.classes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_priority_then_fifo() {
        let mut rq = RunQueue::new();
        rq.push(Pid::new(5), 2);
        rq.push(Pid::new(6), 2);
        rq.push(Pid::new(7), 1);
        rq.push(Pid::new(5), 2);
        assert_eq!(rq.len(), 3);
        assert_eq!(rq.best_priority(), Some(1));
        assert_eq!(rq.pop(), Some(Pid::new(7)));
        assert_eq!(rq.pop(), Some(Pid::new(5)));
        assert_eq!(rq.pop(), Some(Pid::new(6)));
        assert!(rq.is_empty());
    }

    #[test]
    fn out_of_range_priority_lands_in_idle_class() {
        let mut rq = RunQueue::new();
        rq.push(Pid::new(2), 9);
        assert_eq!(rq.best_priority(), Some(3));
    }
}
