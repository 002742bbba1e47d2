//! Registro de serviços: nome → pid, busca linear numa tabela fixa.

use alloc::vec::Vec;

use crate::klib::string::FixedName;
use crate::sys::{Errno, Pid};

/// Máximo de serviços registrados.
pub const MAX_SERVICES: usize = 32;
pub const SERVICE_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct ServiceEntry {
    pub name: FixedName<SERVICE_NAME_LEN>,
    pub pid: Pid,
}

pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &str, pid: Pid) -> Result<(), Errno> {
        if name.is_empty() || name.len() > SERVICE_NAME_LEN {
            return Err(Errno::EINVAL);
        }
        if self.lookup(name).is_some() {
            return Err(Errno::EEXIST);
        }
        if self.entries.len() >= MAX_SERVICES {
            return Err(Errno::ENOSPC);
        }
        self.entries.push(ServiceEntry {
            name: FixedName::new(name),
            pid,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Pid> {
        self.entries
            .iter()
            .find(|e| e.name.as_str() == name)
            .map(|e| e.pid)
    }

    /// Remove tudo que `pid` registrou; devolve quantos.
    pub fn unregister_all(&mut self, pid: Pid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.pid != pid);
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut r = ServiceRegistry::new();
        assert_eq!(r.register("vfs", Pid::new(3)), Ok(()));
        assert_eq!(r.register("vfs", Pid::new(4)), Err(Errno::EEXIST));
        assert_eq!(r.lookup("vfs"), Some(Pid::new(3)));
        assert_eq!(r.lookup("ata"), None);
    }

    #[test]
    fn exit_removes_every_entry_of_the_task() {
        let mut r = ServiceRegistry::new();
        r.register("console", Pid::new(2)).unwrap();
        r.register("tty", Pid::new(2)).unwrap();
        r.register("vfs", Pid::new(3)).unwrap();
        assert_eq!(r.unregister_all(Pid::new(2)), 2);
        assert_eq!(r.entries().len(), 1);
        assert_eq!(r.register("console", Pid::new(5)), Ok(()));
    }

    #[test]
    fn table_is_bounded() {
        let mut r = ServiceRegistry::new();
        for i in 0..MAX_SERVICES {
            let name = alloc::format!("svc{}", i);
            r.register(&name, Pid::new(2)).unwrap();
        }
        assert_eq!(r.register("extra", Pid::new(2)), Err(Errno::ENOSPC));
    }
}
