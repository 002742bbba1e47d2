//! Tabela de descritores das syscalls legadas `open/read/write/close`.
//!
//! Cada processo tem o seu cwd e até `MAX_OPEN_FILES` descritores a partir
//! de `FIRST_FD` (0..2 são o console). O descritor guarda só o caminho
//! normalizado e o offset; os motores de disco não têm handles próprios.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::fs::config::{FIRST_FD, MAX_OPEN_FILES};
use crate::sys::{Errno, Pid};

bitflags::bitflags! {
    /// Flags de `open` (valores da ABI).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenFlags: u32 {
        const READ   = 1 << 0;
        const WRITE  = 1 << 1;
        const CREATE = 1 << 2;
        const TRUNC  = 1 << 3;
        const APPEND = 1 << 4;
    }
}

impl OpenFlags {
    /// Sem bits de acesso vale como somente leitura.
    pub fn from_abi(raw: u32) -> Self {
        let flags = Self::from_bits_truncate(raw);
        if flags.intersects(Self::READ | Self::WRITE) {
            flags
        } else {
            flags | Self::READ
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub path: String,
    pub offset: usize,
    pub flags: OpenFlags,
}

struct ProcessFiles {
    cwd: String,
    fds: Vec<Option<OpenFile>>,
}

impl ProcessFiles {
    fn new() -> Self {
        Self {
            cwd: String::from("/"),
            fds: Vec::new(),
        }
    }
}

pub struct FileTable {
    procs: BTreeMap<Pid, ProcessFiles>,
}

impl FileTable {
    pub const fn new() -> Self {
        Self { procs: BTreeMap::new() }
    }

    pub fn cwd(&self, pid: Pid) -> &str {
        self.procs.get(&pid).map_or("/", |p| p.cwd.as_str())
    }

    pub fn set_cwd(&mut self, pid: Pid, cwd: String) {
        self.procs.entry(pid).or_insert_with(ProcessFiles::new).cwd = cwd;
    }

    pub fn insert(&mut self, pid: Pid, file: OpenFile) -> Result<usize, Errno> {
        let fds = &mut self.procs.entry(pid).or_insert_with(ProcessFiles::new).fds;
        let slot = match fds.iter().position(Option::is_none) {
            Some(i) => i,
            None if fds.len() < MAX_OPEN_FILES => {
                fds.push(None);
                fds.len() - 1
            }
            None => return Err(Errno::EMFILE),
        };
        fds[slot] = Some(file);
        Ok(slot + FIRST_FD)
    }

    fn slot(&mut self, pid: Pid, fd: usize) -> Result<&mut Option<OpenFile>, Errno> {
        let idx = fd.checked_sub(FIRST_FD).ok_or(Errno::EBADF)?;
        self.procs
            .get_mut(&pid)
            .and_then(|p| p.fds.get_mut(idx))
            .filter(|s| s.is_some())
            .ok_or(Errno::EBADF)
    }

    pub fn get(&mut self, pid: Pid, fd: usize) -> Result<OpenFile, Errno> {
        self.slot(pid, fd)?.clone().ok_or(Errno::EBADF)
    }

    pub fn set_offset(&mut self, pid: Pid, fd: usize, offset: usize) -> Result<(), Errno> {
        match self.slot(pid, fd)? {
            Some(file) => {
                file.offset = offset;
                Ok(())
            }
            None => Err(Errno::EBADF),
        }
    }

    pub fn remove(&mut self, pid: Pid, fd: usize) -> Result<OpenFile, Errno> {
        self.slot(pid, fd)?.take().ok_or(Errno::EBADF)
    }

    /// Descarta tudo do processo; devolve quantos descritores estavam abertos.
    pub fn close_all(&mut self, pid: Pid) -> usize {
        self.procs
            .remove(&pid)
            .map_or(0, |p| p.fds.iter().filter(|f| f.is_some()).count())
    }

    pub fn open_count(&self, pid: Pid) -> usize {
        self.procs
            .get(&pid)
            .map_or(0, |p| p.fds.iter().filter(|f| f.is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> OpenFile {
        OpenFile {
            path: String::from(path),
            offset: 0,
            flags: OpenFlags::READ,
        }
    }

    #[test]
    fn descriptors_start_after_console() {
        let mut table = FileTable::new();
        assert_eq!(table.insert(Pid(5), file("/a")).unwrap(), FIRST_FD);
        assert_eq!(table.insert(Pid(5), file("/b")).unwrap(), FIRST_FD + 1);
        assert_eq!(table.insert(Pid(6), file("/c")).unwrap(), FIRST_FD);
        assert_eq!(table.get(Pid(5), FIRST_FD + 1).unwrap().path, "/b");
    }

    #[test]
    fn closed_slot_is_reused() {
        let mut table = FileTable::new();
        let a = table.insert(Pid(1), file("/a")).unwrap();
        table.insert(Pid(1), file("/b")).unwrap();
        table.remove(Pid(1), a).unwrap();
        assert_eq!(table.get(Pid(1), a).unwrap_err(), Errno::EBADF);
        assert_eq!(table.insert(Pid(1), file("/c")).unwrap(), a);
    }

    #[test]
    fn bad_descriptors() {
        let mut table = FileTable::new();
        assert_eq!(table.get(Pid(1), 0).unwrap_err(), Errno::EBADF);
        assert_eq!(table.get(Pid(1), FIRST_FD).unwrap_err(), Errno::EBADF);
        table.insert(Pid(1), file("/a")).unwrap();
        assert_eq!(table.get(Pid(2), FIRST_FD).unwrap_err(), Errno::EBADF);
        assert_eq!(table.remove(Pid(1), 99).unwrap_err(), Errno::EBADF);
    }

    #[test]
    fn table_limit_and_close_all() {
        let mut table = FileTable::new();
        for _ in 0..MAX_OPEN_FILES {
            table.insert(Pid(3), file("/x")).unwrap();
        }
        assert_eq!(table.insert(Pid(3), file("/x")).unwrap_err(), Errno::EMFILE);
        table.set_cwd(Pid(3), String::from("/tmp"));
        assert_eq!(table.close_all(Pid(3)), MAX_OPEN_FILES);
        assert_eq!(table.open_count(Pid(3)), 0);
        assert_eq!(table.cwd(Pid(3)), "/");
    }

    #[test]
    fn offsets_are_tracked() {
        let mut table = FileTable::new();
        let fd = table.insert(Pid(1), file("/a")).unwrap();
        table.set_offset(Pid(1), fd, 42).unwrap();
        assert_eq!(table.get(Pid(1), fd).unwrap().offset, 42);
    }

    #[test]
    fn open_flags_default_to_read() {
        assert_eq!(OpenFlags::from_abi(0), OpenFlags::READ);
        assert_eq!(OpenFlags::from_abi(0b110), OpenFlags::WRITE | OpenFlags::CREATE);
        assert_eq!(OpenFlags::from_abi(1 << 31), OpenFlags::READ);
    }
}
