//! # VFS Router
//!
//! Resolve o caminho contra o cwd do processo e escolhe o destino pelo
//! prefixo.
//!
//! | Prefixo   | Destino                                  |
//! |-----------|------------------------------------------|
//! | `/proc`   | procfs (texto gerado na leitura)         |
//! | `/disk`   | volume do drive 0 (FAT16 ou NTFS)        |
//! | `/disk2`  | volume do drive 1                        |
//! | resto     | RAMFS                                    |
//!
//! Cada drive ATA carrega um único sistema de arquivos. A montagem tenta
//! FAT16 primeiro e depois NTFS.
//!
//! Nenhum lock fica preso durante a leitura de `/proc`: o procfs consulta
//! as montagens deste mesmo módulo.

pub mod fd;
pub mod path;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::{Mutex, Once};

pub use fd::{FileTable, OpenFile, OpenFlags};
pub use path::{normalize, route, Route};

use super::error::{FsError, FsResult};
use super::fat16::Fat16;
use super::ntfs::Ntfs;
use super::procfs;
use super::ramfs::RamFs;
use super::types::{DirEntry, FileStat, NodeKind, VolumeInfo};
use crate::drivers::block::{BlockDevice, MAX_DRIVES};
use crate::sys::{Errno, Pid};

/// Volume montado num drive.
pub enum Volume {
    Fat16(Fat16),
    Ntfs(Ntfs),
}

macro_rules! on_volume {
    ($vol:expr, $fs:ident => $body:expr) => {
        match $vol {
            Volume::Fat16($fs) => $body,
            Volume::Ntfs($fs) => $body,
        }
    };
}

impl Volume {
    /// FAT16 primeiro, depois NTFS.
    pub fn probe(dev: Arc<dyn BlockDevice>) -> FsResult<Self> {
        match Fat16::mount(dev.clone()) {
            Ok(fs) => return Ok(Self::Fat16(fs)),
            Err(e) => crate::ktrace!("(VFS) Não é FAT16, erro=", Errno::from(e).as_isize() as u64),
        }
        Ntfs::mount(dev).map(Self::Ntfs).map_err(|_| FsError::Unsupported)
    }

    pub fn info(&self) -> VolumeInfo {
        on_volume!(self, fs => fs.info())
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        on_volume!(self, fs => fs.read_file(path))
    }

    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        on_volume!(self, fs => fs.read(path, buf))
    }

    pub fn write(&self, path: &str, data: &[u8]) -> FsResult<usize> {
        on_volume!(self, fs => fs.write(path, data))
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        on_volume!(self, fs => fs.stat(path))
    }

    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        on_volume!(self, fs => fs.list(path))
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        on_volume!(self, fs => fs.mkdir(path))
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        on_volume!(self, fs => fs.delete(path))
    }

    pub fn is_fat16(&self) -> bool {
        matches!(self, Self::Fat16(_))
    }

    pub fn is_ntfs(&self) -> bool {
        matches!(self, Self::Ntfs(_))
    }
}

fn copy_from(src: &[u8], offset: usize, buf: &mut [u8]) -> usize {
    let tail = src.get(offset..).unwrap_or(&[]);
    let n = tail.len().min(buf.len());
    buf[..n].copy_from_slice(&tail[..n]);
    n
}

/// Estado do roteador: RAMFS, volumes montados e descritores.
pub struct Vfs {
    ramfs: Mutex<RamFs>,
    volumes: Mutex<[Option<Arc<Volume>>; MAX_DRIVES]>,
    files: Mutex<FileTable>,
}

impl Vfs {
    /// RAMFS com `/tmp` já criado.
    pub fn new() -> Self {
        let mut ramfs = RamFs::new();
        let _ = ramfs.mkdir("/tmp");
        Self {
            ramfs: Mutex::new(ramfs),
            volumes: Mutex::new([None, None]),
            files: Mutex::new(FileTable::new()),
        }
    }

    // =========================================================================
    // MONTAGEM
    // =========================================================================

    pub fn mount_device(&self, drive: usize, dev: Arc<dyn BlockDevice>) -> FsResult<VolumeInfo> {
        if drive >= MAX_DRIVES {
            return Err(FsError::NotMounted);
        }
        let volume = Volume::probe(dev)?;
        let info = volume.info();
        self.volumes.lock()[drive] = Some(Arc::new(volume));
        Ok(info)
    }

    pub fn unmount(&self, drive: usize) {
        if let Some(slot) = self.volumes.lock().get_mut(drive) {
            *slot = None;
        }
    }

    pub fn volume(&self, drive: usize) -> Option<Arc<Volume>> {
        self.volumes.lock().get(drive)?.clone()
    }

    fn volume_or_err(&self, drive: usize) -> FsResult<Arc<Volume>> {
        self.volume(drive).ok_or(FsError::NotMounted)
    }

    pub fn mounts(&self) -> Vec<(&'static str, VolumeInfo)> {
        let volumes: Vec<(usize, Arc<Volume>)> = self
            .volumes
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.clone().map(|v| (i, v)))
            .collect();
        volumes
            .into_iter()
            .map(|(i, v)| (path::mount_point(i), v.info()))
            .collect()
    }

    // =========================================================================
    // OPERAÇÕES POR CAMINHO (absoluto e normalizado)
    // =========================================================================

    pub fn read_at(&self, path: &str, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        match route(path) {
            Route::Proc("") => Err(FsError::IsDir),
            Route::Proc(name) => procfs::read_at(name, offset, buf),
            Route::Disk(n, inner) => {
                let vol = self.volume_or_err(n)?;
                if offset == 0 {
                    vol.read(inner, buf)
                } else {
                    Ok(copy_from(&vol.read_file(inner)?, offset, buf))
                }
            }
            Route::Ram(inner) => self.ramfs.lock().read_at(inner, offset, buf),
        }
    }

    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        self.read_at(path, 0, buf)
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        match route(path) {
            Route::Proc("") => Err(FsError::IsDir),
            Route::Proc(name) => procfs::generate(name).map(String::into_bytes),
            Route::Disk(n, inner) => self.volume_or_err(n)?.read_file(inner),
            Route::Ram(inner) => self.ramfs.lock().read_file(inner),
        }
    }

    /// Substitui o conteúdo do arquivo (cria se preciso).
    pub fn write(&self, path: &str, data: &[u8]) -> FsResult<usize> {
        match route(path) {
            Route::Proc(_) => Err(FsError::Unsupported),
            Route::Disk(n, inner) => self.volume_or_err(n)?.write(inner, data),
            Route::Ram(inner) => self.ramfs.lock().write(inner, data),
        }
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        match route(path) {
            Route::Proc("") => Ok(FileStat::disk(NodeKind::Dir, 0)),
            Route::Proc(name) => {
                let len = procfs::generate(name)?.len();
                Ok(FileStat::disk(NodeKind::File, len as u64))
            }
            Route::Disk(n, inner) => self.volume_or_err(n)?.stat(inner),
            Route::Ram(inner) => self.ramfs.lock().stat(inner),
        }
    }

    /// Lista um diretório. A raiz do RAMFS ganha os pontos de montagem.
    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        match route(path) {
            Route::Proc("") => Ok(procfs::list()),
            Route::Proc(_) => Err(FsError::NotDir),
            Route::Disk(n, inner) => self.volume_or_err(n)?.list(inner),
            Route::Ram(inner) => {
                let mut entries = self.ramfs.lock().list(inner)?;
                if inner == "/" {
                    entries.push(dir_entry("proc"));
                    for (i, slot) in self.volumes.lock().iter().enumerate() {
                        if slot.is_some() {
                            entries.push(dir_entry(&path::mount_point(i)[1..]));
                        }
                    }
                }
                Ok(entries)
            }
        }
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        match route(path) {
            Route::Proc(_) => Err(FsError::Unsupported),
            Route::Disk(_, "/") => Err(FsError::Exists),
            Route::Disk(n, inner) => self.volume_or_err(n)?.mkdir(inner),
            Route::Ram(inner) => self.ramfs.lock().mkdir(inner),
        }
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        match route(path) {
            Route::Proc(_) => Err(FsError::Unsupported),
            Route::Disk(_, "/") => Err(FsError::InvalidName),
            Route::Disk(n, inner) => self.volume_or_err(n)?.delete(inner),
            Route::Ram(inner) => self.ramfs.lock().delete(inner),
        }
    }

    /// Acesso direto ao RAMFS (syscalls `ramfs_*`).
    pub fn with_ramfs<R>(&self, f: impl FnOnce(&mut RamFs) -> R) -> R {
        f(&mut self.ramfs.lock())
    }

    // =========================================================================
    // DESCRITORES
    // =========================================================================

    pub fn resolve(&self, pid: Pid, path: &str) -> String {
        normalize(self.files.lock().cwd(pid), path)
    }

    pub fn cwd(&self, pid: Pid) -> String {
        String::from(self.files.lock().cwd(pid))
    }

    pub fn chdir(&self, pid: Pid, path: &str) -> FsResult<()> {
        let abs = self.resolve(pid, path);
        if self.stat(&abs)?.kind != NodeKind::Dir {
            return Err(FsError::NotDir);
        }
        self.files.lock().set_cwd(pid, abs);
        Ok(())
    }

    pub fn open(&self, pid: Pid, path: &str, flags: OpenFlags) -> Result<usize, Errno> {
        let abs = self.resolve(pid, path);
        match self.stat(&abs) {
            Ok(st) if st.kind == NodeKind::Dir => return Err(Errno::EISDIR),
            Ok(_) if flags.contains(OpenFlags::TRUNC) => {
                self.write(&abs, &[])?;
            }
            Ok(_) => {}
            Err(FsError::NotFound) if flags.contains(OpenFlags::CREATE) => {
                self.write(&abs, &[])?;
            }
            Err(e) => return Err(e.into()),
        }
        let offset = if flags.contains(OpenFlags::APPEND) {
            self.stat(&abs)?.size as usize
        } else {
            0
        };
        self.files.lock().insert(pid, OpenFile { path: abs, offset, flags })
    }

    pub fn fd_read(&self, pid: Pid, fd: usize, buf: &mut [u8]) -> Result<usize, Errno> {
        let file = self.files.lock().get(pid, fd)?;
        if !file.flags.contains(OpenFlags::READ) {
            return Err(Errno::EBADF);
        }
        let n = self.read_at(&file.path, file.offset, buf)?;
        self.files.lock().set_offset(pid, fd, file.offset + n)?;
        Ok(n)
    }

    /// Os motores só gravam o arquivo inteiro: lê, emenda no offset e regrava.
    pub fn fd_write(&self, pid: Pid, fd: usize, data: &[u8]) -> Result<usize, Errno> {
        let file = self.files.lock().get(pid, fd)?;
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(Errno::EBADF);
        }
        let mut content = self.read_file(&file.path)?;
        let offset = if file.flags.contains(OpenFlags::APPEND) {
            content.len()
        } else {
            file.offset
        };
        let end = offset + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(data);
        self.write(&file.path, &content)?;
        self.files.lock().set_offset(pid, fd, end)?;
        Ok(data.len())
    }

    pub fn close(&self, pid: Pid, fd: usize) -> Result<(), Errno> {
        self.files.lock().remove(pid, fd).map(|_| ())
    }

    pub fn close_all(&self, pid: Pid) -> usize {
        self.files.lock().close_all(pid)
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_entry(name: &str) -> DirEntry {
    DirEntry {
        name: String::from(name),
        kind: NodeKind::Dir,
        size: 0,
    }
}

// =============================================================================
// INSTÂNCIA GLOBAL
// =============================================================================

static VFS: Once<Vfs> = Once::new();

pub fn vfs() -> &'static Vfs {
    VFS.call_once(Vfs::new)
}

/// Cria o RAMFS e monta os drives presentes.
pub fn init() {
    vfs();
    for n in 0..MAX_DRIVES {
        if crate::drivers::block::drive(n).is_some() {
            let _ = mount_drive(n);
        }
    }
}

/// Monta o drive ATA `n`.
pub fn mount_drive(n: usize) -> FsResult<VolumeInfo> {
    let dev = crate::drivers::block::drive(n).ok_or(FsError::NotMounted)?;
    match vfs().mount_device(n, dev) {
        Ok(info) => {
            crate::kinfo!("(VFS) Volume montado no drive ", n as u64);
            crate::kdebug!("(VFS) Tipo FAT16=", (info.fs_type == "FAT16") as u64);
            Ok(info)
        }
        Err(e) => {
            crate::kwarn!("(VFS) Drive sem sistema de arquivos conhecido: ", n as u64);
            Err(e)
        }
    }
}

pub fn mounts() -> Vec<(&'static str, VolumeInfo)> {
    vfs().mounts()
}

/// Limpeza na morte de `pid`.
pub fn close_all(pid: Pid) {
    let closed = vfs().close_all(pid);
    if closed > 0 {
        crate::ktrace!("(VFS) Descritores fechados: ", closed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::block::RamDisk;

    fn with_fat_disk() -> Vfs {
        let vfs = Vfs::new();
        let disk = Arc::new(RamDisk::new(65536));
        crate::fs::fat16::format(&*disk, 65536, Some("TEST")).unwrap();
        let info = vfs.mount_device(0, disk).unwrap();
        assert_eq!(info.fs_type, "FAT16");
        vfs
    }

    #[test]
    fn ramfs_scenario() {
        let vfs = Vfs::new();
        assert_eq!(vfs.write("/tmp/a", b"hello").unwrap(), 5);
        let mut buf = [0u8; 8];
        assert_eq!(vfs.read("/tmp/a", &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn fat16_mount_reports_label() {
        let vfs = with_fat_disk();
        assert_eq!(vfs.volume(0).unwrap().info().label, "TEST");
        assert!(vfs.volume(0).unwrap().is_fat16());
        assert_eq!(vfs.mounts().len(), 1);
        assert_eq!(vfs.mounts()[0].0, "/disk");
    }

    #[test]
    fn disk_paths_reach_the_volume() {
        let vfs = with_fat_disk();
        vfs.mkdir("/disk/docs").unwrap();
        vfs.write("/disk/docs/readme.txt", b"on disk").unwrap();
        assert_eq!(vfs.read_file("/disk/docs/readme.txt").unwrap(), b"on disk");
        assert_eq!(vfs.list("/disk").unwrap().len(), 1);
        assert_eq!(vfs.stat("/disk/docs").unwrap().kind, NodeKind::Dir);
        vfs.delete("/disk/docs/readme.txt").unwrap();
        assert_eq!(vfs.read_file("/disk/docs/readme.txt").unwrap_err(), FsError::NotFound);
        assert!(vfs.read_file("/tmp/docs/readme.txt").is_err());
    }

    #[test]
    fn ntfs_is_probed_after_fat16() {
        let vfs = Vfs::new();
        let disk = Arc::new(RamDisk::new(16384));
        crate::fs::ntfs::format(&*disk, 16384, Some("NT")).unwrap();
        let info = vfs.mount_device(1, disk).unwrap();
        assert_eq!(info.fs_type, "NTFS");
        vfs.write("/disk2/x.txt", b"ntfs").unwrap();
        assert_eq!(vfs.read_file("/disk2/x.txt").unwrap(), b"ntfs");
        assert_eq!(vfs.read_file("/disk/x.txt").unwrap_err(), FsError::NotMounted);
    }

    #[test]
    fn blank_disk_does_not_mount() {
        let vfs = Vfs::new();
        let disk = Arc::new(RamDisk::new(4096));
        assert_eq!(vfs.mount_device(0, disk).unwrap_err(), FsError::Unsupported);
        assert!(vfs.volume(0).is_none());
    }

    #[test]
    fn root_listing_shows_mount_points() {
        let vfs = with_fat_disk();
        let names: Vec<String> = vfs.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert!(names.iter().any(|n| n == "tmp"));
        assert!(names.iter().any(|n| n == "proc"));
        assert!(names.iter().any(|n| n == "disk"));
        assert!(!names.iter().any(|n| n == "disk2"));
    }

    #[test]
    fn proc_is_read_only() {
        let vfs = Vfs::new();
        assert_eq!(vfs.write("/proc/version", b"x").unwrap_err(), FsError::Unsupported);
        assert_eq!(vfs.mkdir("/proc/x").unwrap_err(), FsError::Unsupported);
        assert_eq!(vfs.list("/proc").unwrap().len(), procfs::FILES.len());
        let mut buf = [0u8; 64];
        let n = vfs.read("/proc/version", &mut buf).unwrap();
        assert!(buf[..n].starts_with(b"Basalt"));
        assert_eq!(vfs.read_at("/proc/version", n, &mut buf).unwrap(), 0);
    }

    #[test]
    fn descriptors_read_and_write_sequentially() {
        let vfs = Vfs::new();
        let pid = Pid(9);
        vfs.chdir(pid, "/tmp").unwrap();
        let fd = vfs
            .open(pid, "log", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE)
            .unwrap();
        vfs.fd_write(pid, fd, b"abc").unwrap();
        vfs.fd_write(pid, fd, b"def").unwrap();
        assert_eq!(vfs.read_file("/tmp/log").unwrap(), b"abcdef");
        vfs.close(pid, fd).unwrap();

        let fd = vfs.open(pid, "/tmp/log", OpenFlags::READ).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(vfs.fd_read(pid, fd, &mut buf).unwrap(), 4);
        assert_eq!(vfs.fd_read(pid, fd, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(vfs.fd_read(pid, fd, &mut buf).unwrap(), 0);
        assert_eq!(vfs.fd_write(pid, fd, b"x").unwrap_err(), Errno::EBADF);
        assert_eq!(vfs.close_all(pid), 1);
    }

    #[test]
    fn open_flags_are_honoured() {
        let vfs = Vfs::new();
        let pid = Pid(4);
        assert_eq!(vfs.open(pid, "/tmp/none", OpenFlags::READ).unwrap_err(), Errno::ENOENT);
        assert_eq!(vfs.open(pid, "/tmp", OpenFlags::READ).unwrap_err(), Errno::EISDIR);
        vfs.write("/tmp/t", b"12345").unwrap();
        let fd = vfs.open(pid, "/tmp/t", OpenFlags::WRITE | OpenFlags::APPEND).unwrap();
        vfs.fd_write(pid, fd, b"6").unwrap();
        assert_eq!(vfs.read_file("/tmp/t").unwrap(), b"123456");
        vfs.open(pid, "/tmp/t", OpenFlags::WRITE | OpenFlags::TRUNC).unwrap();
        assert_eq!(vfs.stat("/tmp/t").unwrap().size, 0);
    }

    #[test]
    fn chdir_requires_directory() {
        let vfs = Vfs::new();
        let pid = Pid(2);
        vfs.write("/tmp/f", b"").unwrap();
        assert_eq!(vfs.chdir(pid, "/tmp/f").unwrap_err(), FsError::NotDir);
        assert_eq!(vfs.chdir(pid, "/nope").unwrap_err(), FsError::NotFound);
        vfs.chdir(pid, "/tmp").unwrap();
        assert_eq!(vfs.cwd(pid), "/tmp");
        assert_eq!(vfs.resolve(pid, "../x"), "/x");
    }
}
