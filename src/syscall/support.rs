//! # Server-Support Syscalls
//!
//! Acesso direto dos servidores de ring 3 (console, vfs, ata, net) aos
//! subsistemas do kernel, sem passar pelo roteador de caminhos.
//!
//! | Família  | Alvo                                        |
//! |----------|---------------------------------------------|
//! | `kbd`    | ring do teclado                             |
//! | `ramfs`  | árvore em memória                           |
//! | `procfs` | arquivos gerados (`tasks`, `meminfo`, ...)  |
//! | `fat16`  | primeiro volume FAT16 montado               |
//! | `ntfs`   | primeiro volume NTFS montado                |
//! | `ata`    | setores crus de um drive                    |
//! | `net`    | RTL8139                                     |

use alloc::sync::Arc;

use super::abi::{user_bytes, user_bytes_mut, user_str, SysResult, SyscallArgs, MAX_BUF_LEN};
use crate::drivers::block::{self, MAX_DRIVES, SECTOR_SIZE};
use crate::drivers::{keyboard, rtl8139};
use crate::fs::types::NodeKind;
use crate::fs::vfs::{self, Volume};
use crate::fs::procfs;
use crate::sys::Errno;

// =============================================================================
// TECLADO
// =============================================================================

pub fn sys_kbd_getchar_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    keyboard::getchar().map(usize::from).ok_or(Errno::EAGAIN)
}

// =============================================================================
// RAMFS / PROCFS
// =============================================================================

pub fn sys_ramfs_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let buf = user_bytes_mut(args.arg3, args.arg4)?;
    let n = vfs::vfs().with_ramfs(|fs| fs.read_at(path, args.arg5, buf))?;
    Ok(n)
}

pub fn sys_ramfs_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let data = user_bytes(args.arg3, args.arg4)?;
    let n = vfs::vfs().with_ramfs(|fs| fs.write(path, data))?;
    Ok(n)
}

pub fn sys_ramfs_create_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let kind = node_kind(args.arg3)?;
    vfs::vfs().with_ramfs(|fs| fs.create(path, kind))?;
    Ok(0)
}

pub fn sys_ramfs_delete_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    vfs::vfs().with_ramfs(|fs| fs.delete(path))?;
    Ok(0)
}

pub fn sys_procfs_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let name = proc_name(user_str(args.arg1, args.arg2)?);
    let buf = user_bytes_mut(args.arg3, args.arg4)?;
    Ok(procfs::read_at(name, args.arg5, buf)?)
}

pub fn node_kind(raw: usize) -> SysResult<NodeKind> {
    match raw {
        0 => Ok(NodeKind::File),
        1 => Ok(NodeKind::Dir),
        _ => Err(Errno::EINVAL),
    }
}

/// Aceita `tasks` ou `/proc/tasks`.
pub fn proc_name(raw: &str) -> &str {
    raw.strip_prefix("/proc/").unwrap_or(raw)
}

// =============================================================================
// VOLUMES
// =============================================================================

fn first_volume(matches: fn(&Volume) -> bool) -> SysResult<Arc<Volume>> {
    let fs = vfs::vfs();
    (0..MAX_DRIVES)
        .filter_map(|n| fs.volume(n))
        .find(|v| matches(v))
        .ok_or(Errno::ENODEV)
}

fn volume_read(args: &SyscallArgs, matches: fn(&Volume) -> bool) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let buf = user_bytes_mut(args.arg3, args.arg4)?;
    Ok(first_volume(matches)?.read(path, buf)?)
}

fn volume_write(args: &SyscallArgs, matches: fn(&Volume) -> bool) -> SysResult<usize> {
    let path = user_str(args.arg1, args.arg2)?;
    let data = user_bytes(args.arg3, args.arg4)?;
    Ok(first_volume(matches)?.write(path, data)?)
}

pub fn sys_fat16_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    volume_read(args, Volume::is_fat16)
}

pub fn sys_fat16_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    volume_write(args, Volume::is_fat16)
}

pub fn sys_fat16_mounted_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(first_volume(Volume::is_fat16).is_ok() as usize)
}

pub fn sys_ntfs_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    volume_read(args, Volume::is_ntfs)
}

pub fn sys_ntfs_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    volume_write(args, Volume::is_ntfs)
}

pub fn sys_ntfs_mounted_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(first_volume(Volume::is_ntfs).is_ok() as usize)
}

// =============================================================================
// ATA
// =============================================================================

/// Bytes de `sectors` setores, dentro do limite de buffer.
pub fn sector_bytes(sectors: usize) -> SysResult<usize> {
    match sectors.checked_mul(SECTOR_SIZE) {
        Some(len) if sectors > 0 && len <= MAX_BUF_LEN => Ok(len),
        _ => Err(Errno::EINVAL),
    }
}

pub fn sys_ata_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let len = sector_bytes(args.arg4)?;
    let buf = user_bytes_mut(args.arg3, len)?;
    block::read_sectors(args.arg1, args.arg2 as u64, buf).map_err(|_| {
        crate::kwarn!("(Syscall) ata_read falhou, lba=", args.arg2);
        Errno::EIO
    })?;
    Ok(len)
}

pub fn sys_ata_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let len = sector_bytes(args.arg4)?;
    let data = user_bytes(args.arg3, len)?;
    block::write_sectors(args.arg1, args.arg2 as u64, data).map_err(|_| {
        crate::kwarn!("(Syscall) ata_write falhou, lba=", args.arg2);
        Errno::EIO
    })?;
    Ok(len)
}

pub fn sys_ata_info_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let info = block::drive_info(args.arg1).ok_or(Errno::ENODEV)?;
    Ok(info.total_blocks.min(u32::MAX as u64) as usize)
}

// =============================================================================
// REDE / DEBUG
// =============================================================================

pub fn sys_net_status_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(rtl8139::status().pack() as usize)
}

pub fn sys_net_poll_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    if !rtl8139::is_present() {
        return Err(Errno::ENODEV);
    }
    Ok(rtl8139::irq_count() as usize)
}

pub fn sys_debug_log_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let bytes = user_bytes(args.arg1, args.arg2)?;
    let text = core::str::from_utf8(bytes).map_err(|_| Errno::EINVAL)?;
    crate::kinfo!(text.trim_end());
    Ok(bytes.len())
}
