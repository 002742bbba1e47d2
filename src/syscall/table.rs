//! # Syscall Table
//!
//! Tabela estática de handlers indexada por número de syscall.

use super::abi::{SysResult, SyscallArgs};
use super::numbers::*;
use super::{gui, io, ipc, memory, process, service, support};

/// Tipo de handler de syscall
pub type SyscallHandler = fn(&SyscallArgs) -> SysResult<usize>;

/// Tamanho da tabela (256 syscalls possíveis)
pub const TABLE_SIZE: usize = 256;

/// Tabela de syscalls
///
/// None = número livre (a chamada falha com ENOSYS).
pub static SYSCALL_TABLE: [Option<SyscallHandler>; TABLE_SIZE] = {
    let mut table: [Option<SyscallHandler>; TABLE_SIZE] = [None; TABLE_SIZE];

    // === LEGADO (0x01-0x0F) ===
    table[SYS_EXIT] = Some(process::sys_exit_wrapper);
    table[SYS_WRITE] = Some(io::sys_write_wrapper);
    table[SYS_READ] = Some(io::sys_read_wrapper);
    table[SYS_OPEN] = Some(io::sys_open_wrapper);
    table[SYS_CLOSE] = Some(io::sys_close_wrapper);
    table[SYS_GETPID] = Some(process::sys_getpid_wrapper);
    table[SYS_SLEEP] = Some(process::sys_sleep_wrapper);
    table[SYS_TIME] = Some(process::sys_time_wrapper);
    table[SYS_MALLOC] = Some(memory::sys_malloc_wrapper);
    table[SYS_FREE] = Some(memory::sys_free_wrapper);
    table[SYS_EXEC] = Some(process::sys_exec_wrapper);
    table[SYS_GET_TIME] = Some(process::sys_get_time_wrapper);
    table[SYS_GET_TICKS] = Some(process::sys_get_ticks_wrapper);
    table[SYS_YIELD] = Some(process::sys_yield_wrapper);
    table[SYS_WAITPID] = Some(process::sys_waitpid_wrapper);

    // === DIRETÓRIO CORRENTE (0x10-0x1F) ===
    table[SYS_CHDIR] = Some(io::sys_chdir_wrapper);
    table[SYS_GETCWD] = Some(io::sys_getcwd_wrapper);

    // === IPC (0x20-0x2F) ===
    table[SYS_SEND] = Some(ipc::sys_send_wrapper);
    table[SYS_RECEIVE] = Some(ipc::sys_receive_wrapper);
    table[SYS_SENDREC] = Some(ipc::sys_sendrec_wrapper);
    table[SYS_REPLY] = Some(ipc::sys_reply_wrapper);
    table[SYS_NOTIFY] = Some(ipc::sys_notify_wrapper);

    // === SERVIÇOS (0x30-0x3F) ===
    table[SYS_REGISTER_SERVICE] = Some(service::sys_register_service_wrapper);
    table[SYS_LOOKUP_SERVICE] = Some(service::sys_lookup_service_wrapper);
    table[SYS_GRANT_IO] = Some(service::sys_grant_io_wrapper);
    table[SYS_REGISTER_IRQ] = Some(service::sys_register_irq_wrapper);
    table[SYS_CREATE_TASK] = Some(service::sys_create_task_wrapper);

    // === SUPORTE A SERVIDORES (0x40-0x5F) ===
    table[SYS_KBD_GETCHAR] = Some(support::sys_kbd_getchar_wrapper);
    table[SYS_RAMFS_READ] = Some(support::sys_ramfs_read_wrapper);
    table[SYS_RAMFS_WRITE] = Some(support::sys_ramfs_write_wrapper);
    table[SYS_RAMFS_CREATE] = Some(support::sys_ramfs_create_wrapper);
    table[SYS_RAMFS_DELETE] = Some(support::sys_ramfs_delete_wrapper);
    table[SYS_PROCFS_READ] = Some(support::sys_procfs_read_wrapper);
    table[SYS_FAT16_READ] = Some(support::sys_fat16_read_wrapper);
    table[SYS_FAT16_WRITE] = Some(support::sys_fat16_write_wrapper);
    table[SYS_FAT16_MOUNTED] = Some(support::sys_fat16_mounted_wrapper);
    table[SYS_NTFS_READ] = Some(support::sys_ntfs_read_wrapper);
    table[SYS_NTFS_WRITE] = Some(support::sys_ntfs_write_wrapper);
    table[SYS_NTFS_MOUNTED] = Some(support::sys_ntfs_mounted_wrapper);
    table[SYS_ATA_READ] = Some(support::sys_ata_read_wrapper);
    table[SYS_ATA_WRITE] = Some(support::sys_ata_write_wrapper);
    table[SYS_ATA_INFO] = Some(support::sys_ata_info_wrapper);
    table[SYS_NET_STATUS] = Some(support::sys_net_status_wrapper);
    table[SYS_NET_POLL] = Some(support::sys_net_poll_wrapper);
    table[SYS_DEBUG_LOG] = Some(support::sys_debug_log_wrapper);

    // === JANELAS GUI (0x60-0x6F) ===
    table[SYS_GUI_WIN_OPEN] = Some(gui::sys_gui_win_open_wrapper);
    table[SYS_GUI_PRESENT] = Some(gui::sys_gui_present_wrapper);
    table[SYS_GUI_WIN_CLOSE] = Some(gui::sys_gui_win_close_wrapper);
    table[SYS_GUI_GET_TICKS] = Some(gui::sys_gui_get_ticks_wrapper);
    table[SYS_GUI_POLL] = Some(gui::sys_gui_poll_wrapper);

    // === GPU 3D (0x70-0x7F) ===
    table[SYS_VIRGL_SUBMIT] = Some(gui::sys_virgl_submit_wrapper);
    table[SYS_GPU3D_INIT] = Some(gui::sys_gpu3d_init_wrapper);
    table[SYS_GPU3D_CLEAR] = Some(gui::sys_gpu3d_clear_wrapper);
    table[SYS_GPU3D_UPLOAD] = Some(gui::sys_gpu3d_upload_wrapper);
    table[SYS_GPU3D_MVP] = Some(gui::sys_gpu3d_mvp_wrapper);
    table[SYS_GPU3D_DRAW] = Some(gui::sys_gpu3d_draw_wrapper);
    table[SYS_GPU3D_PRESENT] = Some(gui::sys_gpu3d_present_wrapper);

    table
};

/// Handler registrado para `num`, se houver.
pub fn lookup(num: usize) -> Option<SyscallHandler> {
    SYSCALL_TABLE.get(num).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[usize] = &[
        SYS_EXIT, SYS_WRITE, SYS_READ, SYS_OPEN, SYS_CLOSE, SYS_GETPID, SYS_SLEEP, SYS_TIME,
        SYS_MALLOC, SYS_FREE, SYS_EXEC, SYS_GET_TIME, SYS_GET_TICKS, SYS_YIELD, SYS_WAITPID,
        SYS_CHDIR, SYS_GETCWD, SYS_SEND, SYS_RECEIVE, SYS_SENDREC, SYS_REPLY, SYS_NOTIFY,
        SYS_REGISTER_SERVICE, SYS_LOOKUP_SERVICE, SYS_GRANT_IO, SYS_REGISTER_IRQ,
        SYS_CREATE_TASK, SYS_KBD_GETCHAR, SYS_RAMFS_READ, SYS_RAMFS_WRITE, SYS_RAMFS_CREATE,
        SYS_RAMFS_DELETE, SYS_PROCFS_READ, SYS_FAT16_READ, SYS_FAT16_WRITE, SYS_FAT16_MOUNTED,
        SYS_NTFS_READ, SYS_NTFS_WRITE, SYS_NTFS_MOUNTED, SYS_ATA_READ, SYS_ATA_WRITE,
        SYS_ATA_INFO, SYS_NET_STATUS, SYS_NET_POLL, SYS_DEBUG_LOG, SYS_GUI_WIN_OPEN,
        SYS_GUI_PRESENT, SYS_GUI_WIN_CLOSE, SYS_GUI_GET_TICKS, SYS_GUI_POLL, SYS_VIRGL_SUBMIT,
        SYS_GPU3D_INIT, SYS_GPU3D_CLEAR, SYS_GPU3D_UPLOAD, SYS_GPU3D_MVP, SYS_GPU3D_DRAW,
        SYS_GPU3D_PRESENT,
    ];

    #[test]
    fn every_number_has_a_handler() {
        for &num in ALL {
            assert!(lookup(num).is_some(), "syscall {:#x} sem handler", num);
        }
        let registered = SYSCALL_TABLE.iter().filter(|h| h.is_some()).count();
        assert_eq!(registered, ALL.len());
    }

    #[test]
    fn numbers_are_unique() {
        let mut seen = [false; TABLE_SIZE];
        for &num in ALL {
            assert!(!seen[num], "número repetido {:#x}", num);
            seen[num] = true;
        }
    }

    #[test]
    fn unknown_numbers_have_no_handler() {
        assert!(lookup(0).is_none());
        assert!(lookup(0xFF).is_none());
        assert!(lookup(TABLE_SIZE).is_none());
        assert!(lookup(usize::MAX).is_none());
    }

    #[test]
    fn pure_handlers_answer_directly() {
        let args = SyscallArgs::default();
        let ticks = lookup(SYS_GUI_GET_TICKS).map(|h| h(&args));
        assert!(matches!(ticks, Some(Ok(_))));
    }
}
