//! # GUI & GPU 3D Syscalls
//!
//! Janelas são por pid: cada task tem no máximo uma, com o framebuffer
//! mapeado em `GUI_USER_FB_BASE`. O estado 3D também é por pid e some junto
//! com a task.

use super::abi::{user_bytes, user_str, SysResult, SyscallArgs};
use crate::drivers::{timer, virtio::gpu3d};
use crate::gui;
use crate::sched;
use crate::sys::Errno;

/// Tamanho da matriz MVP (16 f32).
const MVP_BYTES: usize = 64;

// =============================================================================
// JANELAS
// =============================================================================

pub fn sys_gui_win_open_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let title = user_str(args.arg1, args.arg2)?;
    let pid = sched::task_get_current();
    let base = gui::open(pid, sched::current_directory(), title)?;
    Ok(base as usize)
}

pub fn sys_gui_present_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    gui::present(sched::task_get_current())?;
    Ok(0)
}

pub fn sys_gui_win_close_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    gui::close(sched::task_get_current())?;
    Ok(0)
}

pub fn sys_gui_get_ticks_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    Ok(timer::ticks() as usize)
}

/// Compositor: fecha janelas de tasks mortas e pega a máscara de sujas.
pub fn sys_gui_poll_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    let swept = gui::sweep();
    if swept > 0 {
        crate::kdebug!("(Syscall) Janelas órfãs fechadas: ", swept);
    }
    Ok(gui::take_dirty() as usize)
}

// =============================================================================
// GPU 3D
// =============================================================================

pub fn sys_virgl_submit_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let data = user_bytes(args.arg1, args.arg2)?;
    if data.is_empty() || data.len() % 4 != 0 {
        return Err(Errno::EINVAL);
    }
    gpu3d::virgl_submit(data)?;
    Ok(0)
}

pub fn sys_gpu3d_init_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    gpu3d::init(sched::task_get_current())?;
    Ok(0)
}

pub fn sys_gpu3d_clear_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    gpu3d::clear(sched::task_get_current(), args.arg1 as u32)?;
    Ok(0)
}

pub fn sys_gpu3d_upload_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let data = user_bytes(args.arg1, args.arg2)?;
    gpu3d::upload(sched::task_get_current(), data)
}

pub fn sys_gpu3d_mvp_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    let raw = user_bytes(args.arg1, MVP_BYTES)?;
    gpu3d::set_mvp(sched::task_get_current(), raw)?;
    Ok(0)
}

pub fn sys_gpu3d_draw_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    gpu3d::draw(sched::task_get_current(), args.arg1 as u32, args.arg2 as u32)?;
    Ok(0)
}

pub fn sys_gpu3d_present_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    let pid = sched::task_get_current();
    let draws = gpu3d::present(pid)?;
    // com janela aberta, o compositor também é acordado
    gui::present(pid).ok();
    Ok(draws as usize)
}
