//! # Memory Syscalls
//!
//! `malloc`/`free` em granularidade de página, dentro de
//! `USER_HEAP_BASE..USER_HEAP_END` do diretório da task. Os frames entram em
//! `owned_frames`, então o reap libera o que o processo esquecer.

use alloc::vec::Vec;

use super::abi::{SysResult, SyscallArgs};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{PAGE_SIZE, USER_HEAP_BASE, USER_HEAP_END};
use crate::mm::vmm::PageFlags;
use crate::mm::{pmm, vmm};
use crate::sched;
use crate::sys::Errno;

// === WRAPPERS ===

pub fn sys_malloc_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_malloc(args.arg1).map(|addr| addr as usize)
}

pub fn sys_free_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_free(args.arg1 as u32).map(|_| 0)
}

// === IMPLEMENTAÇÕES ===

/// Páginas para `size` bytes; zero ou maior que o heap inteiro é inválido.
pub fn pages_for(size: usize) -> SysResult<usize> {
    let limit = (USER_HEAP_END - USER_HEAP_BASE) as usize;
    if size == 0 || size > limit {
        return Err(Errno::EINVAL);
    }
    Ok(size.div_ceil(PAGE_SIZE))
}

pub fn sys_malloc(size: usize) -> SysResult<u32> {
    let pages = pages_for(size)?;
    let (base, pd) = sched::with_tasks(|table| {
        let task = table.current_mut().filter(|t| t.is_user).ok_or(Errno::EPERM)?;
        let base = task.user_heap.reserve(pages).ok_or(Errno::ENOMEM)?;
        Ok::<_, Errno>((base, task.page_dir))
    })?;

    let mut frames: Vec<PhysAddr> = Vec::with_capacity(pages);
    for i in 0..pages {
        let virt = VirtAddr::new(base + (i * PAGE_SIZE) as u32);
        let mapped = pmm::alloc_page().ok_or(Errno::ENOMEM).and_then(|frame| {
            vmm::map_user(pd, virt, frame, PageFlags::WRITABLE).map_err(|err| {
                pmm::free_page(frame);
                Errno::from(err)
            })?;
            Ok(frame)
        });
        match mapped {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                unmap_block(pd, base, &frames);
                sched::with_tasks(|table| {
                    if let Some(task) = table.current_mut() {
                        task.user_heap.release(base);
                    }
                });
                crate::kwarn!("(Syscall) malloc sem memória, páginas=", pages);
                return Err(err);
            }
        }
    }

    // SAFETY: páginas recém-mapeadas e graváveis no diretório ativo
    unsafe { core::ptr::write_bytes(base as *mut u8, 0, pages * PAGE_SIZE) };

    sched::with_tasks(|table| {
        if let Some(task) = table.current_mut() {
            task.owned_frames.extend_from_slice(&frames);
        }
    });
    crate::ktrace!("(Syscall) malloc base=", base);
    Ok(base)
}

pub fn sys_free(addr: u32) -> SysResult<()> {
    let (pages, pd) = sched::with_tasks(|table| {
        let task = table.current_mut().ok_or(Errno::EPERM)?;
        let pages = task.user_heap.release(addr).ok_or(Errno::EINVAL)?;
        Ok::<_, Errno>((pages, task.page_dir))
    })?;

    let mut freed = Vec::with_capacity(pages);
    for i in 0..pages {
        let virt = VirtAddr::new(addr + (i * PAGE_SIZE) as u32);
        if let Some(frame) = vmm::unmap_user(pd, virt) {
            freed.push(frame);
        }
    }
    sched::with_tasks(|table| {
        if let Some(task) = table.current_mut() {
            task.owned_frames.retain(|f| !freed.contains(f));
        }
    });
    for frame in freed {
        pmm::free_page(frame);
    }
    Ok(())
}

fn unmap_block(pd: PhysAddr, base: u32, frames: &[PhysAddr]) {
    for (i, &frame) in frames.iter().enumerate() {
        vmm::unmap_user(pd, VirtAddr::new(base + (i * PAGE_SIZE) as u32));
        pmm::free_page(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_up_to_pages() {
        assert_eq!(pages_for(1), Ok(1));
        assert_eq!(pages_for(PAGE_SIZE), Ok(1));
        assert_eq!(pages_for(PAGE_SIZE + 1), Ok(2));
        assert_eq!(pages_for(0), Err(Errno::EINVAL));
        assert_eq!(pages_for((USER_HEAP_END - USER_HEAP_BASE) as usize + 1), Err(Errno::EINVAL));
    }
}
