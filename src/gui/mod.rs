//! # Janelas GUI de aplicações ELF
//!
//! Uma aplicação em ring 3 desenha num framebuffer que o compositor copia
//! para a tela sem IPC por pixel.
//!
//! ## Visões de um slot
//!
//! | Visão       | Endereço                                   | Espaço        |
//! |-------------|--------------------------------------------|---------------|
//! | cliente     | `GUI_USER_FB_BASE`                         | da aplicação  |
//! | compositor  | `GUI_KERNEL_FB_BASE + slot * GUI_FB_SPAN`  | todos (kernel)|
//!
//! As duas visões apontam para os mesmos frames. A faixa do compositor
//! fica nos slots compartilhados do diretório do kernel, então aparece em
//! qualquer espaço, com USER para o compositor em ring 3.
//!
//! O trabalho de memória passa por `ViewMapper`; o kernel usa
//! `KernelViews`, os testes um mapeador falso.

use alloc::vec::Vec;

use crate::klib::string::FixedName;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{GUI_FB_SPAN, GUI_KERNEL_FB_BASE, GUI_USER_FB_BASE, PAGE_SIZE};
use crate::mm::vmm::PageFlags;
use crate::mm::{pmm, vmm, MmResult};
use crate::sync::Spinlock;
use crate::sys::{Errno, Pid};

pub const GUI_MAX_SLOTS: usize = 8;
pub const GUI_FB_WIDTH: u32 = 640;
pub const GUI_FB_HEIGHT: u32 = 480;
/// B8G8R8X8
pub const GUI_FB_BPP: u32 = 4;
pub const GUI_FB_BYTES: usize = (GUI_FB_WIDTH * GUI_FB_HEIGHT * GUI_FB_BPP) as usize;
pub const GUI_FB_PAGES: usize = GUI_FB_BYTES.div_ceil(PAGE_SIZE);

const _: () = assert!(GUI_FB_PAGES * PAGE_SIZE <= GUI_FB_SPAN as usize);

pub type Title = FixedName<32>;

/// Operações de memória de uma janela.
pub trait ViewMapper {
    /// Frame zerado.
    fn alloc_frame(&mut self) -> Option<PhysAddr>;
    fn free_frame(&mut self, frame: PhysAddr);
    fn map_client(&mut self, pd: PhysAddr, virt: VirtAddr, frame: PhysAddr) -> MmResult<()>;
    fn unmap_client(&mut self, pd: PhysAddr, virt: VirtAddr);
    fn map_view(&mut self, virt: VirtAddr, frame: PhysAddr) -> MmResult<()>;
    fn unmap_view(&mut self, virt: VirtAddr);
}

/// `ViewMapper` real: PMM + `vmm::map_user`.
pub struct KernelViews;

impl ViewMapper for KernelViews {
    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        let frame = pmm::alloc_page()?;
        // SAFETY: frames do PMM ficam abaixo de IDENTITY_LIMIT, identity-mapeados
        unsafe { core::ptr::write_bytes(frame.as_usize() as *mut u8, 0, PAGE_SIZE) };
        Some(frame)
    }

    fn free_frame(&mut self, frame: PhysAddr) {
        pmm::free_page(frame);
    }

    fn map_client(&mut self, pd: PhysAddr, virt: VirtAddr, frame: PhysAddr) -> MmResult<()> {
        vmm::map_user(pd, virt, frame, PageFlags::WRITABLE)
    }

    fn unmap_client(&mut self, pd: PhysAddr, virt: VirtAddr) {
        vmm::unmap_user(pd, virt);
    }

    fn map_view(&mut self, virt: VirtAddr, frame: PhysAddr) -> MmResult<()> {
        vmm::map_user(vmm::kernel_directory(), virt, frame, PageFlags::WRITABLE)
    }

    fn unmap_view(&mut self, virt: VirtAddr) {
        vmm::unmap_user(vmm::kernel_directory(), virt);
    }
}

struct Slot {
    pid: Pid,
    client_pd: PhysAddr,
    frames: Vec<PhysAddr>,
    title: Title,
    dirty: bool,
}

/// Resumo de uma janela aberta (`/proc/windows`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub slot: usize,
    pub pid: Pid,
    pub title: Title,
    pub dirty: bool,
}

pub const fn view_base(slot: usize) -> VirtAddr {
    VirtAddr::new(GUI_KERNEL_FB_BASE + slot as u32 * GUI_FB_SPAN)
}

fn page(base: VirtAddr, i: usize) -> VirtAddr {
    base.add((i * PAGE_SIZE) as u32)
}

pub struct GuiTable {
    slots: [Option<Slot>; GUI_MAX_SLOTS],
}

impl GuiTable {
    pub const fn new() -> Self {
        const EMPTY: Option<Slot> = None;
        Self {
            slots: [EMPTY; GUI_MAX_SLOTS],
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.pid == pid))
    }

    /// Abre a janela de `pid` e devolve o endereço do framebuffer no cliente.
    pub fn open<M: ViewMapper>(&mut self, m: &mut M, pid: Pid, client_pd: PhysAddr, title: &str) -> Result<u32, Errno> {
        if self.find(pid).is_some() {
            return Err(Errno::EEXIST);
        }
        let slot = self.slots.iter().position(Option::is_none).ok_or(Errno::EBUSY)?;
        let client = VirtAddr::new(GUI_USER_FB_BASE);
        let view = view_base(slot);

        let mut frames = Vec::with_capacity(GUI_FB_PAGES);
        for i in 0..GUI_FB_PAGES {
            let mapped = m.alloc_frame().ok_or(Errno::ENOMEM).and_then(|frame| {
                frames.push(frame);
                m.map_client(client_pd, page(client, i), frame)
                    .and_then(|_| m.map_view(page(view, i), frame))
                    .map_err(|_| Errno::ENOMEM)
            });
            if let Err(e) = mapped {
                Self::release(m, client_pd, slot, &frames);
                return Err(e);
            }
        }

        self.slots[slot] = Some(Slot {
            pid,
            client_pd,
            frames,
            title: Title::new(title),
            dirty: true,
        });
        Ok(GUI_USER_FB_BASE)
    }

    /// Desfaz as duas visões e devolve os frames.
    fn release<M: ViewMapper>(m: &mut M, client_pd: PhysAddr, slot: usize, frames: &[PhysAddr]) {
        let client = VirtAddr::new(GUI_USER_FB_BASE);
        let view = view_base(slot);
        for (i, &frame) in frames.iter().enumerate() {
            m.unmap_client(client_pd, page(client, i));
            m.unmap_view(page(view, i));
            m.free_frame(frame);
        }
    }

    pub fn present(&mut self, pid: Pid) -> Result<(), Errno> {
        let idx = self.find(pid).ok_or(Errno::ENOENT)?;
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.dirty = true;
        }
        Ok(())
    }

    pub fn close<M: ViewMapper>(&mut self, m: &mut M, pid: Pid) -> Result<(), Errno> {
        let idx = self.find(pid).ok_or(Errno::ENOENT)?;
        if let Some(slot) = self.slots[idx].take() {
            Self::release(m, slot.client_pd, idx, &slot.frames);
        }
        Ok(())
    }

    /// Fecha as janelas cujo dono não está mais vivo.
    pub fn sweep<M: ViewMapper>(&mut self, m: &mut M, alive: impl Fn(Pid) -> bool) -> usize {
        let dead: Vec<Pid> = self
            .slots
            .iter()
            .flatten()
            .filter(|s| !alive(s.pid))
            .map(|s| s.pid)
            .collect();
        for &pid in &dead {
            let _ = self.close(m, pid);
        }
        dead.len()
    }

    /// Máscara dos slots sujos; limpa as marcas.
    pub fn take_dirty(&mut self) -> u32 {
        let mut mask = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot.as_mut().filter(|s| s.dirty) {
                s.dirty = false;
                mask |= 1 << i;
            }
        }
        mask
    }

    pub fn windows(&self) -> Vec<WindowInfo> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| {
                s.as_ref().map(|s| WindowInfo {
                    slot,
                    pid: s.pid,
                    title: s.title,
                    dirty: s.dirty,
                })
            })
            .collect()
    }
}

impl Default for GuiTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// INSTÂNCIA GLOBAL
// =============================================================================

static GUI: Spinlock<GuiTable> = Spinlock::new(GuiTable::new());

pub fn open(pid: Pid, client_pd: PhysAddr, title: &str) -> Result<u32, Errno> {
    let va = GUI.lock().open(&mut KernelViews, pid, client_pd, title)?;
    crate::kdebug!("(GUI) Janela aberta para pid=", pid.as_u32());
    Ok(va)
}

/// Marca a janela como suja e cede a CPU ao compositor.
pub fn present(pid: Pid) -> Result<(), Errno> {
    GUI.lock().present(pid)?;
    crate::sched::task_yield();
    Ok(())
}

pub fn close(pid: Pid) -> Result<(), Errno> {
    GUI.lock().close(&mut KernelViews, pid)
}

/// Passada do compositor: fecha janelas de tasks que já não existem.
pub fn sweep() -> usize {
    let alive = |pid: Pid| {
        crate::sched::task_get_by_pid(pid)
            .is_some_and(|t| t.state != crate::sched::task::TaskState::Terminated)
    };
    let closed = GUI.lock().sweep(&mut KernelViews, alive);
    if closed > 0 {
        crate::kdebug!("(GUI) Janelas órfãs fechadas=", closed as u64);
    }
    closed
}

/// Chamado por `task_kill`/`task_exit`.
pub fn on_task_exit(pid: Pid) {
    if close(pid).is_ok() {
        crate::ktrace!("(GUI) Janela fechada na saída do pid=", pid.as_u32());
    }
}

pub fn take_dirty() -> u32 {
    GUI.lock().take_dirty()
}

pub fn windows() -> Vec<WindowInfo> {
    GUI.lock().windows()
}
