//! Manipulação de diretórios e tabelas, independente de como as tabelas são
//! alcançadas.
//!
//! `TableWindows` abstrai o acesso a um frame de tabela:
//! - `Identity`: RAM baixa identity-mapeada (diretório ativo, clone, destroy)
//! - `TempWindows`: as duas janelas TEMP_PD/TEMP_PT (`map_user`)
//! - fakes em memória nos testes
//!
//! Regra das janelas: no máximo uma tabela aberta por `Window` ao mesmo
//! tempo. Só `map_in`/`unmap_in`/`translate_in` rodam sobre `TempWindows`.

use super::attributes;
use super::table::{PageEntry, PageFlags, PageTable};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{ENTRIES_PER_TABLE, USER_PD_END, USER_PD_FIRST};
use crate::mm::error::{MmError, MmResult};
use crate::mm::pmm::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Directory,
    Table,
}

pub trait TableWindows {
    /// Torna o frame `frame` acessível como tabela pela janela `window`.
    ///
    /// # Safety
    /// `frame` deve conter um diretório/tabela válido (ou ser zerado logo em
    /// seguida). O ponteiro só vale até `close(window)`.
    unsafe fn open(&mut self, window: Window, frame: PhysAddr) -> *mut PageTable;

    fn close(&mut self, window: Window);
}

/// Flags de toda entrada de diretório criada aqui; a proteção real fica na PTE.
const PDE_FLAGS: PageFlags = PageFlags::PRESENT
    .union(PageFlags::WRITABLE)
    .union(PageFlags::USER);

/// Mapeia `virt → phys` no diretório `pd`, criando a tabela se preciso.
///
/// Acrescenta PRESENT e os atributos da faixa de `virt`.
pub fn map_in<W: TableWindows, F: FrameSource>(
    win: &mut W,
    frames: &mut F,
    pd: PhysAddr,
    virt: VirtAddr,
    phys: PhysAddr,
    flags: PageFlags,
) -> MmResult<()> {
    if !phys.is_page_aligned() {
        return Err(MmError::NotAligned);
    }
    let leaf = flags | PageFlags::PRESENT | attributes::extra_flags(virt);

    // SAFETY: `pd` é um diretório válido por contrato do caller
    let dir = unsafe { &mut *win.open(Window::Directory, pd) };
    let pde = dir.entries[virt.pd_index()];

    let pt_frame = if pde.is_present() {
        pde.addr()
    } else {
        let Some(frame) = frames.alloc_frame() else {
            win.close(Window::Directory);
            return Err(MmError::OutOfMemory);
        };
        // SAFETY: frame recém alocado, zerado antes de ser ligado
        unsafe { (*win.open(Window::Table, frame)).zero() };
        win.close(Window::Table);
        dir.entries[virt.pd_index()] = PageEntry::new(frame, PDE_FLAGS);
        frame
    };

    // SAFETY: tabela presente no diretório
    let table = unsafe { &mut *win.open(Window::Table, pt_frame) };
    table.entries[virt.pt_index()] = PageEntry::new(phys, leaf);
    win.close(Window::Table);
    win.close(Window::Directory);
    Ok(())
}

/// Remove o mapeamento de `virt` e devolve o frame que estava lá.
pub fn unmap_in<W: TableWindows>(win: &mut W, pd: PhysAddr, virt: VirtAddr) -> Option<PhysAddr> {
    // SAFETY: `pd` válido por contrato
    let pde = unsafe { (*win.open(Window::Directory, pd)).entries[virt.pd_index()] };
    let result = if pde.is_present() {
        // SAFETY: tabela presente
        let table = unsafe { &mut *win.open(Window::Table, pde.addr()) };
        let pte = table.entries[virt.pt_index()];
        table.entries[virt.pt_index()] = PageEntry::EMPTY;
        win.close(Window::Table);
        pte.is_present().then(|| pte.addr())
    } else {
        None
    };
    win.close(Window::Directory);
    result
}

/// Frame e flags de `virt` em `pd`.
pub fn translate_in<W: TableWindows>(
    win: &mut W,
    pd: PhysAddr,
    virt: VirtAddr,
) -> Option<(PhysAddr, PageFlags)> {
    // SAFETY: `pd` válido por contrato
    let pde = unsafe { (*win.open(Window::Directory, pd)).entries[virt.pd_index()] };
    let result = if pde.is_present() {
        // SAFETY: tabela presente
        let pte = unsafe { (*win.open(Window::Table, pde.addr())).entries[virt.pt_index()] };
        win.close(Window::Table);
        pte.is_present().then(|| (pte.addr(), pte.flags()))
    } else {
        None
    };
    win.close(Window::Directory);
    result
}

/// Espaço "shared-kernel": slots `< own_tables_below` recebem cópias novas
/// das tabelas do kernel com USER forçado em toda PTE presente; os demais
/// slots presentes apontam para as tabelas do próprio kernel.
pub fn clone_shared<W: TableWindows, F: FrameSource>(
    win: &mut W,
    frames: &mut F,
    kernel_pd: PhysAddr,
    own_tables_below: usize,
) -> MmResult<PhysAddr> {
    let new_pd = frames.alloc_frame().ok_or(MmError::OutOfMemory)?;
    // SAFETY: frames do kernel e recém alocados; `Identity`/fakes aceitam
    // várias tabelas abertas ao mesmo tempo
    let (kdir, ndir) = unsafe {
        let ndir = &mut *win.open(Window::Table, new_pd);
        ndir.zero();
        (&*win.open(Window::Directory, kernel_pd), ndir)
    };

    for slot in 0..ENTRIES_PER_TABLE {
        let kpde = kdir.entries[slot];
        if !kpde.is_present() {
            continue;
        }
        if slot >= own_tables_below {
            ndir.entries[slot] = kpde;
            continue;
        }
        let Some(pt) = frames.alloc_frame() else {
            win.close(Window::Directory);
            win.close(Window::Table);
            destroy_in(win, frames, new_pd, kernel_pd);
            return Err(MmError::OutOfMemory);
        };
        // SAFETY: ambos frames são tabelas válidas
        unsafe {
            let src = &*win.open(Window::Table, kpde.addr());
            let dst = &mut *win.open(Window::Table, pt);
            for (d, s) in dst.entries.iter_mut().zip(src.entries.iter()) {
                *d = if s.is_present() {
                    s.with_flags(PageFlags::USER)
                } else {
                    *s
                };
            }
        }
        ndir.entries[slot] = PageEntry::new(pt, kpde.flags() | PageFlags::USER);
    }

    win.close(Window::Directory);
    win.close(Window::Table);
    Ok(new_pd)
}

/// Espaço isolado: cópia do diretório do kernel com a faixa de usuário zerada.
pub fn clone_isolated<W: TableWindows, F: FrameSource>(
    win: &mut W,
    frames: &mut F,
    kernel_pd: PhysAddr,
) -> MmResult<PhysAddr> {
    let new_pd = frames.alloc_frame().ok_or(MmError::OutOfMemory)?;
    // SAFETY: diretório do kernel e frame recém alocado
    unsafe {
        let kdir = &*win.open(Window::Directory, kernel_pd);
        let ndir = &mut *win.open(Window::Table, new_pd);
        ndir.copy_from(kdir);
        for entry in &mut ndir.entries[USER_PD_FIRST..USER_PD_END] {
            *entry = PageEntry::EMPTY;
        }
    }
    win.close(Window::Table);
    win.close(Window::Directory);
    Ok(new_pd)
}

/// Libera as tabelas que pertencem a `pd` (as que diferem das do kernel no
/// mesmo slot) e o próprio diretório. Frames de conteúdo não são tocados.
pub fn destroy_in<W: TableWindows, F: FrameSource>(
    win: &mut W,
    frames: &mut F,
    pd: PhysAddr,
    kernel_pd: PhysAddr,
) {
    if pd == kernel_pd {
        return;
    }
    // SAFETY: ambos diretórios válidos
    let (kdir, dir) = unsafe {
        (
            &*win.open(Window::Directory, kernel_pd),
            &*win.open(Window::Table, pd),
        )
    };
    for slot in 0..ENTRIES_PER_TABLE {
        let pde = dir.entries[slot];
        if pde.is_present() && pde.addr() != kdir.entries[slot].addr() {
            frames.free_frame(pde.addr());
        }
    }
    win.close(Window::Table);
    win.close(Window::Directory);
    frames.free_frame(pd);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::vmm::fake::FakePhys;

    const RW: PageFlags = PageFlags::WRITABLE;

    fn map(mem: &FakePhys, pd: PhysAddr, virt: u32, phys: u32, flags: PageFlags) -> MmResult<()> {
        map_in(
            &mut mem.clone(),
            &mut mem.clone(),
            pd,
            VirtAddr::new(virt),
            PhysAddr::new(phys),
            flags,
        )
    }

    fn lookup(mem: &FakePhys, pd: PhysAddr, virt: u32) -> Option<(PhysAddr, PageFlags)> {
        translate_in(&mut mem.clone(), pd, VirtAddr::new(virt))
    }

    fn kernel_with_identity(mem: &FakePhys) -> PhysAddr {
        let kpd = mem.alloc_zeroed();
        for i in 0..4u32 {
            map(mem, kpd, i * 0x1000, i * 0x1000, RW).unwrap();
        }
        kpd
    }

    #[test]
    fn map_then_translate() {
        let mem = FakePhys::new();
        let pd = mem.alloc_zeroed();
        map(&mem, pd, 0xC000_1000, 0x5000, RW | PageFlags::USER).unwrap();

        let (frame, flags) = lookup(&mem, pd, 0xC000_1000).unwrap();
        assert_eq!(frame, PhysAddr::new(0x5000));
        assert!(flags.contains(PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE));
        assert!(!flags.contains(PageFlags::WRITE_THROUGH));
        assert_eq!(lookup(&mem, pd, 0xC000_2000), None);
    }

    #[test]
    fn gpu_window_gets_write_through() {
        let mem = FakePhys::new();
        let pd = mem.alloc_zeroed();
        map(&mem, pd, 0x3000_4000, 0x1F0_0000, RW).unwrap();
        let (_, flags) = lookup(&mem, pd, 0x3000_4000).unwrap();
        assert!(flags.contains(PageFlags::WRITE_THROUGH));
    }

    #[test]
    fn table_allocated_once_per_slot() {
        let mem = FakePhys::new();
        let pd = mem.alloc_zeroed();
        let before = mem.allocated();
        for i in 0..8 {
            map(&mem, pd, 0xC000_0000 + i * 0x1000, 0x9000, RW).unwrap();
        }
        assert_eq!(mem.allocated(), before + 1);
    }

    #[test]
    fn unmap_returns_old_frame() {
        let mem = FakePhys::new();
        let pd = mem.alloc_zeroed();
        map(&mem, pd, 0xD000_0000, 0x7000, RW).unwrap();
        let v = VirtAddr::new(0xD000_0000);
        assert_eq!(unmap_in(&mut mem.clone(), pd, v), Some(PhysAddr::new(0x7000)));
        assert_eq!(unmap_in(&mut mem.clone(), pd, v), None);
    }

    #[test]
    fn rejects_unaligned_frame() {
        let mem = FakePhys::new();
        let pd = mem.alloc_zeroed();
        assert_eq!(map(&mem, pd, 0, 0x1001, RW), Err(MmError::NotAligned));
    }

    #[test]
    fn out_of_frames_is_reported() {
        let mem = FakePhys::with_limit(1);
        let pd = mem.alloc_zeroed();
        assert_eq!(map(&mem, pd, 0x1000, 0x1000, RW), Err(MmError::OutOfMemory));
    }

    #[test]
    fn shared_clone_forces_user_on_private_copies() {
        let mem = FakePhys::new();
        let kpd = kernel_with_identity(&mem);
        let pd = clone_shared(&mut mem.clone(), &mut mem.clone(), kpd, 128).unwrap();

        let (frame, flags) = lookup(&mem, pd, 0x2000).unwrap();
        assert_eq!(frame, PhysAddr::new(0x2000));
        assert!(flags.contains(PageFlags::USER));
        assert_ne!(mem.entry(kpd, 0).addr(), mem.entry(pd, 0).addr());
    }

    #[test]
    fn shared_clone_links_high_kernel_tables() {
        let mem = FakePhys::new();
        let kpd = kernel_with_identity(&mem);
        map(&mem, kpd, 0x3FE0_0000, 0x4000, RW).unwrap();
        let pd = clone_shared(&mut mem.clone(), &mut mem.clone(), kpd, 128).unwrap();
        assert_eq!(mem.entry(kpd, 255).addr(), mem.entry(pd, 255).addr());
    }

    #[test]
    fn isolated_clone_clears_user_range() {
        let mem = FakePhys::new();
        let kpd = kernel_with_identity(&mem);
        map(&mem, kpd, 0x5000_0000, 0x3000, RW).unwrap();
        let pd = clone_isolated(&mut mem.clone(), &mut mem.clone(), kpd).unwrap();
        assert!(lookup(&mem, pd, 0x1000).is_some());
        assert!(lookup(&mem, pd, 0x5000_0000).is_none());
    }

    #[test]
    fn destroy_frees_only_owned_tables() {
        let mem = FakePhys::new();
        let kpd = kernel_with_identity(&mem);
        let pd = clone_isolated(&mut mem.clone(), &mut mem.clone(), kpd).unwrap();
        map(&mem, pd, 0xC000_0000, 0x8000, RW).unwrap();
        let kernel_pt = mem.entry(kpd, 0).addr();
        let user_pt = mem.entry(pd, 0x300).addr();

        destroy_in(&mut mem.clone(), &mut mem.clone(), pd, kpd);
        assert!(mem.was_freed(user_pt));
        assert!(mem.was_freed(pd));
        assert!(!mem.was_freed(kernel_pt));
        assert!(!mem.was_freed(PhysAddr::new(0x8000)));
    }
}
