//! # Virtual Memory Manager (VMM)
//!
//! Paginação i686 de dois níveis (diretório → tabela, páginas de 4 KiB).
//!
//! ## Espaços de endereçamento
//!
//! | Tipo            | Slots 0..128 (RAM)      | Slots 128..256  | Slots 256..960 |
//! |-----------------|-------------------------|-----------------|----------------|
//! | kernel (mestre) | identity, P/W/U         | tabelas do kernel | vazio        |
//! | shared-kernel   | cópia privada com USER  | compartilhados  | vazio          |
//! | isolado         | compartilhados          | compartilhados  | zerados        |
//!
//! Os slots 128..256 (visão GUI do compositor, BARs MMIO, janelas) têm suas
//! tabelas criadas no `init`, então um mapeamento do kernel nessa faixa
//! aparece em todos os espaços.
//!
//! ## Edição de diretórios não ativos
//!
//! `map_user`/`unmap_user` editam o diretório alvo pelas janelas fixas
//! `TEMP_PD_VA`/`TEMP_PT_VA`, sempre com o diretório do kernel carregado.

pub mod attributes;
pub mod fault;
pub mod mapper;
pub mod table;
pub mod windows;

#[cfg(test)]
pub(crate) mod fake;

pub use mapper::{TableWindows, Window};
pub use table::{PageEntry, PageFlags, PageTable};

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{
    ENTRIES_PER_TABLE, IDENTITY_LIMIT, PAGE_SIZE, TEMP_PD_VA, USER_PD_FIRST,
    USER_SPACE_BASE,
};
use crate::mm::error::{MmError, MmResult};
use crate::mm::pmm::{self, GlobalFrames};
use crate::sync::Spinlock;
use windows::{Identity, TempWindows};

/// Diretório mestre do kernel (físico).
static KERNEL_PD: AtomicU32 = AtomicU32::new(0);

/// Serializa o uso das janelas TEMP_PD/TEMP_PT.
static WINDOW_LOCK: Spinlock<()> = Spinlock::new(());

/// Primeiro slot com tabela compartilhada entre todos os espaços.
const SHARED_FIRST_SLOT: usize = (IDENTITY_LIMIT >> 22) as usize;

/// Monta o diretório mestre e liga a paginação.
///
/// O PMM e o heap já devem estar prontos; roda com paginação desligada.
pub fn init(total_kb: usize) -> MmResult<()> {
    let pd = pmm::alloc_page().ok_or(MmError::OutOfMemory)?;
    // SAFETY: paginação desligada, frame recém alocado
    unsafe { (*Identity.open(Window::Directory, pd)).zero() };

    let ram_end = (total_kb as u64 * 1024).min(IDENTITY_LIMIT as u64) as u32;
    let identity = PageFlags::WRITABLE | PageFlags::USER;
    let mut addr = 0u32;
    while addr < ram_end {
        mapper::map_in(
            &mut Identity,
            &mut GlobalFrames,
            pd,
            VirtAddr::new(addr),
            PhysAddr::new(addr),
            identity,
        )?;
        addr += PAGE_SIZE as u32;
    }

    // Tabelas da faixa compartilhada do kernel
    for slot in SHARED_FIRST_SLOT..USER_PD_FIRST {
        let pt = pmm::alloc_page().ok_or(MmError::OutOfMemory)?;
        // SAFETY: identity antes da paginação
        unsafe {
            (*Identity.open(Window::Table, pt)).zero();
            (*Identity.open(Window::Directory, pd)).entries[slot] = PageEntry::new(
                pt,
                PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
            );
        }
    }

    // SAFETY: slot 255 acabou de ser preenchido
    let window_pt = unsafe {
        (*Identity.open(Window::Directory, pd)).entries[VirtAddr::new(TEMP_PD_VA).pd_index()].addr()
    };
    windows::set_window_table(window_pt);
    KERNEL_PD.store(pd.as_u32(), Ordering::SeqCst);

    // SAFETY: diretório completo identity-mapeando o kernel em execução
    unsafe {
        Cpu::write_cr3(pd.as_usize());
        Cpu::enable_paging();
    }
    crate::kinfo!("(VMM) Paginação ativa, PD=", pd.as_u32());
    Ok(())
}

pub fn kernel_directory() -> PhysAddr {
    PhysAddr::new(KERNEL_PD.load(Ordering::SeqCst))
}

pub fn current_directory() -> PhysAddr {
    PhysAddr::new(Cpu::read_cr3() as u32 & 0xFFFF_F000)
}

/// Carrega `pd` em CR3 (não faz nada se já ativo).
///
/// # Safety
/// `pd` deve ser um diretório válido que mapeia o código e a stack em uso.
pub unsafe fn switch(pd: PhysAddr) {
    if current_directory() != pd {
        Cpu::write_cr3(pd.as_usize());
    }
}

/// Mapeia uma página no diretório ativo.
pub fn map_page(virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> MmResult<()> {
    mapper::map_in(
        &mut Identity,
        &mut GlobalFrames,
        current_directory(),
        virt.page_base(),
        phys,
        flags,
    )?;
    Cpu::invlpg(virt.as_usize());
    Ok(())
}

/// Remove o mapeamento no diretório ativo. O frame não é liberado.
pub fn unmap_page(virt: VirtAddr) -> Option<PhysAddr> {
    let old = mapper::unmap_in(&mut Identity, current_directory(), virt.page_base());
    Cpu::invlpg(virt.as_usize());
    old
}

/// Mapeia `[virt, virt+size)` sobre `[phys, phys+size)`, página a página.
pub fn map_range(virt: VirtAddr, phys: PhysAddr, size: usize, flags: PageFlags) -> MmResult<()> {
    let pages = crate::klib::div_ceil(size, PAGE_SIZE);
    for i in 0..pages {
        let off = (i * PAGE_SIZE) as u32;
        map_page(virt.add(off), phys.add(off), flags)?;
    }
    Ok(())
}

/// Tradução em qualquer diretório (tabelas alcançadas pelo identity map).
pub fn translate(pd: PhysAddr, virt: VirtAddr) -> Option<(PhysAddr, PageFlags)> {
    mapper::translate_in(&mut Identity, pd, virt)
        .map(|(frame, flags)| (frame.add(virt.page_offset() as u32), flags))
}

/// Novo espaço shared-kernel (tasks do kernel e servidores com I/O).
pub fn create_address_space() -> MmResult<PhysAddr> {
    mapper::clone_shared(
        &mut Identity,
        &mut GlobalFrames,
        kernel_directory(),
        SHARED_FIRST_SLOT,
    )
}

/// Novo espaço isolado (aplicações ELF).
pub fn create_isolated_space() -> MmResult<PhysAddr> {
    mapper::clone_isolated(&mut Identity, &mut GlobalFrames, kernel_directory())
}

/// Executa `f` com o diretório do kernel ativo e as janelas reservadas.
fn with_kernel_directory<R>(f: impl FnOnce() -> R) -> R {
    let _guard = WINDOW_LOCK.lock();
    let saved = current_directory();
    let kernel = kernel_directory();
    // SAFETY: o diretório do kernel mapeia todo o código do kernel
    unsafe { switch(kernel) };
    let result = f();
    // SAFETY: restaura o diretório que estava ativo
    unsafe { switch(saved) };
    result
}

/// Mapeia `virt → phys` no diretório `target_pd`, ativo ou não.
///
/// A PTE recebe PRESENT|USER mais os atributos da faixa.
pub fn map_user(target_pd: PhysAddr, virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> MmResult<()> {
    let virt = virt.page_base();
    with_kernel_directory(|| {
        mapper::map_in(
            &mut TempWindows,
            &mut GlobalFrames,
            target_pd,
            virt,
            phys,
            flags | PageFlags::USER,
        )
    })?;
    Cpu::invlpg(virt.as_usize());
    Ok(())
}

/// Remove `virt` de `target_pd` e devolve o frame que estava mapeado.
pub fn unmap_user(target_pd: PhysAddr, virt: VirtAddr) -> Option<PhysAddr> {
    let virt = virt.page_base();
    let old = with_kernel_directory(|| mapper::unmap_in(&mut TempWindows, target_pd, virt));
    Cpu::invlpg(virt.as_usize());
    old
}

/// Libera as tabelas próprias de `pd` e o diretório. Nunca libera conteúdo.
pub fn destroy_address_space(pd: PhysAddr) {
    let kernel = kernel_directory();
    if pd == kernel || pd == current_directory() {
        crate::kwarn!("(VMM) destroy recusado para PD ativo/kernel: ", pd.as_u32());
        return;
    }
    mapper::destroy_in(&mut Identity, &mut GlobalFrames, pd, kernel);
}

/// Confere que `[ptr, ptr+len)` está mapeado para o usuário no diretório
/// ativo (e gravável, se `write`).
pub fn check_user_range(ptr: u32, len: usize, write: bool) -> MmResult<()> {
    if len == 0 {
        return Ok(());
    }
    let end = (ptr as u64) + len as u64;
    if end > u32::MAX as u64 + 1 {
        return Err(MmError::InvalidAddress);
    }
    let pd = current_directory();
    let mut page = ptr & !(PAGE_SIZE as u32 - 1);
    while (page as u64) < end {
        let (_, flags) = translate(pd, VirtAddr::new(page)).ok_or(MmError::NotMapped)?;
        if !flags.contains(PageFlags::USER) || (write && !flags.contains(PageFlags::WRITABLE)) {
            return Err(MmError::InvalidAddress);
        }
        page = match page.checked_add(PAGE_SIZE as u32) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(())
}

/// `virt` está na faixa de usuário (acima do kernel)?
pub const fn is_user_address(virt: u32) -> bool {
    virt >= USER_SPACE_BASE
}

const _: () = assert!(SHARED_FIRST_SLOT < USER_PD_FIRST && USER_PD_FIRST < ENTRIES_PER_TABLE);
