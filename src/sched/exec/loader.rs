//! Carregador de imagens ELF32 em espaços isolados.
//!
//! O trabalho de memória passa por `SegmentMapper`: o kernel usa
//! `KernelMapper` (PMM + `vmm::map_user`), os testes usam um diretório falso.

use alloc::vec::Vec;

use super::elf::{self, PhType};
use super::ElfError;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{
    PAGE_SIZE, USER_IMAGE_BASE, USER_IMAGE_END, USER_STACK_PAGES, USER_STACK_TOP, VGA_TEXT_PHYS,
    VGA_USER_VA,
};
use crate::mm::vmm::PageFlags;
use crate::mm::{pmm, vmm, MmResult};
use crate::sched::task::KernelStack;
use crate::sys::Pid;

/// Mapeia o buffer VGA texto (0xB8000) em `VGA_USER_VA` no espaço novo.
pub const ELF_FLAG_MAP_VGA: u32 = 1 << 0;

/// Operações de memória de que o loader precisa num espaço alvo.
pub trait SegmentMapper {
    /// Frame zerado, passa a pertencer à imagem.
    fn alloc_frame(&mut self) -> Option<PhysAddr>;
    /// Copia `bytes` para `frame + offset`.
    fn write(&mut self, frame: PhysAddr, offset: usize, bytes: &[u8]);
    /// Mapeia no espaço alvo (USER é sempre adicionado).
    fn map(&mut self, virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> MmResult<()>;
    /// Frame e flags já mapeados em `virt` (página inteira), se houver.
    fn mapped(&mut self, virt: VirtAddr) -> Option<(PhysAddr, PageFlags)>;
    /// Desfaz tudo: frames e o próprio espaço.
    fn rollback(&mut self);
}

/// Resultado de uma carga bem sucedida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: u32,
    pub user_stack_top: u32,
}

/// `SegmentMapper` real: frames do PMM acessados pelo identity map.
pub struct KernelMapper {
    pd: PhysAddr,
    frames: Vec<PhysAddr>,
}

impl KernelMapper {
    pub fn new(pd: PhysAddr) -> Self {
        Self { pd, frames: Vec::new() }
    }

    pub fn directory(&self) -> PhysAddr {
        self.pd
    }

    /// Entrega a lista de frames à task (o mapper deixa de possuí-los).
    pub fn take_frames(&mut self) -> Vec<PhysAddr> {
        core::mem::take(&mut self.frames)
    }
}

impl SegmentMapper for KernelMapper {
    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        let frame = pmm::alloc_page()?;
        // SAFETY: frames do PMM ficam abaixo de IDENTITY_LIMIT, identity-mapeados
        unsafe { core::ptr::write_bytes(frame.as_usize() as *mut u8, 0, PAGE_SIZE) };
        self.frames.push(frame);
        Some(frame)
    }

    fn write(&mut self, frame: PhysAddr, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= PAGE_SIZE);
        // SAFETY: frame identity-mapeado e exclusivo desta imagem
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), (frame.as_usize() + offset) as *mut u8, bytes.len());
        }
    }

    fn map(&mut self, virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> MmResult<()> {
        vmm::map_user(self.pd, virt, phys, flags)
    }

    fn mapped(&mut self, virt: VirtAddr) -> Option<(PhysAddr, PageFlags)> {
        vmm::translate(self.pd, virt.page_base()).map(|(phys, flags)| (phys.page_base(), flags))
    }

    fn rollback(&mut self) {
        for frame in self.frames.drain(..) {
            pmm::free_page(frame);
        }
        vmm::destroy_address_space(self.pd);
    }
}

/// Pilha de usuário: `USER_STACK_PAGES` páginas zeradas logo abaixo de
/// `USER_STACK_TOP`. Devolve o topo.
pub fn map_user_stack<M: SegmentMapper>(mapper: &mut M) -> Result<u32, ElfError> {
    let bottom = USER_STACK_TOP - (USER_STACK_PAGES * PAGE_SIZE) as u32;
    for i in 0..USER_STACK_PAGES {
        let frame = mapper.alloc_frame().ok_or(ElfError::OutOfMemory)?;
        let virt = VirtAddr::new(bottom + (i * PAGE_SIZE) as u32);
        mapper.map(virt, frame, PageFlags::WRITABLE | PageFlags::USER)?;
    }
    Ok(USER_STACK_TOP)
}

/// Monta a imagem no espaço do `mapper`. Em erro nada é desfeito aqui.
pub fn load_image<M: SegmentMapper>(data: &[u8], mapper: &mut M, flags: u32) -> Result<LoadedImage, ElfError> {
    let header = elf::validate(data)?;

    for ph in elf::program_headers(data, &header) {
        if ph.p_type != PhType::Load || ph.p_memsz == 0 {
            continue;
        }
        load_segment(data, mapper, &ph)?;
    }

    let user_stack_top = map_user_stack(mapper)?;

    if flags & ELF_FLAG_MAP_VGA != 0 {
        mapper.map(
            VirtAddr::new(VGA_USER_VA),
            PhysAddr::new(VGA_TEXT_PHYS),
            PageFlags::WRITABLE | PageFlags::USER,
        )?;
    }

    Ok(LoadedImage {
        entry: header.e_entry,
        user_stack_top,
    })
}

/// Um PT_LOAD: uma página zerada por página do span, bytes do arquivo nas
/// posições certas, BSS fica zero.
///
/// Página já mapeada por um segmento anterior (fim de `.text` e começo de
/// `.data` na mesma página) é reaproveitada, com a união das permissões.
fn load_segment<M: SegmentMapper>(data: &[u8], mapper: &mut M, ph: &elf::Elf32Phdr) -> Result<(), ElfError> {
    if ph.p_filesz > ph.p_memsz {
        return Err(ElfError::SegmentOutOfFile);
    }
    let file_end = ph.p_offset as u64 + ph.p_filesz as u64;
    if file_end > data.len() as u64 {
        return Err(ElfError::SegmentOutOfFile);
    }

    let start = ph.p_vaddr as u64;
    let mem_end = start + ph.p_memsz as u64;
    let span_start = start & !(PAGE_SIZE as u64 - 1);
    let span_end = (mem_end + PAGE_SIZE as u64 - 1) & !(PAGE_SIZE as u64 - 1);
    if span_start < USER_IMAGE_BASE as u64 || span_end > USER_IMAGE_END as u64 {
        return Err(ElfError::SegmentInKernelSpace);
    }

    let file_data_end = start + ph.p_filesz as u64;
    let mut page_flags = PageFlags::USER;
    if ph.is_writable() {
        page_flags |= PageFlags::WRITABLE;
    }

    let mut page = span_start;
    while page < span_end {
        let virt = VirtAddr::new(page as u32);
        let (frame, flags) = match mapper.mapped(virt) {
            Some((frame, old)) => (frame, page_flags | (old & PageFlags::WRITABLE)),
            None => (mapper.alloc_frame().ok_or(ElfError::OutOfMemory)?, page_flags),
        };

        // interseção de [start, file_data_end) com a página
        let copy_start = page.max(start);
        let copy_end = (page + PAGE_SIZE as u64).min(file_data_end);
        if copy_start < copy_end {
            let src = (ph.p_offset as u64 + (copy_start - start)) as usize;
            let len = (copy_end - copy_start) as usize;
            mapper.write(frame, (copy_start - page) as usize, &data[src..src + len]);
        }

        mapper.map(virt, frame, flags)?;
        page += PAGE_SIZE as u64;
    }
    Ok(())
}

/// Carrega `data` num espaço isolado novo e cria a task.
///
/// Qualquer falha devolve frames, diretório e stack de kernel.
pub fn load(data: &[u8], name: &str, priority: u8, iopl: bool, flags: u32) -> Result<Pid, ElfError> {
    let pd = vmm::create_isolated_space()?;
    let mut mapper = KernelMapper::new(pd);

    let image = match load_image(data, &mut mapper, flags) {
        Ok(image) => image,
        Err(err) => {
            crate::kwarn!("(ELF) Carga falhou, desfazendo: ", err as u32);
            mapper.rollback();
            return Err(err);
        }
    };

    let kstack = match KernelStack::new() {
        Ok(stack) => stack,
        Err(_) => {
            mapper.rollback();
            return Err(ElfError::OutOfMemory);
        }
    };

    let frames = mapper.take_frames();
    let pid = crate::sched::task_create_from_elf(
        name,
        image.entry,
        image.user_stack_top,
        pd,
        kstack,
        priority,
        iopl,
        frames,
    )
    .map_err(|_| ElfError::TaskTableFull)?;

    crate::kinfo!("(ELF) Imagem carregada, entry=", image.entry);
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::vmm::fake::FakePhys;
    use crate::mm::vmm::mapper;
    use crate::sched::exec::elf::build::{executable, Segment};
    use crate::sched::exec::elf::{PF_R, PF_W, PF_X};
    use std::vec::Vec;

    /// Diretório falso sobre `FakePhys`, passando pelo mapeador real.
    struct MockMapper {
        mem: FakePhys,
        pd: PhysAddr,
        frames: Vec<PhysAddr>,
        rolled_back: bool,
    }

    impl MockMapper {
        fn new(mem: &FakePhys) -> Self {
            Self {
                mem: mem.clone(),
                pd: mem.alloc_zeroed(),
                frames: Vec::new(),
                rolled_back: false,
            }
        }

        fn lookup(&self, virt: u32) -> Option<(PhysAddr, PageFlags)> {
            mapper::translate_in(&mut self.mem.clone(), self.pd, VirtAddr::new(virt))
        }

        /// Bytes visíveis em `virt..virt+len` pelo diretório falso.
        fn read(&self, virt: u32, len: usize) -> Vec<u8> {
            (0..len as u32)
                .map(|i| {
                    let va = virt + i;
                    let (frame, _) = self.lookup(va).expect("não mapeado");
                    self.mem.bytes(frame)[(va & 0xFFF) as usize]
                })
                .collect()
        }
    }

    impl SegmentMapper for MockMapper {
        fn alloc_frame(&mut self) -> Option<PhysAddr> {
            let frame = crate::mm::pmm::FrameSource::alloc_frame(&mut self.mem)?;
            self.frames.push(frame);
            Some(frame)
        }

        fn write(&mut self, frame: PhysAddr, offset: usize, bytes: &[u8]) {
            let ptr = self.mem.frame_ptr(frame);
            unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(offset), bytes.len()) };
        }

        fn map(&mut self, virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> MmResult<()> {
            let mut mem = self.mem.clone();
            mapper::map_in(&mut mem.clone(), &mut mem, self.pd, virt, phys, flags | PageFlags::USER)
        }

        fn mapped(&mut self, virt: VirtAddr) -> Option<(PhysAddr, PageFlags)> {
            self.lookup(virt.page_base().as_u32())
        }

        fn rollback(&mut self) {
            self.rolled_back = true;
            for frame in self.frames.drain(..) {
                crate::mm::pmm::FrameSource::free_frame(&mut self.mem, frame);
            }
        }
    }

    fn code_segment(len: usize) -> Segment {
        Segment {
            vaddr: USER_IMAGE_BASE,
            bytes: (0..len).map(|i| (i % 251) as u8).collect(),
            memsz: len as u32,
            flags: PF_R | PF_X,
        }
    }

    #[test]
    fn loads_single_code_segment() {
        // 3 KiB de código RX em 0xC0000000
        let data = executable(USER_IMAGE_BASE, &[code_segment(3072)]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);

        let image = load_image(&data, &mut m, 0).unwrap();
        assert_eq!(image.entry, USER_IMAGE_BASE);
        assert_eq!(image.user_stack_top, USER_STACK_TOP);

        let (_, flags) = m.lookup(USER_IMAGE_BASE).unwrap();
        assert!(flags.contains(PageFlags::USER | PageFlags::PRESENT));
        assert!(!flags.contains(PageFlags::WRITABLE));

        let expected: Vec<u8> = (0..3072).map(|i| (i % 251) as u8).collect();
        assert_eq!(m.read(USER_IMAGE_BASE, 3072), expected);
        // resto da página zerado
        assert!(m.read(USER_IMAGE_BASE + 3072, 1024).iter().all(|&b| b == 0));
        // uma página de código + a pilha
        assert_eq!(m.frames.len(), 1 + USER_STACK_PAGES);
    }

    #[test]
    fn bss_is_zero_and_data_writable() {
        let data_seg = Segment {
            vaddr: USER_IMAGE_BASE + 0x1800,
            bytes: vec![0xAB; 0x100],
            memsz: 0x2000,
            flags: PF_R | PF_W,
        };
        let data = executable(USER_IMAGE_BASE, &[data_seg]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        load_image(&data, &mut m, 0).unwrap();

        // span 0xC0001000..0xC0004000: três páginas
        assert!(m.lookup(USER_IMAGE_BASE).is_none());
        for page in 1..4u32 {
            let (_, flags) = m.lookup(USER_IMAGE_BASE + page * 0x1000).unwrap();
            assert!(flags.contains(PageFlags::WRITABLE));
        }
        assert!(m.read(USER_IMAGE_BASE + 0x1800, 0x100).iter().all(|&b| b == 0xAB));
        assert!(m.read(USER_IMAGE_BASE + 0x1900, 0x1F00).iter().all(|&b| b == 0));
        assert!(m.read(USER_IMAGE_BASE + 0x1000, 0x800).iter().all(|&b| b == 0));
    }

    #[test]
    fn segments_sharing_a_page_keep_both() {
        let text = Segment {
            vaddr: USER_IMAGE_BASE,
            bytes: vec![0x11; 0x800],
            memsz: 0x800,
            flags: PF_R | PF_X,
        };
        let data_seg = Segment {
            vaddr: USER_IMAGE_BASE + 0x800,
            bytes: vec![0x22; 0x100],
            memsz: 0x100,
            flags: PF_R | PF_W,
        };
        let data = executable(USER_IMAGE_BASE, &[text, data_seg]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        load_image(&data, &mut m, 0).unwrap();

        assert!(m.read(USER_IMAGE_BASE, 0x800).iter().all(|&b| b == 0x11));
        assert!(m.read(USER_IMAGE_BASE + 0x800, 0x100).iter().all(|&b| b == 0x22));
        let (_, flags) = m.lookup(USER_IMAGE_BASE).unwrap();
        assert!(flags.contains(PageFlags::WRITABLE | PageFlags::USER));
        // uma única página para os dois segmentos + a pilha
        assert_eq!(m.frames.len(), 1 + USER_STACK_PAGES);
    }

    #[test]
    fn stack_sits_below_stack_top() {
        let data = executable(USER_IMAGE_BASE, &[code_segment(16)]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        load_image(&data, &mut m, 0).unwrap();

        let lowest = USER_STACK_TOP - (USER_STACK_PAGES * PAGE_SIZE) as u32;
        let (_, flags) = m.lookup(USER_STACK_TOP - 4).unwrap();
        assert!(flags.contains(PageFlags::WRITABLE | PageFlags::USER));
        assert!(m.lookup(lowest).is_some());
        assert!(m.lookup(lowest - 1).is_none());
        assert!(m.lookup(USER_STACK_TOP).is_none());
    }

    #[test]
    fn vga_flag_maps_text_buffer() {
        let data = executable(USER_IMAGE_BASE, &[code_segment(16)]);
        let mem = FakePhys::new();

        let mut plain = MockMapper::new(&mem);
        load_image(&data, &mut plain, 0).unwrap();
        assert!(plain.lookup(VGA_USER_VA).is_none());

        let mut console = MockMapper::new(&mem);
        load_image(&data, &mut console, ELF_FLAG_MAP_VGA).unwrap();
        let (phys, _) = console.lookup(VGA_USER_VA).unwrap();
        assert_eq!(phys.as_u32(), VGA_TEXT_PHYS);
    }

    #[test]
    fn rejects_segment_outside_image_region() {
        let low = Segment {
            vaddr: 0x0040_0000,
            bytes: vec![1; 8],
            memsz: 8,
            flags: PF_R,
        };
        let data = executable(USER_IMAGE_BASE, &[low]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        assert_eq!(load_image(&data, &mut m, 0).unwrap_err(), ElfError::SegmentInKernelSpace);

        let high = Segment {
            vaddr: USER_IMAGE_END - 0x800,
            bytes: vec![1; 8],
            memsz: 0x1000,
            flags: PF_R,
        };
        let data = executable(USER_IMAGE_BASE, &[high]);
        let mut m = MockMapper::new(&mem);
        assert_eq!(load_image(&data, &mut m, 0).unwrap_err(), ElfError::SegmentInKernelSpace);
    }

    #[test]
    fn rejects_filesz_larger_than_memsz() {
        let seg = Segment {
            vaddr: USER_IMAGE_BASE,
            bytes: vec![1; 64],
            memsz: 32,
            flags: PF_R,
        };
        let data = executable(USER_IMAGE_BASE, &[seg]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        assert_eq!(load_image(&data, &mut m, 0).unwrap_err(), ElfError::SegmentOutOfFile);
    }

    #[test]
    fn out_of_frames_reports_oom() {
        let data = executable(USER_IMAGE_BASE, &[code_segment(16)]);
        // diretório + 1 página de código + 1 tabela: a pilha não cabe
        let mem = FakePhys::with_limit(3);
        let mut m = MockMapper::new(&mem);
        let err = load_image(&data, &mut m, 0).unwrap_err();
        assert_eq!(err, ElfError::OutOfMemory);

        let owned = m.frames.clone();
        m.rollback();
        assert!(m.rolled_back);
        assert!(owned.iter().all(|&f| mem.was_freed(f)));
    }

    #[test]
    fn skips_empty_segments() {
        let empty = Segment {
            vaddr: 0x1000,
            bytes: Vec::new(),
            memsz: 0,
            flags: PF_R,
        };
        let data = executable(USER_IMAGE_BASE, &[empty, code_segment(16)]);
        let mem = FakePhys::new();
        let mut m = MockMapper::new(&mem);
        assert!(load_image(&data, &mut m, 0).is_ok());
    }
}
