//! Formato ELF32 (i386): cabeçalho e program headers.
//!
//! Os campos são lidos byte a byte (little-endian) do buffer do módulo,
//! que não tem alinhamento garantido.

use crate::klib::bytes::{read_u16, read_u32, read_u8};
use crate::mm::config::USER_IMAGE_BASE;

use super::ElfError;

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

pub const ELFCLASS32: u8 = 1;
pub const ELFDATA2LSB: u8 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_386: u16 = 3;

pub const EHDR_SIZE: usize = 52;
pub const PHDR_SIZE: usize = 32;

/// Tipos de segmento relevantes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhType {
    Null,
    Load,
    Other(u32),
}

impl From<u32> for PhType {
    fn from(raw: u32) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::Load,
            other => Self::Other(other),
        }
    }
}

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

/// Cabeçalho ELF32 (só os campos usados pelo loader).
#[derive(Debug, Clone, Copy)]
pub struct Elf32Header {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_phentsize: u16,
    pub e_phnum: u16,
}

impl Elf32Header {
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < EHDR_SIZE || data[0..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        if read_u8(data, 4) != ELFCLASS32 {
            return Err(ElfError::NotElf32);
        }
        if read_u8(data, 5) != ELFDATA2LSB {
            return Err(ElfError::NotLittleEndian);
        }
        Ok(Self {
            e_type: read_u16(data, 16),
            e_machine: read_u16(data, 18),
            e_entry: read_u32(data, 24),
            e_phoff: read_u32(data, 28),
            e_phentsize: read_u16(data, 42),
            e_phnum: read_u16(data, 44),
        })
    }

    /// Distância entre program headers (0 no arquivo vira o tamanho padrão).
    pub fn ph_stride(&self) -> usize {
        if self.e_phentsize == 0 {
            PHDR_SIZE
        } else {
            self.e_phentsize as usize
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Elf32Phdr {
    pub p_type: PhType,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
}

impl Elf32Phdr {
    fn parse(data: &[u8], off: usize) -> Self {
        Self {
            p_type: PhType::from(read_u32(data, off)),
            p_offset: read_u32(data, off + 4),
            p_vaddr: read_u32(data, off + 8),
            p_filesz: read_u32(data, off + 16),
            p_memsz: read_u32(data, off + 20),
            p_flags: read_u32(data, off + 24),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.p_flags & PF_W != 0
    }
}

/// Valida o binário e devolve o cabeçalho.
///
/// Exige ELF32 LE, ET_EXEC, EM_386, ao menos um program header, tabela de
/// headers dentro do arquivo e entry na região de imagem de usuário.
pub fn validate(data: &[u8]) -> Result<Elf32Header, ElfError> {
    let header = Elf32Header::parse(data)?;

    if header.e_type != ET_EXEC {
        return Err(ElfError::NotExecutable);
    }
    if header.e_machine != EM_386 {
        return Err(ElfError::WrongMachine);
    }
    if header.e_phnum == 0 {
        return Err(ElfError::NoProgramHeaders);
    }
    if header.ph_stride() < PHDR_SIZE {
        return Err(ElfError::HeadersOutOfFile);
    }

    let table_end = header.e_phoff as u64 + header.e_phnum as u64 * header.ph_stride() as u64;
    if table_end > data.len() as u64 {
        return Err(ElfError::HeadersOutOfFile);
    }
    if header.e_entry < USER_IMAGE_BASE {
        return Err(ElfError::EntryBelowUserBase);
    }
    Ok(header)
}

/// Program headers de um binário já validado.
pub fn program_headers<'a>(data: &'a [u8], header: &Elf32Header) -> impl Iterator<Item = Elf32Phdr> + 'a {
    let base = header.e_phoff as usize;
    let stride = header.ph_stride();
    (0..header.e_phnum as usize).map(move |i| Elf32Phdr::parse(data, base + i * stride))
}

#[cfg(test)]
pub(crate) mod build {
    //! Montador mínimo de binários ELF32 para os testes.

    use super::*;
    use crate::klib::bytes::{write_u16, write_u32};
    use std::vec::Vec;

    pub struct Segment {
        pub vaddr: u32,
        pub bytes: Vec<u8>,
        pub memsz: u32,
        pub flags: u32,
    }

    /// Um ET_EXEC i386 com os segmentos dados, dados a partir de 0x1000.
    pub fn executable(entry: u32, segments: &[Segment]) -> Vec<u8> {
        let phoff = EHDR_SIZE;
        let mut image = vec![0u8; 0x1000];
        image[0..4].copy_from_slice(&ELF_MAGIC);
        image[4] = ELFCLASS32;
        image[5] = ELFDATA2LSB;
        image[6] = 1;
        write_u16(&mut image, 16, ET_EXEC);
        write_u16(&mut image, 18, EM_386);
        write_u32(&mut image, 20, 1);
        write_u32(&mut image, 24, entry);
        write_u32(&mut image, 28, phoff as u32);
        write_u16(&mut image, 40, EHDR_SIZE as u16);
        write_u16(&mut image, 42, PHDR_SIZE as u16);
        write_u16(&mut image, 44, segments.len() as u16);

        for (i, seg) in segments.iter().enumerate() {
            let offset = image.len() as u32;
            let ph = phoff + i * PHDR_SIZE;
            write_u32(&mut image, ph, 1);
            write_u32(&mut image, ph + 4, offset);
            write_u32(&mut image, ph + 8, seg.vaddr);
            write_u32(&mut image, ph + 12, seg.vaddr);
            write_u32(&mut image, ph + 16, seg.bytes.len() as u32);
            write_u32(&mut image, ph + 20, seg.memsz);
            write_u32(&mut image, ph + 24, seg.flags);
            write_u32(&mut image, ph + 28, 0x1000);
            image.extend_from_slice(&seg.bytes);
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::build::{executable, Segment};
    use super::*;
    use crate::klib::bytes::{write_u16, write_u32};

    fn minimal() -> std::vec::Vec<u8> {
        executable(
            0xC000_0000,
            &[Segment {
                vaddr: 0xC000_0000,
                bytes: vec![0x90; 16],
                memsz: 16,
                flags: PF_R | PF_X,
            }],
        )
    }

    #[test]
    fn accepts_minimal_executable() {
        let data = minimal();
        let header = validate(&data).unwrap();
        assert_eq!(header.e_entry, 0xC000_0000);
        let phdrs: std::vec::Vec<_> = program_headers(&data, &header).collect();
        assert_eq!(phdrs.len(), 1);
        assert_eq!(phdrs[0].p_type, PhType::Load);
        assert_eq!(phdrs[0].p_filesz, 16);
        assert!(!phdrs[0].is_writable());
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut data = minimal();
        data[1] = b'X';
        assert_eq!(validate(&data).unwrap_err(), ElfError::BadMagic);
        assert_eq!(validate(&[0x7F, b'E']).unwrap_err(), ElfError::BadMagic);
    }

    #[test]
    fn rejects_wrong_class_and_endianness() {
        let mut data = minimal();
        data[4] = 2;
        assert_eq!(validate(&data).unwrap_err(), ElfError::NotElf32);
        let mut data = minimal();
        data[5] = 2;
        assert_eq!(validate(&data).unwrap_err(), ElfError::NotLittleEndian);
    }

    #[test]
    fn rejects_wrong_type_and_machine() {
        let mut data = minimal();
        write_u16(&mut data, 16, 3);
        assert_eq!(validate(&data).unwrap_err(), ElfError::NotExecutable);
        let mut data = minimal();
        write_u16(&mut data, 18, 62);
        assert_eq!(validate(&data).unwrap_err(), ElfError::WrongMachine);
    }

    #[test]
    fn rejects_missing_or_truncated_headers() {
        let mut data = minimal();
        write_u16(&mut data, 44, 0);
        assert_eq!(validate(&data).unwrap_err(), ElfError::NoProgramHeaders);

        let mut data = minimal();
        let phoff = data.len() as u32 - 8;
        write_u32(&mut data, 28, phoff);
        assert_eq!(validate(&data).unwrap_err(), ElfError::HeadersOutOfFile);
    }

    #[test]
    fn rejects_entry_below_user_base() {
        let mut data = minimal();
        write_u32(&mut data, 24, 0x0010_0000);
        assert_eq!(validate(&data).unwrap_err(), ElfError::EntryBelowUserBase);
    }
}
