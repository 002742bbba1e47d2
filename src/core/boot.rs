//! # Boot Info (Multiboot v1)
//!
//! O GRUB entrega em EBX o endereço de `MultibootInfo`. Daqui o kernel tira
//! o tamanho da RAM e a lista de módulos (servidores ELF). Tudo está abaixo
//! de `IDENTITY_LIMIT`, então os endereços físicos servem como ponteiros.
//!
//! | Prefixo do módulo | Servidor  | IOPL | Extra            |
//! |-------------------|-----------|------|------------------|
//! | `console`         | console   | sim  | VGA mapeada      |
//! | `vfs`             | vfs       | não  |                  |
//! | `ata`, `disk`     | ata       | sim  |                  |
//! | `net`             | net       | sim  |                  |
//!
//! Módulos com outro nome são ignorados com aviso.

use alloc::string::String;
use alloc::vec::Vec;

use crate::sched::exec::ELF_FLAG_MAP_VGA;

/// Valor de EAX quando o loader é Multiboot v1.
pub const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

bitflags::bitflags! {
    /// Campos válidos de `MultibootInfo`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InfoFlags: u32 {
        const MEMORY  = 1 << 0;
        const DEVICE  = 1 << 1;
        const CMDLINE = 1 << 2;
        const MODULES = 1 << 3;
    }
}

/// Prefixo da estrutura de informação (só os campos usados).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MultibootInfo {
    pub flags: u32,
    /// KiB abaixo de 1 MiB
    pub mem_lower: u32,
    /// KiB acima de 1 MiB
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleEntry {
    pub start: u32,
    pub end: u32,
    pub cmdline: u32,
    pub reserved: u32,
}

impl MultibootInfo {
    pub fn flags(&self) -> InfoFlags {
        InfoFlags::from_bits_truncate(self.flags)
    }

    /// RAM total em KiB (1 MiB baixo + `mem_upper`).
    pub fn total_kb(&self) -> Option<usize> {
        self.flags()
            .contains(InfoFlags::MEMORY)
            .then(|| 1024 + self.mem_upper as usize)
    }

    /// # Safety
    /// `self` veio do loader e `mods_addr` aponta para `mods_count` entradas.
    pub unsafe fn modules(&self) -> &'static [ModuleEntry] {
        if !self.flags().contains(InfoFlags::MODULES) || self.mods_count == 0 {
            return &[];
        }
        core::slice::from_raw_parts(self.mods_addr as usize as *const ModuleEntry, self.mods_count as usize)
    }
}

/// Primeiro byte livre depois da imagem e de todos os módulos.
pub fn reserved_end(kernel_end: u32, modules: &[ModuleEntry]) -> u32 {
    modules.iter().map(|m| m.end).fold(kernel_end, u32::max)
}

// =============================================================================
// MÓDULOS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Console,
    Vfs,
    Ata,
    Net,
}

impl ServerKind {
    pub const ALL: [ServerKind; 4] = [Self::Console, Self::Vfs, Self::Ata, Self::Net];

    pub fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Vfs => "vfs",
            Self::Ata => "ata",
            Self::Net => "net",
        }
    }

    pub fn iopl(self) -> bool {
        !matches!(self, Self::Vfs)
    }

    pub fn elf_flags(self) -> u32 {
        match self {
            Self::Console => ELF_FLAG_MAP_VGA,
            _ => 0,
        }
    }
}

/// Classifica pelo basename do primeiro token da linha de comando.
pub fn classify(cmdline: &str) -> Option<ServerKind> {
    let path = cmdline.split_whitespace().next().unwrap_or("");
    let base = path.rsplit('/').next().unwrap_or(path);
    match base {
        b if b.starts_with("console") => Some(ServerKind::Console),
        b if b.starts_with("vfs") => Some(ServerKind::Vfs),
        b if b.starts_with("ata") || b.starts_with("disk") => Some(ServerKind::Ata),
        b if b.starts_with("net") => Some(ServerKind::Net),
        _ => None,
    }
}

/// Módulo já copiado para estruturas do kernel.
#[derive(Debug, Clone)]
pub struct BootModule {
    pub cmdline: String,
    pub start: u32,
    pub end: u32,
}

impl BootModule {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> Option<ServerKind> {
        classify(&self.cmdline)
    }

    /// # Safety
    /// A faixa do módulo continua reservada no PMM e identity-mapeada.
    pub unsafe fn data(&self) -> &'static [u8] {
        if self.is_empty() {
            return &[];
        }
        core::slice::from_raw_parts(self.start as usize as *const u8, self.len())
    }
}

/// Lê uma string C do loader (limitada a 256 bytes, UTF-8 ou vazia).
///
/// # Safety
/// `addr` é zero ou aponta para memória identity-mapeada.
pub unsafe fn cstr_at(addr: u32) -> &'static str {
    if addr == 0 {
        return "";
    }
    let base = addr as usize as *const u8;
    let mut len = 0;
    while len < 256 && *base.add(len) != 0 {
        len += 1;
    }
    core::str::from_utf8(core::slice::from_raw_parts(base, len)).unwrap_or("")
}

/// Copia a lista de módulos (precisa do heap).
///
/// # Safety
/// Mesmas condições de `MultibootInfo::modules`.
pub unsafe fn collect_modules(info: &MultibootInfo) -> Vec<BootModule> {
    info.modules()
        .iter()
        .map(|m| BootModule {
            cmdline: String::from(cstr_at(m.cmdline)),
            start: m.start,
            end: m.end,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_basename_prefix() {
        assert_eq!(classify("/boot/console.elf"), Some(ServerKind::Console));
        assert_eq!(classify("vfs"), Some(ServerKind::Vfs));
        assert_eq!(classify("/boot/disk_server arg"), Some(ServerKind::Ata));
        assert_eq!(classify("ata.elf"), Some(ServerKind::Ata));
        assert_eq!(classify("/modules/net"), Some(ServerKind::Net));
        assert_eq!(classify("/boot/shell.elf"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn server_privileges() {
        assert!(ServerKind::Console.iopl());
        assert!(!ServerKind::Vfs.iopl());
        assert_eq!(ServerKind::Console.elf_flags(), ELF_FLAG_MAP_VGA);
        assert_eq!(ServerKind::Net.elf_flags(), 0);
    }

    #[test]
    fn memory_and_reserved_end() {
        let info = MultibootInfo {
            flags: (InfoFlags::MEMORY | InfoFlags::MODULES).bits(),
            mem_lower: 639,
            mem_upper: 127 * 1024,
            ..MultibootInfo::default()
        };
        assert_eq!(info.total_kb(), Some(128 * 1024));
        assert_eq!(MultibootInfo::default().total_kb(), None);

        let mods = [
            ModuleEntry { start: 0x20_0000, end: 0x21_0000, ..ModuleEntry::default() },
            ModuleEntry { start: 0x21_0000, end: 0x23_4000, ..ModuleEntry::default() },
        ];
        assert_eq!(reserved_end(0x18_0000, &mods), 0x23_4000);
        assert_eq!(reserved_end(0x18_0000, &[]), 0x18_0000);
    }

    #[test]
    fn module_without_flag_is_ignored() {
        let info = MultibootInfo { mods_count: 3, mods_addr: 0x1000, ..MultibootInfo::default() };
        assert!(unsafe { info.modules() }.is_empty());
    }
}
