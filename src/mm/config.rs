//! # Configuração do Módulo de Memória
//!
//! Layout do espaço virtual de 4 GiB (i686, sem PAE):
//!
//! ```text
//! 0x0000_0000 ┬──────────────────────────────┐
//!             │ identity map da RAM (kernel, │  até IDENTITY_LIMIT
//!             │ heap, frames do PMM)         │
//! 0x2000_0000 ├──────────────────────────────┤
//!             │ visão do compositor dos      │  GUI_KERNEL_FB_BASE
//!             │ framebuffers das janelas ELF │
//! 0x3000_0000 ├──────────────────────────────┤
//!             │ BARs MMIO (VirtIO)           │  write-through
//! 0x3FE0_0000 │ janelas TEMP_PD / TEMP_PT    │
//! 0x4000_0000 ├──────────────────────────────┤
//!             │ faixa de usuário             │  zerada no espaço isolado
//! 0xB000_0000 │ VGA (console server)         │
//! 0xC000_0000 │ imagens ELF                  │
//! 0xD000_0000 │ heap de usuário (malloc)     │
//! 0xD800_0000 │ framebuffer da janela ELF    │
//! 0xE000_0000 │ topo da stack de usuário     │
//!             └──────────────────────────────┘
//! ```

// =============================================================================
// PÁGINAS
// =============================================================================

pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: u32 = 12;
pub const ENTRIES_PER_TABLE: usize = 1024;
/// Cada entrada do diretório cobre 4 MiB.
pub const PD_SPAN: u32 = 4 * 1024 * 1024;

// =============================================================================
// REGIÃO DO KERNEL (slots 0..256, compartilhados por todos os espaços)
// =============================================================================

/// Fim da RAM identity-mapeada. RAM acima disso não é gerenciada.
pub const IDENTITY_LIMIT: u32 = 0x2000_0000;

/// Visão do compositor: `GUI_KERNEL_FB_BASE + slot * GUI_FB_SPAN`.
pub const GUI_KERNEL_FB_BASE: u32 = 0x2000_0000;
/// Distância entre as visões de dois slots GUI.
pub const GUI_FB_SPAN: u32 = 0x0020_0000;

/// Faixa reservada para BARs MMIO de GPU. Mapeamentos aqui levam write-through.
pub const GPU_MMIO_BASE: u32 = 0x3000_0000;
pub const GPU_MMIO_END: u32 = 0x4000_0000;

/// Janelas de edição de diretórios não ativos (`map_user`).
pub const TEMP_PD_VA: u32 = 0x3FE0_0000;
pub const TEMP_PT_VA: u32 = 0x3FE0_1000;

/// Primeiro slot do diretório que pertence ao usuário.
pub const USER_PD_FIRST: usize = 256;
/// Último slot (exclusivo) da faixa zerada em espaços isolados.
pub const USER_PD_END: usize = 960;
/// Início da faixa de usuário.
pub const USER_SPACE_BASE: u32 = 0x4000_0000;

// =============================================================================
// REGIÃO DE USUÁRIO
// =============================================================================

/// Endereço mínimo de entry point e segmentos ELF.
pub const USER_IMAGE_BASE: u32 = 0xC000_0000;
/// Heap de usuário (`malloc`/`free`).
pub const USER_HEAP_BASE: u32 = 0xD000_0000;
pub const USER_HEAP_END: u32 = 0xD800_0000;
/// Framebuffer compartilhado de janelas ELF no espaço do cliente.
pub const GUI_USER_FB_BASE: u32 = 0xD800_0000;
/// Topo da stack de usuário (cresce para baixo).
pub const USER_STACK_TOP: u32 = 0xE000_0000;
/// Páginas de stack de usuário.
pub const USER_STACK_PAGES: usize = 16;
/// Limite superior de qualquer segmento ELF.
pub const USER_IMAGE_END: u32 = USER_HEAP_BASE;

/// Buffer de texto VGA (físico) e onde o console server o enxerga.
pub const VGA_TEXT_PHYS: u32 = 0x000B_8000;
pub const VGA_USER_VA: u32 = 0xB000_0000;

// =============================================================================
// HEAP DO KERNEL
// =============================================================================

/// Tamanho do heap do kernel (região física fixa logo após a imagem).
pub const KERNEL_HEAP_SIZE: usize = 16 * 1024 * 1024;

/// Primeiro MiB: IVT, BDA, EBDA, VGA, BIOS.
pub const LOW_MEMORY_RESERVED: u32 = 0x0010_0000;
