//! Basalt Kernel — Binário Principal.
//!
//! Responsabilidade:
//! 1. Cabeçalho Multiboot v1 (seção `.multiboot`, primeiros 8 KiB da imagem).
//! 2. Stack de boot de 64 KiB.
//! 3. **Zerar BSS** (o loader não garante).
//! 4. Saltar para `core::entry::kernel_main(magic, info)`.

#![no_std]
#![no_main]

// Puxa o crate inteiro para o link (panic handler, alocador, kernel_main).
use basalt::core as kernel_core;

extern crate alloc;

/// Flags do cabeçalho: módulos alinhados em página + mapa de memória.
const MULTIBOOT_FLAGS: u32 = (1 << 0) | (1 << 1);
const MULTIBOOT_MAGIC: u32 = 0x1BAD_B002;
const STACK_SIZE: usize = 64 * 1024;

core::arch::global_asm!(
    ".section .multiboot, \"a\"",
    ".align 4",
    ".long {magic}",
    ".long {flags}",
    ".long {checksum}",
    "",
    ".section .bss",
    ".align 16",
    "boot_stack_bottom:",
    ".skip {stack_size}",
    "boot_stack_top:",
    "",
    ".section .text._start, \"ax\"",
    ".global _start",
    "_start:",
    "    cli",
    "    mov esp, offset boot_stack_top",
    // EAX/EBX do loader ficam em ESI/EDX enquanto o BSS é zerado
    "    mov esi, eax",
    "    mov edx, ebx",
    "    mov ecx, offset __bss_end",
    "    sub ecx, offset __bss_start",
    "    mov edi, offset __bss_start",
    "    xor eax, eax",
    "    cld",
    "    rep stosb",
    // a stack de boot está no BSS: reconstrói depois de zerar
    "    mov esp, offset boot_stack_top",
    "    push edx",
    "    push esi",
    "    call kernel_main",
    "2:",
    "    cli",
    "    hlt",
    "    jmp 2b",
    magic = const MULTIBOOT_MAGIC,
    flags = const MULTIBOOT_FLAGS,
    checksum = const 0u32.wrapping_sub(MULTIBOOT_MAGIC).wrapping_sub(MULTIBOOT_FLAGS),
    stack_size = const STACK_SIZE,
);

/// Garante que `kernel_main` não seja descartado pelo linker.
#[used]
static KERNEL_MAIN: extern "C" fn(u32, u32) -> ! = kernel_core::entry::kernel_main;
