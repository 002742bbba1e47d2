//! Stubs assembly de interrupção.
//!
//! Cada vetor tem um stub que normaliza a pilha (código de erro falso quando
//! a CPU não empilha um), empilha o número do vetor e salta para
//! `isr_common`, que salva os registradores no layout de
//! `crate::arch::trap::TrapFrame` e chama `trap_dispatch`.
//!
//! Vetores com código de erro empilhado pela CPU: 8, 10, 11, 12, 13, 14, 17.

use core::arch::global_asm;

extern "C" {
    /// Endereços dos stubs dos vetores 0..48 (exceções + IRQs).
    pub static isr_stub_table: [u32; 48];
    /// Stub do vetor de syscall (0x80).
    pub fn isr_stub_128();
}

global_asm!(
    r#"
.section .text
.macro ISR_NOERR n
isr_stub_\n:
    push 0
    push \n
    jmp isr_common
.endm

.macro ISR_ERR n
isr_stub_\n:
    push \n
    jmp isr_common
.endm

isr_common:
    pushad
    push ds
    push es
    push fs
    push gs
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    push esp
    call trap_dispatch
    add esp, 4
    pop gs
    pop fs
    pop es
    pop ds
    popad
    add esp, 8
    iretd
"#,
    "ISR_NOERR 0",
    "ISR_NOERR 1",
    "ISR_NOERR 2",
    "ISR_NOERR 3",
    "ISR_NOERR 4",
    "ISR_NOERR 5",
    "ISR_NOERR 6",
    "ISR_NOERR 7",
    "ISR_ERR 8",
    "ISR_NOERR 9",
    "ISR_ERR 10",
    "ISR_ERR 11",
    "ISR_ERR 12",
    "ISR_ERR 13",
    "ISR_ERR 14",
    "ISR_NOERR 15",
    "ISR_NOERR 16",
    "ISR_ERR 17",
    "ISR_NOERR 18",
    "ISR_NOERR 19",
    "ISR_NOERR 20",
    "ISR_NOERR 21",
    "ISR_NOERR 22",
    "ISR_NOERR 23",
    "ISR_NOERR 24",
    "ISR_NOERR 25",
    "ISR_NOERR 26",
    "ISR_NOERR 27",
    "ISR_NOERR 28",
    "ISR_NOERR 29",
    "ISR_NOERR 30",
    "ISR_NOERR 31",
    "ISR_NOERR 32",
    "ISR_NOERR 33",
    "ISR_NOERR 34",
    "ISR_NOERR 35",
    "ISR_NOERR 36",
    "ISR_NOERR 37",
    "ISR_NOERR 38",
    "ISR_NOERR 39",
    "ISR_NOERR 40",
    "ISR_NOERR 41",
    "ISR_NOERR 42",
    "ISR_NOERR 43",
    "ISR_NOERR 44",
    "ISR_NOERR 45",
    "ISR_NOERR 46",
    "ISR_NOERR 47",
    "ISR_NOERR 128",
    ".global isr_stub_128",
    ".section .rodata",
    ".global isr_stub_table",
    ".p2align 2",
    "isr_stub_table:",
    ".long isr_stub_0",
    ".long isr_stub_1",
    ".long isr_stub_2",
    ".long isr_stub_3",
    ".long isr_stub_4",
    ".long isr_stub_5",
    ".long isr_stub_6",
    ".long isr_stub_7",
    ".long isr_stub_8",
    ".long isr_stub_9",
    ".long isr_stub_10",
    ".long isr_stub_11",
    ".long isr_stub_12",
    ".long isr_stub_13",
    ".long isr_stub_14",
    ".long isr_stub_15",
    ".long isr_stub_16",
    ".long isr_stub_17",
    ".long isr_stub_18",
    ".long isr_stub_19",
    ".long isr_stub_20",
    ".long isr_stub_21",
    ".long isr_stub_22",
    ".long isr_stub_23",
    ".long isr_stub_24",
    ".long isr_stub_25",
    ".long isr_stub_26",
    ".long isr_stub_27",
    ".long isr_stub_28",
    ".long isr_stub_29",
    ".long isr_stub_30",
    ".long isr_stub_31",
    ".long isr_stub_32",
    ".long isr_stub_33",
    ".long isr_stub_34",
    ".long isr_stub_35",
    ".long isr_stub_36",
    ".long isr_stub_37",
    ".long isr_stub_38",
    ".long isr_stub_39",
    ".long isr_stub_40",
    ".long isr_stub_41",
    ".long isr_stub_42",
    ".long isr_stub_43",
    ".long isr_stub_44",
    ".long isr_stub_45",
    ".long isr_stub_46",
    ".long isr_stub_47",
    ".section .text",
);
