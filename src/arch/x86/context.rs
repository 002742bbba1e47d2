//! Troca de contexto e montagem da pilha inicial de tarefas.
//!
//! Só os registradores callee-saved (EBP, EBX, ESI, EDI) e o ESP são salvos:
//! o resto do estado já está na pilha do kernel da tarefa (TrapFrame ou
//! frame de chamada). Layout de uma pilha suspensa, do ESP salvo para cima:
//!
//! ```text
//!  [edi][esi][ebx][ebp][ret] ...
//! ```
//!
//! Tarefas novas recebem uma pilha falsa cujo `ret` aponta para um trampolim.

use core::arch::global_asm;

use crate::arch::trap::selectors::{USER_CODE_SEL, USER_DATA_SEL};

/// Ponto de entrada de uma tarefa.
pub type TaskEntry = extern "C" fn();

const EFLAGS_IF: u32 = 1 << 9;
const EFLAGS_RESERVED: u32 = 1 << 1;
const EFLAGS_IOPL3: u32 = 3 << 12;

extern "C" {
    fn switch_context(old_esp: *mut usize, new_esp: usize);
    fn kernel_task_trampoline();
    fn user_task_trampoline();
}

global_asm!(
    r#"
.section .text
.global switch_context
switch_context:
    mov eax, [esp + 4]
    mov edx, [esp + 8]
    push ebp
    push ebx
    push esi
    push edi
    mov [eax], esp
    mov esp, edx
    pop edi
    pop esi
    pop ebx
    pop ebp
    ret

.global kernel_task_trampoline
kernel_task_trampoline:
    sti
    pop eax
    call eax
    push 0
    call task_exit_trampoline
    ud2

.global user_task_trampoline
user_task_trampoline:
    mov ax, 0x23
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    iretd
"#
);

/// Salva o contexto atual em `old_esp` e retoma o contexto em `new_esp`.
///
/// # Safety
/// `new_esp` precisa ter sido produzido por `switch` ou pelos `prepare_*`,
/// e o diretório ativo precisa mapear a pilha de destino.
#[inline]
pub unsafe fn switch(old_esp: *mut usize, new_esp: usize) {
    switch_context(old_esp, new_esp);
}

unsafe fn push(sp: &mut usize, value: u32) {
    *sp -= 4;
    (*sp as *mut u32).write(value);
}

/// Pilha inicial de uma tarefa de kernel: retorna no trampolim, que habilita
/// interrupções e chama `entry`.
///
/// # Safety
/// `stack_top` deve ser o topo de uma região gravável exclusiva da tarefa.
pub unsafe fn prepare_kernel_stack(stack_top: usize, entry: TaskEntry) -> usize {
    let mut sp = stack_top & !0xF;
    push(&mut sp, entry as usize as u32);
    push(&mut sp, kernel_task_trampoline as usize as u32);
    for _ in 0..4 {
        push(&mut sp, 0);
    }
    sp
}

/// Pilha inicial de uma tarefa ring 3: um frame de `iretd` completo
/// (SS, ESP, EFLAGS, CS, EIP) mais o retorno no trampolim de usuário.
///
/// # Safety
/// `kstack_top` deve ser o topo da pilha de kernel exclusiva da tarefa.
pub unsafe fn prepare_user_stack(kstack_top: usize, eip: u32, user_esp: u32, iopl: bool) -> usize {
    let mut sp = kstack_top & !0xF;
    let mut eflags = EFLAGS_IF | EFLAGS_RESERVED;
    if iopl {
        eflags |= EFLAGS_IOPL3;
    }

    push(&mut sp, USER_DATA_SEL as u32);
    push(&mut sp, user_esp);
    push(&mut sp, eflags);
    push(&mut sp, USER_CODE_SEL as u32);
    push(&mut sp, eip);
    push(&mut sp, user_task_trampoline as usize as u32);
    for _ in 0..4 {
        push(&mut sp, 0);
    }
    sp
}
