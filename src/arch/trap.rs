//! Roteamento de traps (exceções, IRQs e syscalls).
//!
//! Os stubs de `x86::interrupts` empilham um `TrapFrame` completo e chamam
//! `trap_dispatch`. Daqui em diante tudo é Rust neutro de plataforma.
//!
//! ```text
//!  vetor 0..31   → exceções (14 = page fault)
//!  vetor 32..47  → IRQ 0..15 (PIC remapeado)
//!  vetor 0x80    → syscall
//! ```

use crate::sync::Spinlock;

/// Seletores de segmento (GDT fixa de 6 entradas).
pub mod selectors {
    pub const KERNEL_CODE_SEL: u16 = 0x08;
    pub const KERNEL_DATA_SEL: u16 = 0x10;
    pub const USER_CODE_SEL: u16 = 0x18 | 3;
    pub const USER_DATA_SEL: u16 = 0x20 | 3;
    pub const TSS_SEL: u16 = 0x28;
}

pub const IRQ_BASE: u32 = 32;
pub const IRQ_COUNT: usize = 16;
pub const SYSCALL_VECTOR: u32 = 0x80;
pub const PAGE_FAULT_VECTOR: u32 = 14;

/// Frame salvo pelos stubs de interrupção, do topo da pilha para a base.
///
/// `user_esp`/`user_ss` só são válidos quando `cs` tem RPL 3.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub user_esp: u32,
    pub user_ss: u32,
}

impl TrapFrame {
    /// O trap veio de ring 3?
    #[inline]
    pub fn from_user(&self) -> bool {
        self.cs & 3 == 3
    }
}

/// Handler de IRQ registrado por drivers do kernel.
pub type IrqHandler = fn(irq: u8);

static IRQ_HANDLERS: Spinlock<[Option<IrqHandler>; IRQ_COUNT]> = Spinlock::new([None; IRQ_COUNT]);

/// Registra um handler de IRQ do kernel (substitui o anterior).
pub fn register_irq_handler(irq: u8, handler: IrqHandler) {
    if (irq as usize) < IRQ_COUNT {
        IRQ_HANDLERS.lock()[irq as usize] = Some(handler);
        crate::drivers::pic::unmask(irq);
    }
}

fn irq_handler(irq: u8) -> Option<IrqHandler> {
    IRQ_HANDLERS.lock().get(irq as usize).copied().flatten()
}

const EXCEPTION_NAMES: [&str; 20] = [
    "#DE divide error",
    "#DB debug",
    "NMI",
    "#BP breakpoint",
    "#OF overflow",
    "#BR bound range",
    "#UD invalid opcode",
    "#NM device not available",
    "#DF double fault",
    "coprocessor overrun",
    "#TS invalid TSS",
    "#NP segment not present",
    "#SS stack fault",
    "#GP general protection",
    "#PF page fault",
    "reserved",
    "#MF x87 fault",
    "#AC alignment check",
    "#MC machine check",
    "#XM SIMD fault",
];

/// Ponto de entrada comum de todos os stubs.
#[no_mangle]
pub extern "C" fn trap_dispatch(frame: &mut TrapFrame) {
    match frame.vector {
        PAGE_FAULT_VECTOR => crate::mm::vmm::fault::handle_page_fault(frame),
        0..=31 => handle_exception(frame),
        v if (IRQ_BASE..IRQ_BASE + IRQ_COUNT as u32).contains(&v) => {
            handle_irq((v - IRQ_BASE) as u8)
        }
        SYSCALL_VECTOR => crate::syscall::dispatch(frame),
        _ => crate::kwarn!("(Trap) Vetor inesperado: ", frame.vector),
    }
}

fn handle_exception(frame: &mut TrapFrame) {
    let name = EXCEPTION_NAMES
        .get(frame.vector as usize)
        .copied()
        .unwrap_or("reserved");

    if frame.from_user() {
        crate::kerror!("(Trap) Exceção em ring 3: ");
        crate::kerror!(name);
        crate::kerror!("(Trap) EIP=", frame.eip);
        crate::sched::kill_current_after_fault();
    }

    crate::kerror!("(Trap) Exceção em ring 0, vetor=", frame.vector);
    crate::kerror!("(Trap) error_code=", frame.error_code);
    crate::kerror!("(Trap) EIP=", frame.eip);
    panic!("exceção de CPU em modo kernel: {}", name);
}

fn handle_irq(irq: u8) {
    if irq == 0 {
        // EOI antes de um possível context switch
        crate::drivers::pic::end_of_interrupt(irq);
        crate::drivers::timer::handle_timer_interrupt();
        return;
    }

    if let Some(handler) = irq_handler(irq) {
        handler(irq);
    }
    crate::ipc::irq::forward_irq(irq);
    crate::drivers::pic::end_of_interrupt(irq);
}
