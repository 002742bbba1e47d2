//! Handler de page fault (#PF, vetor 14).

use crate::arch::trap::TrapFrame;
use crate::arch::{Cpu, CpuOps};

/// Bits do error code do #PF.
const PF_PRESENT: u32 = 1 << 0;
const PF_WRITE: u32 = 1 << 1;

/// Falha de usuário com task corrente: a task morre e o sistema segue.
/// Qualquer outra falha é fatal.
pub fn handle_page_fault(frame: &mut TrapFrame) {
    let cr2 = Cpu::read_cr2() as u32;

    if frame.from_user() && crate::sched::current_pid().is_some() {
        crate::kerror!("(PF) Falha em ring 3, CR2=", cr2);
        crate::kerror!("(PF) EIP=", frame.eip);
        if frame.error_code & PF_PRESENT == 0 {
            crate::kerror!("(PF) Página não presente");
        } else if frame.error_code & PF_WRITE != 0 {
            crate::kerror!("(PF) Escrita em página protegida");
        }
        crate::sched::kill_current_after_fault();
    }

    crate::kerror!("(PF) Falha no kernel, CR2=", cr2);
    crate::kerror!("(PF) EIP=", frame.eip);
    crate::kerror!("(PF) error_code=", frame.error_code);
    panic!("page fault em modo kernel: cr2={:#010x} eip={:#010x}", cr2, frame.eip);
}
