//! Entry Point Lógico do Kernel.
//!
//! `kernel_main` é o primeiro código Rust depois do `_start` (main.rs), com
//! a stack de boot montada e interrupções desligadas.
//!
//! # Ordem de subida
//!
//! | Passo | Subsistema                        | Depende de          |
//! |-------|-----------------------------------|---------------------|
//! | 1     | serial (logs)                     |                     |
//! | 2     | GDT/TSS, IDT, PIC                 | serial              |
//! | 3     | heap, PMM, paginação              | multiboot info      |
//! | 4     | PIT, scheduler (idle), IPC        | heap                |
//! | 5     | PCI, ATA, VFS                     | heap                |
//! | 6     | VirtIO, RTL8139                   | PCI, paginação      |
//! | 7     | self-tests (`self_test`)          | tudo acima          |
//! | 8     | servidores, STI, laço idle        | tudo acima          |

use crate::arch::{Cpu, CpuOps};
use crate::drivers::{block, pci, pic, rtl8139, serial, timer, virtio};
use crate::sched::config::TIMER_HZ;

use super::boot::{self, MultibootInfo, BOOTLOADER_MAGIC};
use super::launcher;

extern "C" {
    /// Fim da imagem do kernel (linker.ld).
    static __kernel_end: u8;
}

/// Chamada pelo `_start` com EAX/EBX do loader.
#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, info_addr: u32) -> ! {
    serial::init();
    crate::kinfo!("Basalt Kernel - Iniciando");

    if magic != BOOTLOADER_MAGIC || info_addr == 0 {
        crate::kerror!("(Boot) Loader não é Multiboot v1, magic=", magic);
        Cpu::hang();
    }
    // SAFETY: o loader deixou a estrutura em memória baixa, identity-mapeada
    let info = unsafe { *(info_addr as usize as *const MultibootInfo) };

    crate::kinfo!("(Boot) GDT/TSS, IDT e PIC...");
    // SAFETY: boot, interrupções desligadas
    unsafe { crate::arch::platform::init() };
    pic::init();

    let Some(total_kb) = info.total_kb() else {
        crate::kerror!("(Boot) Loader não informou a memória");
        Cpu::hang();
    };
    // SAFETY: mesmas condições acima
    let raw_modules = unsafe { info.modules() };
    // SAFETY: símbolo do linker, só o endereço é usado
    let kernel_end = unsafe { &__kernel_end as *const u8 as usize as u32 };
    if let Err(err) = crate::mm::init(total_kb, boot::reserved_end(kernel_end, raw_modules)) {
        crate::kerror!("(Boot) Memória:");
        crate::kerror!(err.as_str());
        Cpu::hang();
    }

    if timer::init(TIMER_HZ).is_err() {
        crate::kerror!("(Boot) PIT recusou a frequência=", TIMER_HZ);
        Cpu::hang();
    }
    crate::sched::task_init();
    crate::ipc::init();

    crate::kinfo!("(Boot) Dispositivos PCI=", pci::scan());
    crate::kinfo!("(Boot) Drives ATA=", block::init());
    crate::fs::init();
    crate::kinfo!("(Boot) Dispositivos VirtIO=", virtio::init());
    if rtl8139::init() {
        crate::kinfo!("(Boot) RTL8139 presente");
    }

    #[cfg(feature = "self_test")]
    run_self_tests();

    // SAFETY: faixa dos módulos reservada e identity-mapeada
    let modules = unsafe { boot::collect_modules(&info) };
    crate::kinfo!("(Boot) Módulos de boot=", modules.len());
    let running = launcher::launch(&modules);
    crate::kinfo!("(Boot) Servidores no ar=", running);

    crate::kinfo!("(Boot) Habilitando interrupções - sistema ativo");
    crate::sched::idle_loop()
}

#[cfg(feature = "self_test")]
fn run_self_tests() {
    let failed = crate::mm::test::run_memory_tests()
        + crate::sched::test::run_sched_tests()
        + crate::fs::test::run_fs_tests()
        + crate::drivers::test::run_driver_tests();
    if failed == 0 {
        crate::kok!("(SelfTest) Todas as suites passaram");
    } else {
        crate::kfail!("(SelfTest) Houve falhas");
        crate::kerror!("(SelfTest) Falhas=", failed);
    }
}
