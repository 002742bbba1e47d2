//! # Kernel Driver Layer
//!
//! Drivers que ficam no kernel. Servidores de ring 3 (console, vfs, ata,
//! net) falam com eles por syscalls de suporte ou por IPC.
//!
//! | Driver     | Arquivo      | Uso                                         |
//! |------------|--------------|---------------------------------------------|
//! | Serial     | `serial.rs`  | logs do kernel (COM1)                       |
//! | PIC        | `pic.rs`     | 8259 remapeado para 32..47                  |
//! | Timer      | `timer.rs`   | PIT 100 Hz, relógio e preempção             |
//! | VGA        | `vga.rs`     | texto 80x25, apenas no panic                |
//! | Teclado    | `keyboard.rs`| decodificação + ring de `kbd_getchar`       |
//! | PCI        | `pci/`       | mecanismo #1, scan, BARs, capabilities      |
//! | Bloco      | `block/`     | ATA PIO 28-bit + ramdisk                    |
//! | VirtIO     | `virtio/`    | transporte moderno, GPU e input             |
//! | RTL8139    | `rtl8139.rs` | presença e contagem de IRQs                 |
//!
//! ```text
//!   ring 3:  console   vfs   ata   net   apps GUI
//!               │       │     │     │       │
//!            syscalls / IPC (IRQ → notify)
//!               │       │     │     │       │
//!   ring 0:  serial  fs/vfs  block rtl8139 virtio-gpu
//! ```

pub mod block;
pub mod keyboard;
pub mod pci;
pub mod pic;
pub mod rtl8139;
pub mod serial;
pub mod timer;
pub mod vga;
pub mod virtio;

#[cfg(feature = "self_test")]
pub mod test;
