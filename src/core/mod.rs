//! Core Module
//!
//! Boot, logs e os servidores que o kernel sobe por conta própria.
//!
//! | Módulo     | Conteúdo                                          |
//! |------------|---------------------------------------------------|
//! | `boot`     | Multiboot v1: memória e módulos                   |
//! | `entry`    | `kernel_main` e a ordem de subida                 |
//! | `launcher` | módulos ELF ou servidores embutidos               |
//! | `logging`  | macros `kinfo!`, `kerror!`... sobre a COM1        |
//! | `panic`    | `#[panic_handler]`                                |
//! | `servers`  | console, vfs, ata e net como tasks de kernel      |

pub mod boot;
#[cfg(all(target_arch = "x86", not(test)))]
pub mod entry;
pub mod launcher;
pub mod logging;
#[cfg(all(target_arch = "x86", not(test)))]
pub mod panic;
pub mod servers;
