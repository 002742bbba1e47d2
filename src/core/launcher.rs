//! # Launcher
//!
//! Sobe os servidores depois que todo o kernel está de pé:
//!
//! 1. cada módulo de boot reconhecido vira um processo ELF isolado;
//! 2. cada papel sem módulo ganha a versão embutida (`servers`);
//! 3. módulos desconhecidos só geram aviso.
//!
//! Um papel aparece uma vez só: o primeiro módulo ganha, os repetidos
//! são ignorados.

use alloc::vec::Vec;

use crate::sched::{config::PRIORITY_HIGH, exec};
use crate::sys::Pid;

use super::boot::{BootModule, ServerKind};
use super::servers;

/// O que fazer com a lista de módulos.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// Índice do módulo e papel que ele cumpre
    pub load: Vec<(usize, ServerKind)>,
    /// Papéis sem módulo
    pub builtin: Vec<ServerKind>,
    /// Índices não reconhecidos ou repetidos
    pub ignored: Vec<usize>,
}

pub fn plan(modules: &[BootModule]) -> Plan {
    let mut plan = Plan::default();
    for (i, module) in modules.iter().enumerate() {
        match module.kind() {
            Some(kind) if !module.is_empty() && !plan.load.iter().any(|&(_, k)| k == kind) => {
                plan.load.push((i, kind));
            }
            _ => plan.ignored.push(i),
        }
    }
    plan.builtin = ServerKind::ALL
        .iter()
        .copied()
        .filter(|kind| !plan.load.iter().any(|&(_, k)| k == *kind))
        .collect();
    plan
}

/// Executa o plano. Devolve quantos servidores ficaram no ar.
pub fn launch(modules: &[BootModule]) -> usize {
    let plan = plan(modules);
    let mut running = 0;

    for &i in &plan.ignored {
        crate::kwarn!("(Launcher) Módulo ignorado:");
        crate::kwarn!(modules[i].cmdline.as_str());
    }

    for &(i, kind) in &plan.load {
        // SAFETY: a faixa dos módulos ficou reservada em mm::init
        let image = unsafe { modules[i].data() };
        match exec::load(image, kind.name(), PRIORITY_HIGH, kind.iopl(), kind.elf_flags()) {
            Ok(pid) => {
                log_started(kind, pid);
                running += 1;
            }
            Err(err) => {
                crate::kerror!("(Launcher) ELF rejeitado:");
                crate::kerror!(kind.name());
                crate::kerror!(err.as_str());
                running += start_builtin(kind);
            }
        }
    }

    for &kind in &plan.builtin {
        running += start_builtin(kind);
    }
    running
}

fn start_builtin(kind: ServerKind) -> usize {
    match servers::spawn(kind) {
        Ok(pid) => {
            log_started(kind, pid);
            1
        }
        Err(err) => {
            crate::kerror!("(Launcher) Falha no servidor embutido:");
            crate::kerror!(err.as_str());
            0
        }
    }
}

fn log_started(kind: ServerKind, pid: Pid) {
    crate::kinfo!("(Launcher) Servidor:");
    crate::kinfo!(kind.name());
    crate::kinfo!("(Launcher) pid=", pid.as_u32());
}
