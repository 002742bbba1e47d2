//! # ProcFS
//!
//! Arquivos somente leitura sintetizados a cada leitura em `/proc`.
//!
//! | Arquivo     | Conteúdo                                      |
//! |-------------|-----------------------------------------------|
//! | `tasks`     | pid, estado, prioridade e nome de cada task   |
//! | `meminfo`   | frames do PMM e uso do heap do kernel         |
//! | `uptime`    | segundos e ticks desde o boot                 |
//! | `services`  | registro de serviços do IPC                   |
//! | `version`   | nome e versão do kernel                       |
//! | `mounts`    | volumes montados em `/disk` e `/disk2`        |
//! | `windows`   | janelas GUI abertas                           |
//!
//! Os renderizadores são funções puras sobre cópias dos dados do kernel.
//! O texto é cortado em `PROCFS_MAX_FILE` bytes.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use super::config::PROCFS_MAX_FILE;
use super::error::{FsError, FsResult};
use super::types::{DirEntry, NodeKind, VolumeInfo};
use crate::ipc::ServiceEntry;
use crate::mm::heap::HeapStats;
use crate::sched::task::TaskInfo;

pub const FILES: &[&str] = &["tasks", "meminfo", "uptime", "services", "version", "mounts", "windows"];

pub const KERNEL_NAME: &str = "Basalt";
pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn render_tasks(tasks: &[TaskInfo]) -> String {
    let mut out = String::from("PID  STATE       PRIO  RING  NAME\n");
    for t in tasks {
        let _ = writeln!(
            out,
            "{:<4} {:<11} {:<5} {:<5} {}",
            t.pid.as_u32(),
            t.state.as_str(),
            t.priority,
            if t.is_user { 3 } else { 0 },
            t.name.as_str()
        );
    }
    out
}

pub fn render_meminfo(total_frames: usize, used_frames: usize, heap: HeapStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MemTotal:   {} kB", total_frames * 4);
    let _ = writeln!(out, "MemFree:    {} kB", total_frames.saturating_sub(used_frames) * 4);
    let _ = writeln!(out, "MemUsed:    {} kB", used_frames * 4);
    let _ = writeln!(out, "HeapTotal:  {} kB", heap.total / 1024);
    let _ = writeln!(out, "HeapUsed:   {} kB", heap.used / 1024);
    out
}

pub fn render_uptime(ticks: u64, hz: u32) -> String {
    let hz = hz.max(1) as u64;
    let mut out = String::new();
    let _ = writeln!(out, "{}.{:02} {}", ticks / hz, (ticks % hz) * 100 / hz, ticks);
    out
}

pub fn render_services(services: &[ServiceEntry]) -> String {
    let mut out = String::from("PID  SERVICE\n");
    for s in services {
        let _ = writeln!(out, "{:<4} {}", s.pid.as_u32(), s.name.as_str());
    }
    out
}

pub fn render_version() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {} (i686)", KERNEL_NAME, KERNEL_VERSION);
    out
}

pub fn render_mounts(mounts: &[(&str, VolumeInfo)]) -> String {
    let mut out = String::new();
    for (point, info) in mounts {
        let label = if info.label.is_empty() { "-" } else { info.label.as_str() };
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            point, info.fs_type, label, info.total_sectors, info.cluster_size
        );
    }
    out
}

pub fn render_windows(windows: &[crate::gui::WindowInfo]) -> String {
    let mut out = String::from("SLOT PID  DIRTY TITLE\n");
    for w in windows {
        let _ = writeln!(
            out,
            "{:<4} {:<4} {:<5} {}",
            w.slot,
            w.pid.as_u32(),
            if w.dirty { "yes" } else { "no" },
            w.title.as_str()
        );
    }
    out
}

/// Texto atual de `/proc/<name>`.
pub fn generate(name: &str) -> FsResult<String> {
    let mut text = match name {
        "tasks" => render_tasks(&crate::sched::task_get_all()),
        "meminfo" => {
            let (total, used) = crate::mm::pmm::stats();
            render_meminfo(total, used, crate::mm::heap::stats())
        }
        "uptime" => render_uptime(crate::drivers::timer::ticks(), crate::sched::config::TIMER_HZ),
        "services" => render_services(&crate::ipc::services()),
        "version" => render_version(),
        "mounts" => render_mounts(&super::vfs::mounts()),
        "windows" => render_windows(&crate::gui::windows()),
        _ => return Err(FsError::NotFound),
    };
    if text.len() > PROCFS_MAX_FILE {
        let mut end = PROCFS_MAX_FILE;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    Ok(text)
}

/// Copia a partir de `offset`; devolve 0 no fim do arquivo.
pub fn read_at(name: &str, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
    let text = generate(name)?;
    Ok(copy_from(text.as_bytes(), offset, buf))
}

fn copy_from(src: &[u8], offset: usize, buf: &mut [u8]) -> usize {
    let tail = src.get(offset..).unwrap_or(&[]);
    let n = tail.len().min(buf.len());
    buf[..n].copy_from_slice(&tail[..n]);
    n
}

pub fn exists(name: &str) -> bool {
    FILES.contains(&name)
}

pub fn list() -> Vec<DirEntry> {
    FILES
        .iter()
        .map(|name| DirEntry {
            name: String::from(*name),
            kind: NodeKind::File,
            size: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klib::string::FixedName;
    use crate::sched::task::TaskState;
    use crate::sys::Pid;

    #[test]
    fn tasks_table_has_one_line_per_task() {
        let tasks = [
            TaskInfo {
                pid: Pid(1),
                name: FixedName::new("idle"),
                state: TaskState::Ready,
                priority: 255,
                is_user: false,
                exit_code: None,
            },
            TaskInfo {
                pid: Pid(7),
                name: FixedName::new("console"),
                state: TaskState::Ready,
                priority: 1,
                is_user: true,
                exit_code: None,
            },
        ];
        let text = render_tasks(&tasks);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1 "));
        assert!(lines[2].ends_with("console"));
        assert!(lines[2].contains(" 3 "));
    }

    #[test]
    fn meminfo_in_kib() {
        let heap = HeapStats {
            used: 8192,
            free: 8192,
            total: 16384,
        };
        let text = render_meminfo(100, 40, heap);
        assert!(text.contains("MemTotal:   400 kB"));
        assert!(text.contains("MemFree:    240 kB"));
        assert!(text.contains("HeapUsed:   8 kB"));
    }

    #[test]
    fn uptime_has_hundredths() {
        assert_eq!(render_uptime(1234, 100), "12.34 1234\n");
        assert_eq!(render_uptime(5, 100), "0.05 5\n");
    }

    #[test]
    fn mounts_show_label_or_dash() {
        let mounts = [
            (
                "/disk",
                VolumeInfo {
                    fs_type: "FAT16",
                    label: String::from("TEST"),
                    total_sectors: 65536,
                    cluster_size: 2048,
                },
            ),
            (
                "/disk2",
                VolumeInfo {
                    fs_type: "NTFS",
                    label: String::new(),
                    total_sectors: 16383,
                    cluster_size: 4096,
                },
            ),
        ];
        let text = render_mounts(&mounts);
        assert_eq!(text, "/disk FAT16 TEST 65536 2048\n/disk2 NTFS - 16383 4096\n");
    }

    #[test]
    fn read_past_end_returns_zero() {
        let src = b"version\n";
        let mut buf = [0u8; 4];
        assert_eq!(copy_from(src, 0, &mut buf), 4);
        assert_eq!(copy_from(src, 6, &mut buf), 2);
        assert_eq!(copy_from(src, 8, &mut buf), 0);
        assert_eq!(copy_from(src, 100, &mut buf), 0);
    }

    #[test]
    fn version_and_listing() {
        assert!(render_version().starts_with("Basalt "));
        assert!(exists("uptime"));
        assert!(!exists("cpuinfo"));
        assert_eq!(list().len(), FILES.len());
        assert_eq!(generate("nope").unwrap_err(), FsError::NotFound);
    }
}
