//! # Self-tests do scheduler (feature `self_test`)
//!
//! Rodam no boot com a idle instalada e o PIT programado. As interrupções
//! são ligadas só durante cada teste.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::drivers::timer;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::mm::config::USER_IMAGE_BASE;
use crate::sched::config::{PRIORITY_LEVELS, PRIORITY_NORMAL};
use crate::sched::task::TaskState;

pub const SCHED_TESTS: &[TestCase] = &[
    TestCase::new("timer_ticks_advance", test_timer_ticks),
    TestCase::new("kernel_task_runs_and_exits", test_kernel_task_runs),
    TestCase::new("sleep_waits_deadline", test_sleep_deadline),
    TestCase::new("user_task_killed_before_running", test_user_task_killed),
];

/// Devolve o total de falhas.
pub fn run_sched_tests() -> usize {
    run_test_suite("Scheduler", SCHED_TESTS).1
}

/// Liga IRQs durante `f` e restaura o estado anterior.
fn with_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let was = Cpu::are_interrupts_enabled();
    Cpu::enable_interrupts();
    let result = f();
    if !was {
        Cpu::disable_interrupts();
    }
    result
}

fn test_timer_ticks() -> TestResult {
    with_interrupts(|| {
        let start = timer::ticks();
        for _ in 0..1_000 {
            if timer::ticks() >= start + 2 {
                return TestResult::Passed;
            }
            Cpu::halt();
        }
        TestResult::Failed
    })
}

static WORKER_HITS: AtomicU32 = AtomicU32::new(0);

extern "C" fn worker() {
    WORKER_HITS.fetch_add(1, Ordering::SeqCst);
}

/// Uma task de kernel recebe CPU no `yield`, volta do `entry` pelo
/// trampolim e é recolhida por `task_wait`.
fn test_kernel_task_runs() -> TestResult {
    WORKER_HITS.store(0, Ordering::SeqCst);
    let pid = match super::task_create_kernel("selftest", worker, PRIORITY_NORMAL) {
        Ok(pid) => pid,
        Err(_) => return TestResult::Failed,
    };

    with_interrupts(|| {
        for _ in 0..100 {
            if WORKER_HITS.load(Ordering::SeqCst) > 0 {
                break;
            }
            super::task_yield();
        }
    });

    let state = super::task_get_by_pid(pid).map(|t| t.state);
    if WORKER_HITS.load(Ordering::SeqCst) != 1 || state != Some(TaskState::Terminated) {
        return TestResult::Failed;
    }
    match super::task_reap(pid) {
        Ok(0) => TestResult::Passed,
        _ => TestResult::Failed,
    }
}

fn test_sleep_deadline() -> TestResult {
    with_interrupts(|| {
        let start = timer::ticks();
        super::task_sleep(30);
        if timer::ticks() >= start + timer::ms_to_ticks(30) {
            TestResult::Passed
        } else {
            TestResult::Failed
        }
    })
}

/// Task de usuário criada e morta antes de ganhar CPU (IRQs desligadas):
/// o término registra -1 e o reaper devolve diretório e frames.
fn test_user_task_killed() -> TestResult {
    if super::task_spawn_user("selftest-u", USER_IMAGE_BASE, PRIORITY_LEVELS as u8, false).is_ok() {
        return TestResult::Failed;
    }
    let pid = match super::task_spawn_user("selftest-u", USER_IMAGE_BASE, PRIORITY_NORMAL, false) {
        Ok(pid) => pid,
        Err(_) => return TestResult::Failed,
    };
    if super::task_kill(pid).is_err() {
        return TestResult::Failed;
    }
    let state = super::task_get_by_pid(pid).map(|t| t.state);
    if state != Some(TaskState::Terminated) || super::task_kill(pid).is_ok() {
        return TestResult::Failed;
    }
    match super::task_reap(pid) {
        Ok(-1) => TestResult::Passed,
        _ => TestResult::Failed,
    }
}
