//! Framework de self-test do kernel (feature `self_test`).
//!
//! Suites rodam no boot, em ring 0, para leis que só valem no hardware
//! real (paginação, PMM sobre a RAM de verdade, timer). A lógica pura é
//! coberta pelos testes unitários do host.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa a suite e devolve `(passed, failed, skipped)`.
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Suite: ");
    crate::kinfo!(name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                crate::kok!(test.name);
                passed += 1;
            }
            TestResult::Failed => {
                crate::kfail!(test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!("[SKIP] ");
                crate::kwarn!(test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!("Passaram: ", passed);
    if failed > 0 {
        crate::kerror!("Falharam: ", failed);
    }
    (passed, failed, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> TestResult {
        TestResult::Passed
    }
    fn bad() -> TestResult {
        TestResult::Failed
    }
    fn skip() -> TestResult {
        TestResult::Skipped
    }

    #[test]
    fn suite_counts_results() {
        let cases = [
            TestCase::new("ok", ok),
            TestCase::new("bad", bad),
            TestCase::new("skip", skip),
            TestCase::new("ok2", ok),
        ];
        assert_eq!(run_test_suite("demo", &cases), (2, 1, 1));
    }
}
