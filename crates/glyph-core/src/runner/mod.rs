//! Test runner and comparator.
//!
//! Cases run one at a time, in input order, through a single adapter. A
//! failing case never stops the run; every case yields a [`TestResult`].

pub mod cases;

use tracing::debug;

use crate::adapter::Adapter;
use crate::error::HarnessError;
use crate::types::{ExecutionResult, TestCase, TestReport, TestResult};

pub use cases::{CaseFileError, load_cases, parse_cases};

/// Progress of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Pending,
    Executing,
    Passed,
    Failed,
}

/// Whether `result` satisfies `expected`. Only leading and trailing
/// whitespace is ignored.
pub fn compare(result: &ExecutionResult, expected: &str) -> bool {
    result.success && result.output.trim() == expected.trim()
}

fn verdict(case: &TestCase, result: ExecutionResult) -> TestResult {
    let passed = compare(&result, &case.expected);
    TestResult {
        input: case.display_input(),
        expected: case.expected.clone(),
        actual: result.output,
        passed,
    }
}

/// Run every case through `adapter`.
///
/// When `available` is false nothing is executed: each case fails with the
/// interpreter-unavailable message.
pub async fn run_tests(
    adapter: &dyn Adapter,
    available: bool,
    code: &str,
    cases: &[TestCase],
) -> TestReport {
    let language = adapter.language();
    let mut results = Vec::with_capacity(cases.len());
    for (index, case) in cases.iter().enumerate() {
        debug!(%language, index, state = ?CaseState::Pending, "test case");
        let result = if available {
            debug!(%language, index, state = ?CaseState::Executing, "test case");
            let left = case.left_arg.as_deref().filter(|l| !l.is_empty());
            adapter.invoke(code, &case.input, left).await
        } else {
            HarnessError::unavailable(language).into()
        };
        let result = verdict(case, result);
        let state = if result.passed {
            CaseState::Passed
        } else {
            CaseState::Failed
        };
        debug!(%language, index, ?state, "test case");
        results.push(result);
    }
    TestReport::from_results(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
