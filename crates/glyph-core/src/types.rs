//! Request and result types shared by the dispatcher, the test runner, and
//! the outer surfaces.

use serde::{Deserialize, Serialize};

use crate::language::LanguageId;

/// One invocation of user code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub language: LanguageId,
    pub code: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_arg: Option<String>,
}

impl ExecutionRequest {
    pub fn new(
        language: LanguageId,
        code: impl Into<String>,
        input: impl Into<String>,
        left_arg: Option<String>,
    ) -> Self {
        Self {
            language,
            code: code.into(),
            input: input.into(),
            left_arg,
        }
    }
}

/// Canonical outcome of one invocation. A failure's reason is its `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// A test case supplied by the problem catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected: String,
    #[serde(default, alias = "left_arg", skip_serializing_if = "Option::is_none")]
    pub left_arg: Option<String>,
}

impl TestCase {
    /// Human-readable form of the call: `LEFT f INPUT` or `f INPUT`.
    pub fn display_input(&self) -> String {
        match self.left_arg.as_deref() {
            Some(left) if !left.is_empty() => format!("{left} f {}", self.input),
            _ => format!("f {}", self.input),
        }
    }
}

/// Per-case verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Display form of the call, see [`TestCase::display_input`].
    pub input: String,
    pub expected: String,
    /// Raw (untrimmed) interpreter output.
    pub actual: String,
    pub passed: bool,
}

/// Aggregate of a test run, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub results: Vec<TestResult>,
    pub all_passed: bool,
    pub passed_count: usize,
    pub total_count: usize,
}

impl TestReport {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let total_count = results.len();
        Self {
            all_passed: passed_count == total_count,
            passed_count,
            total_count,
            results,
        }
    }
}

/// Outcome of a formatting request; failures echo the original code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResult {
    pub success: bool,
    pub formatted: String,
}

impl FormatResult {
    pub fn unchanged(code: &str) -> Self {
        Self {
            success: false,
            formatted: code.to_owned(),
        }
    }
}
