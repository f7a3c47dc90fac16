//! `glyph run` and `glyph test` commands.

use std::path::Path;

use anyhow::{Context, Result};

use glyph_core::runner::load_cases;
use glyph_core::{Dispatcher, ExecutionRequest, LanguageId, TestReport};

/// Run one invocation and print its output. Returns whether it succeeded.
pub async fn run_single(
    dispatcher: &Dispatcher,
    language: LanguageId,
    code: &str,
    input: &str,
    left: Option<String>,
    json: bool,
) -> Result<bool> {
    let request = ExecutionRequest::new(language, code, input, left);
    let result = dispatcher.run_single(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.success {
        println!("{}", result.output);
    } else {
        eprintln!("error: {}", result.output);
    }
    Ok(result.success)
}

/// Run a case file and print one line per case. Returns whether every case
/// passed.
pub async fn run_tests(
    dispatcher: &Dispatcher,
    language: LanguageId,
    code: &str,
    cases_path: &str,
    json: bool,
) -> Result<bool> {
    let cases = load_cases(Path::new(cases_path))
        .with_context(|| format!("failed to load test cases from {cases_path}"))?;
    let report = dispatcher.run_tests(language, code, &cases).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(report.all_passed)
}

fn render_report(report: &TestReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        let icon = if result.passed { "+" } else { "!" };
        out.push_str(&format!("  [{icon}] {}\n", result.input));
        if !result.passed {
            out.push_str(&format!("      expected: {}\n", result.expected));
            out.push_str(&format!("      actual:   {}\n", result.actual));
        }
    }
    out.push_str(&format!(
        "{}/{} passed\n",
        report.passed_count, report.total_count
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_core::{HarnessConfig, TestResult};

    #[test]
    fn report_lists_failures_with_both_sides() {
        let report = TestReport::from_results(vec![
            TestResult {
                input: "f 3".into(),
                expected: "⟨ 1 2 3 ⟩".into(),
                actual: "⟨ 1 2 3 ⟩".into(),
                passed: true,
            },
            TestResult {
                input: "2 f 5".into(),
                expected: "⟨ 3 4 5 1 2 ⟩".into(),
                actual: "⟨ 1 2 3 4 5 ⟩".into(),
                passed: false,
            },
        ]);
        assert_eq!(
            render_report(&report),
            "  [+] f 3\n  [!] 2 f 5\n      expected: ⟨ 3 4 5 1 2 ⟩\n      actual:   ⟨ 1 2 3 4 5 ⟩\n1/2 passed\n"
        );
    }

    #[tokio::test]
    async fn case_file_runs_on_the_embedded_engine() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cases.toml");
        std::fs::write(
            &path,
            "[[case]]\ninput = \"3\"\nexpected = \"⟨ 1 2 3 ⟩\"\n\n[[case]]\ninput = \"1\"\nexpected = \"⟨ 1 ⟩\"\n",
        )
        .unwrap();

        let dispatcher = Dispatcher::new(HarnessConfig::default());
        let passed = run_tests(
            &dispatcher,
            LanguageId::Bqn,
            "1+↕",
            path.to_str().unwrap(),
            true,
        )
        .await
        .unwrap();
        assert!(passed);
    }

    #[tokio::test]
    async fn missing_case_file_is_an_error() {
        let dispatcher = Dispatcher::new(HarnessConfig::default());
        let err = run_tests(&dispatcher, LanguageId::Bqn, "1+↕", "/nonexistent/cases.json", false)
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("/nonexistent/cases.json"),
            "unexpected error: {err}"
        );
    }
}
