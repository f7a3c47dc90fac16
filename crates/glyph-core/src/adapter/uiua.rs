//! Uiua, run from a temporary `.ua` file.
//!
//! Uiua is stack based, so operands are pushed before the code runs: the
//! input first, then the left argument, which ends up on top.

use std::sync::Arc;

use async_trait::async_trait;

use super::external::{Captured, External};
use super::trait_def::Adapter;
use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::normalize;
use crate::probe::Prober;
use crate::types::{ExecutionResult, FormatResult};

#[derive(Debug, Clone)]
pub struct UiuaAdapter {
    external: External,
}

impl UiuaAdapter {
    pub fn new(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            external: External::new(LanguageId::Uiua, config, prober),
        }
    }
}

pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    match left {
        Some(left) => format!("{input}\n{left}\n{code}"),
        None => format!("{input}\n{code}"),
    }
}

/// Values may be printed on either stream; the exit status decides.
pub fn extract(captured: &Captured) -> ExecutionResult {
    let combined = format!("{}{}", captured.stdout, captured.stderr);
    let output = normalize::strip_ansi(combined.trim());
    ExecutionResult {
        success: captured.success(),
        output,
    }
}

#[async_trait]
impl Adapter for UiuaAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::Uiua
    }

    fn wrap(&self, code: &str, input: &str, left: Option<&str>) -> String {
        wrap(code, input, left)
    }

    async fn invoke(&self, code: &str, input: &str, left: Option<&str>) -> ExecutionResult {
        match self.external.execute(&wrap(code, input, left)).await {
            Ok(captured) => extract(&captured),
            Err(e) => e.into(),
        }
    }

    async fn format(&self, code: &str) -> FormatResult {
        self.external.format(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_operands_before_the_code() {
        assert_eq!(wrap("+1⇡", "3", None), "3\n+1⇡");
        assert_eq!(wrap("↻", "[1 2 3 4 5]", Some("2")), "[1 2 3 4 5]\n2\n↻");
    }

    #[test]
    fn output_on_stderr_with_exit_zero_is_success() {
        let raw = Captured {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: "\x1b[32m[1 2 3]\x1b[0m\n".into(),
        };
        assert_eq!(extract(&raw), ExecutionResult::ok("[1 2 3]"));
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let raw = Captured {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "Error: Unknown identifier\n".into(),
        };
        assert_eq!(
            extract(&raw),
            ExecutionResult::failed("Error: Unknown identifier")
        );
    }
}
