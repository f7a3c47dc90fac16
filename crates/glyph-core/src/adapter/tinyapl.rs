//! TinyAPL, run from a temporary `.tinyapl` file.

use std::sync::Arc;

use async_trait::async_trait;

use super::external::{Captured, External};
use super::trait_def::Adapter;
use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::normalize;
use crate::probe::Prober;
use crate::types::ExecutionResult;

#[derive(Debug, Clone)]
pub struct TinyAplAdapter {
    external: External,
}

impl TinyAplAdapter {
    pub fn new(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            external: External::new(LanguageId::Tinyapl, config, prober),
        }
    }
}

pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    match left {
        Some(left) => format!("{left} ({code}) {input}\n"),
        None => format!("({code}) {input}\n"),
    }
}

/// Success needs a zero exit and a quiet stderr.
pub fn extract(captured: &Captured) -> ExecutionResult {
    let stderr = normalize::strip_ansi(captured.stderr.trim());
    if captured.success() && stderr.is_empty() {
        return ExecutionResult::ok(normalize::strip_ansi(captured.stdout.trim()));
    }
    if stderr.is_empty() {
        ExecutionResult::failed(normalize::strip_ansi(captured.stdout.trim()))
    } else {
        ExecutionResult::failed(stderr)
    }
}

#[async_trait]
impl Adapter for TinyAplAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::Tinyapl
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_like_apl_without_escaping() {
        assert_eq!(wrap("{⍵,'!'}", "'hi'", None), "({⍵,'!'}) 'hi'\n");
        assert_eq!(wrap("⌽", "⍳5", Some("2")), "2 (⌽) ⍳5\n");
    }

    #[test]
    fn stderr_with_exit_zero_is_failure() {
        let raw = Captured {
            exit_code: Some(0),
            stdout: "⟨1 2⟩\n".into(),
            stderr: "Domain error\n".into(),
        };
        assert_eq!(extract(&raw), ExecutionResult::failed("Domain error"));
    }

    #[test]
    fn clean_run_is_success() {
        let raw = Captured {
            exit_code: Some(0),
            stdout: "\x1b[0m6\n".into(),
            stderr: String::new(),
        };
        assert_eq!(extract(&raw), ExecutionResult::ok("6"));
    }
}
