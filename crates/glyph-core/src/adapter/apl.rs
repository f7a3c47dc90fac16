//! Dyalog APL, fed a script on stdin.

use std::sync::Arc;

use async_trait::async_trait;

use super::external::{Captured, External};
use super::trait_def::Adapter;
use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::normalize::{self, FilterSet};
use crate::probe::Prober;
use crate::types::ExecutionResult;

/// Switches Dyalog to minimal boxed display before the expression runs.
const PREAMBLE: &str = "]boxing on -s=min";

#[derive(Debug, Clone)]
pub struct AplAdapter {
    external: External,
}

impl AplAdapter {
    pub fn new(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            external: External::new(LanguageId::Apl, config, prober),
        }
    }
}

/// Double the quotes in `code`; APL writes a literal quote as `''`.
pub fn escape(code: &str) -> String {
    code.replace('\'', "''")
}

pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    let code = escape(code);
    match left {
        Some(left) => format!("{PREAMBLE}\n⎕←{left} ({code}) {input}\n"),
        None => format!("{PREAMBLE}\n⎕←({code}) {input}\n"),
    }
}

/// Anything left on stderr after noise filtering is an APL error.
pub fn extract(filters: &FilterSet, captured: &Captured) -> ExecutionResult {
    let error = normalize::strip_ansi(&filters.stderr.apply(&captured.stderr));
    let error = error.trim();
    if !error.is_empty() {
        return ExecutionResult::failed(error);
    }
    let output = normalize::strip_ansi(&filters.stdout.apply(&captured.stdout));
    ExecutionResult::ok(output.trim())
}

#[async_trait]
impl Adapter for AplAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::Apl
    }

    fn wrap(&self, code: &str, input: &str, left: Option<&str>) -> String {
        wrap(code, input, left)
    }

    async fn invoke(&self, code: &str, input: &str, left: Option<&str>) -> ExecutionResult {
        match self.external.execute(&wrap(code, input, left)).await {
            Ok(captured) => extract(&self.external.filters(), &captured),
            Err(e) => e.into(),
        }
    }
}
