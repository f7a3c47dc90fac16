//! J, fed a script on stdin through jconsole.

use std::sync::Arc;

use async_trait::async_trait;

use super::external::{Captured, External};
use super::trait_def::Adapter;
use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::normalize::{self, FilterSet};
use crate::probe::Prober;
use crate::types::ExecutionResult;

/// Last line of every script; jconsole echoes it back.
const EXIT: &str = "exit 0";

#[derive(Debug, Clone)]
pub struct JAdapter {
    external: External,
}

impl JAdapter {
    pub fn new(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            external: External::new(LanguageId::J, config, prober),
        }
    }
}

pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    match left {
        Some(left) => format!("{left} ({code}) {input}\n{EXIT}\n"),
        None => format!("({code}) {input}\n{EXIT}\n"),
    }
}

/// jconsole exits 0 even on errors; any stderr text means failure.
pub fn extract(filters: &FilterSet, captured: &Captured) -> ExecutionResult {
    let stderr = normalize::strip_ansi(&filters.stderr.apply(&captured.stderr));
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return ExecutionResult::failed(stderr);
    }
    let stdout = normalize::strip_ansi(&filters.stdout.apply(&captured.stdout));
    ExecutionResult::ok(normalize::strip_trailing_echo(stdout.trim(), EXIT).trim())
}

#[async_trait]
impl Adapter for JAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::J
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
