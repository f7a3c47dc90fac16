//! Kap, run from a temporary `.kap` file. Kap draws arrays in box frames,
//! which are flattened before comparison.

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
pub struct KapAdapter {
    external: External,
}

impl KapAdapter {
    pub fn new(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            external: External::new(LanguageId::Kap, config, prober),
        }
    }
}

pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    match left {
        Some(left) => format!("{left} ({code}) {input}\n"),
        None => format!("({code}) {input}\n"),
    }
}

pub fn extract(captured: &Captured) -> ExecutionResult {
    if captured.success() {
        let stdout = normalize::strip_ansi(&captured.stdout);
        return ExecutionResult::ok(normalize::decode_boxed(stdout.trim()));
    }
    let reason = if captured.stderr.trim().is_empty() {
        &captured.stdout
    } else {
        &captured.stderr
    };
    ExecutionResult::failed(normalize::strip_ansi(reason.trim()))
}

#[async_trait]
impl Adapter for KapAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::Kap
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
