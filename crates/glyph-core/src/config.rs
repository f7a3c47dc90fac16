//! Harness configuration.
//!
//! Defaults match the reference deployment (10 s per test execution, 2 s
//! per interpreter self-check, 5 s per formatting run). Environment
//! variables override the defaults; callers such as the CLI layer their own
//! config file and flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::language::LanguageId;
use crate::languages::{self, Toolchain};
use crate::normalize::FilterSet;

pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2_000);
pub const DEFAULT_FORMAT_TIMEOUT: Duration = Duration::from_millis(5_000);

pub const EXEC_TIMEOUT_ENV: &str = "GLYPH_EXEC_TIMEOUT_MS";
pub const PROBE_TIMEOUT_ENV: &str = "GLYPH_PROBE_TIMEOUT_MS";
pub const FORMAT_TIMEOUT_ENV: &str = "GLYPH_FORMAT_TIMEOUT_MS";

/// Per-language adjustments to the built-in toolchain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageOverride {
    /// Use this executable without probing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Replacement candidate list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    /// Replacement noise filters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterSet>,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub exec_timeout: Duration,
    /// When set, replaces every per-language self-check limit.
    pub probe_timeout: Option<Duration>,
    pub format_timeout: Duration,
    /// Directory for temporary program files.
    pub temp_dir: PathBuf,
    pub languages: BTreeMap<LanguageId, LanguageOverride>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            probe_timeout: None,
            format_timeout: DEFAULT_FORMAT_TIMEOUT,
            temp_dir: std::env::temp_dir(),
            languages: BTreeMap::new(),
        }
    }
}

fn parse_millis(name: &str, raw: &str) -> Result<Duration> {
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a whole number of milliseconds, got {raw:?}"))?;
    Ok(Duration::from_millis(ms))
}

impl HarnessConfig {
    /// Defaults overridden by `GLYPH_*_TIMEOUT_MS` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(EXEC_TIMEOUT_ENV) {
            self.exec_timeout = parse_millis(EXEC_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(PROBE_TIMEOUT_ENV) {
            self.probe_timeout = Some(parse_millis(PROBE_TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = lookup(FORMAT_TIMEOUT_ENV) {
            self.format_timeout = parse_millis(FORMAT_TIMEOUT_ENV, &raw)?;
        }
        Ok(self)
    }

    pub fn with_override(mut self, language: LanguageId, over: LanguageOverride) -> Self {
        self.languages.insert(language, over);
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Built-in toolchain data for `language` with any override applied.
    pub fn toolchain(&self, language: LanguageId) -> Option<Toolchain> {
        let builtin = languages::builtin(language)?;
        Some(match self.languages.get(&language) {
            Some(over) => builtin.with_override(over),
            None => builtin.clone(),
        })
    }

    /// Executable configured explicitly for `language`, if any.
    pub fn explicit_path(&self, language: LanguageId) -> Option<&Path> {
        self.languages.get(&language)?.path.as_deref()
    }

    pub fn probe_timeout_for(&self, toolchain: &Toolchain) -> Duration {
        self.probe_timeout
            .or_else(|| toolchain.probe_timeout())
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
