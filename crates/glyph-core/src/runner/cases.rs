//! Test-case files.
//!
//! Two formats are accepted: a JSON array of cases, as the problem catalog
//! serves them, or TOML with one `[[case]]` table per case:
//!
//! ```toml
//! [[case]]
//! input = "5"
//! left_arg = "2"
//! expected = "3 4 5 1 2"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::types::TestCase;

/// Errors that can occur while reading a case file.
#[derive(Debug, Error)]
pub enum CaseFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("case file contains no test cases")]
    NoCases,
}

#[derive(Debug, Deserialize)]
struct CaseToml {
    #[serde(default, rename = "case")]
    cases: Vec<TestCase>,
}

/// Parse case-file text. Text whose first non-blank character is `[` and
/// which parses as JSON is JSON; anything else is TOML.
pub fn parse_cases(content: &str) -> Result<Vec<TestCase>, CaseFileError> {
    let cases = if content.trim_start().starts_with('[') {
        match serde_json::from_str::<Vec<TestCase>>(content) {
            Ok(cases) => cases,
            // `[[case]]` also starts with a bracket.
            Err(json_err) => match toml::from_str::<CaseToml>(content) {
                Ok(doc) => doc.cases,
                Err(_) => return Err(json_err.into()),
            },
        }
    } else {
        toml::from_str::<CaseToml>(content)?.cases
    };
    if cases.is_empty() {
        return Err(CaseFileError::NoCases);
    }
    Ok(cases)
}

pub fn load_cases(path: &Path) -> Result<Vec<TestCase>, CaseFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| CaseFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_cases(&content)
}
