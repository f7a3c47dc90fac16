//! The closed set of supported languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A language the harness can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Bqn,
    Apl,
    J,
    Uiua,
    Kap,
    Tinyapl,
}

/// Returned when a language identifier is not one of [`LanguageId::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl LanguageId {
    pub const ALL: [LanguageId; 6] = [
        LanguageId::Bqn,
        LanguageId::Apl,
        LanguageId::J,
        LanguageId::Uiua,
        LanguageId::Kap,
        LanguageId::Tinyapl,
    ];

    /// Wire identifier (`bqn`, `apl`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageId::Bqn => "bqn",
            LanguageId::Apl => "apl",
            LanguageId::J => "j",
            LanguageId::Uiua => "uiua",
            LanguageId::Kap => "kap",
            LanguageId::Tinyapl => "tinyapl",
        }
    }

    /// Name used in user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            LanguageId::Bqn => "BQN",
            LanguageId::Apl => "Dyalog APL",
            LanguageId::J => "J",
            LanguageId::Uiua => "Uiua",
            LanguageId::Kap => "Kap",
            LanguageId::Tinyapl => "TinyAPL",
        }
    }

    /// Position in [`LanguageId::ALL`].
    pub const fn index(self) -> usize {
        match self {
            LanguageId::Bqn => 0,
            LanguageId::Apl => 1,
            LanguageId::J => 2,
            LanguageId::Uiua => 3,
            LanguageId::Kap => 4,
            LanguageId::Tinyapl => 5,
        }
    }

    /// Whether the language runs in-process rather than through an
    /// external interpreter.
    pub fn is_embedded(self) -> bool {
        matches!(self, LanguageId::Bqn)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownLanguage(s.to_owned()))
    }
}
