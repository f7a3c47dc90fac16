//! Error types for the harness.
//!
//! [`HarnessError`] never escapes an adapter: it is folded into a failed
//! [`ExecutionResult`] whose `output` is the error's display text. Only
//! [`DispatchError`] propagates, and only on a misconfigured registry.

use thiserror::Error;

use crate::language::LanguageId;
use crate::types::ExecutionResult;

/// Why a single invocation failed before producing interpreter output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// No candidate executable passed its self-check.
    #[error("{interpreter} interpreter not available on this server")]
    InterpreterUnavailable { interpreter: String },

    /// The wall-clock limit elapsed; partial output is discarded.
    #[error("Execution timed out")]
    Timeout,

    /// The interpreter reported an error; carries its normalized message.
    #[error("{0}")]
    Runtime(String),

    /// The process could not be started (OS error text).
    #[error("{0}")]
    Spawn(String),
}

impl HarnessError {
    pub fn unavailable(language: LanguageId) -> Self {
        Self::InterpreterUnavailable {
            interpreter: language.display_name().to_owned(),
        }
    }
}

impl From<HarnessError> for ExecutionResult {
    fn from(err: HarnessError) -> Self {
        ExecutionResult::failed(err.to_string())
    }
}

/// Errors raised by the [`crate::Dispatcher`] itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no adapter registered for language {0}")]
    Unregistered(LanguageId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_the_interpreter() {
        let err = HarnessError::unavailable(LanguageId::Apl);
        assert_eq!(
            err.to_string(),
            "Dyalog APL interpreter not available on this server"
        );
    }

    #[test]
    fn errors_become_failed_results() {
        let result: ExecutionResult = HarnessError::Timeout.into();
        assert!(!result.success);
        assert_eq!(result.output, "Execution timed out");
    }
}
