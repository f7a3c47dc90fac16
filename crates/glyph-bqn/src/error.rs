//! Error type shared by every stage of the BQN engine.

use thiserror::Error;

/// Everything that can go wrong while lexing, parsing, or evaluating BQN.
///
/// The `Display` text is what the harness shows to the user, so messages
/// follow the reference interpreter's `glyph: message` convention where a
/// primitive is at fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BqnError {
    #[error("Unknown character at position {position}: {text:?}")]
    Lex { position: usize, text: String },

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("{glyph}: {message}")]
    Domain { glyph: char, message: String },

    #[error("{glyph}: {message}")]
    Length { glyph: char, message: String },

    #[error("{glyph}: {message}")]
    Rank { glyph: char, message: String },

    #[error("{glyph}: {message}")]
    Index { glyph: char, message: String },

    #[error("{0} is not supported by this interpreter")]
    Unsupported(String),

    #[error("Undefined identifier: {0}")]
    Undefined(String),

    #[error("Redefinition of {0}")]
    Redefinition(String),

    #[error("{0}")]
    Assertion(String),

    #[error("No block body matched the arguments")]
    NoMatchingBody,

    #[error("Stack overflow: call depth exceeded {0}")]
    DepthExceeded(usize),

    #[error("Execution step limit exceeded")]
    StepLimit,

    #[error("Array too large: {0} elements")]
    TooLarge(usize),

    #[error("Evaluation thread failed: {0}")]
    Thread(String),
}

impl BqnError {
    pub(crate) fn domain(glyph: char, message: impl Into<String>) -> Self {
        Self::Domain {
            glyph,
            message: message.into(),
        }
    }

    pub(crate) fn length(glyph: char, message: impl Into<String>) -> Self {
        Self::Length {
            glyph,
            message: message.into(),
        }
    }

    pub(crate) fn rank(glyph: char, message: impl Into<String>) -> Self {
        Self::Rank {
            glyph,
            message: message.into(),
        }
    }

    pub(crate) fn index(glyph: char, message: impl Into<String>) -> Self {
        Self::Index {
            glyph,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, BqnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_errors_are_prefixed_with_the_glyph() {
        let err = BqnError::domain('↕', "Argument must be a natural number");
        assert_eq!(err.to_string(), "↕: Argument must be a natural number");
    }

    #[test]
    fn unsupported_names_the_feature() {
        let err = BqnError::Unsupported("Primitive ⍉".into());
        assert_eq!(err.to_string(), "Primitive ⍉ is not supported by this interpreter");
    }
}
