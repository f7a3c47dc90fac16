//! Execution and verification harness for array-language snippets.
//!
//! A [`Dispatcher`] routes each request to the [`Adapter`] for its
//! language. BQN runs in-process; the other languages run as external
//! interpreters found by the [`Prober`] and supervised by
//! [`process::run`]. The test runner compares trimmed output against the
//! expected text and aggregates a [`TestReport`].

pub mod adapter;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod language;
pub mod languages;
pub mod normalize;
pub mod probe;
pub mod process;
pub mod runner;
pub mod types;

pub use adapter::{Adapter, AdapterRegistry};
pub use config::{HarnessConfig, LanguageOverride};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, HarnessError};
pub use language::{LanguageId, UnknownLanguage};
pub use probe::Prober;
pub use types::{
    ExecutionRequest, ExecutionResult, FormatResult, TestCase, TestReport, TestResult,
};
