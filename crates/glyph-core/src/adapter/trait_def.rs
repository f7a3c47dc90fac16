//! The `Adapter` trait, one implementation per supported language.

use async_trait::async_trait;

use crate::language::LanguageId;
use crate::types::{ExecutionResult, FormatResult};

/// Runs one snippet of user code in one language.
///
/// An adapter owns two concerns: wrapping `code` so it is applied to
/// `input` (and `left`, when dyadic) in the language's own syntax, and
/// turning the interpreter's raw output into an [`ExecutionResult`]. How
/// the interpreter is reached, in-process or as a child process, is the
/// adapter's business.
///
/// # Object Safety
///
/// This trait is object-safe so adapters can be stored as
/// `Box<dyn Adapter>` in the [`super::AdapterRegistry`].
#[async_trait]
pub trait Adapter: Send + Sync {
    fn language(&self) -> LanguageId;

    /// Program text that applies `code` to the operands.
    fn wrap(&self, code: &str, input: &str, left: Option<&str>) -> String;

    /// Run `code` against `input`. Never fails: every error is folded into
    /// an unsuccessful result.
    async fn invoke(&self, code: &str, input: &str, left: Option<&str>) -> ExecutionResult;

    /// Pretty-print `code` with the language's canonical formatter.
    async fn format(&self, code: &str) -> FormatResult {
        FormatResult::unchanged(code)
    }
}

// Compile-time assertion: Adapter must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Adapter) {}
};
