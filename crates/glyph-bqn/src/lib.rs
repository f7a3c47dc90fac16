//! Embedded evaluator for the core of BQN.
//!
//! Covers the subset short puzzle solutions use: literals, lists and
//! strands, primitive functions, the common modifiers, trains, blocks with
//! `𝕩`/`𝕨`/`𝕊`, headers and guards, and assignment. Results are rendered with `•Fmt`
//! conventions so they compare against text expected from the reference
//! implementation.
//!
//! ```
//! let engine = glyph_bqn::Engine::new();
//! assert_eq!(engine.evaluate("{1+↕ 𝕩} 3").unwrap(), "⟨ 1 2 3 ⟩");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod format;
pub mod lexer;
pub mod parser;
pub mod primitives;
pub mod value;

pub use error::{BqnError, Result};
pub use format::format_value;

use tracing::debug;

use crate::eval::Interpreter;
use crate::value::Scope;

/// Stack given to the evaluation thread; deep block recursion needs more
/// than a default thread.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Entry point for evaluating whole programs.
///
/// Values are reference counted and not `Send`, so each evaluation runs to
/// completion on its own scoped thread and only the rendered text leaves it.
#[derive(Debug, Clone)]
pub struct Engine {
    stack_size: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn with_stack_size(stack_size: usize) -> Self {
        Self { stack_size }
    }

    /// Evaluate `source` in a fresh top-level scope and format the result.
    pub fn evaluate(&self, source: &str) -> Result<String> {
        std::thread::scope(|scope| {
            let handle = std::thread::Builder::new()
                .name("bqn-eval".into())
                .stack_size(self.stack_size)
                .spawn_scoped(scope, || evaluate_here(source))
                .map_err(|e| BqnError::Thread(e.to_string()))?;
            handle
                .join()
                .map_err(|_| BqnError::Thread("evaluation panicked".into()))?
        })
    }
}

/// Evaluate on the calling thread.
pub fn evaluate_here(source: &str) -> Result<String> {
    let program = parser::parse(source)?;
    debug!(statements = program.len(), "evaluating BQN program");
    let root = Scope::root();
    let mut interpreter = Interpreter::new();
    let value = interpreter.run(&program, &root)?;
    Ok(format_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<String> {
        Engine::new().evaluate(source)
    }

    #[test]
    fn iota_scenario() {
        assert_eq!(run("{1+↕ 𝕩} 3").unwrap(), "⟨ 1 2 3 ⟩");
    }

    #[test]
    fn dyadic_rotate_scenario() {
        assert_eq!(
            run("2 {𝕨 ⌽ 𝕩} 1‿2‿3‿4‿5").unwrap(),
            "⟨ 3 4 5 1 2 ⟩"
        );
    }

    #[test]
    fn string_results() {
        assert_eq!(run("{⌽𝕩} \"abc\"").unwrap(), "\"cba\"");
    }

    #[test]
    fn table_result() {
        assert_eq!(run("{𝕩‿3⥊↕6} 2").unwrap(), "┌─\n╵ 0 1 2\n  3 4 5\n        ┘");
    }

    #[test]
    fn errors_carry_the_glyph() {
        let err = run("{1‿2 + 𝕩} 1‿2‿3").unwrap_err();
        assert!(err.to_string().starts_with("+: "), "got {err}");
    }

    #[test]
    fn runaway_recursion_becomes_an_error() {
        assert_eq!(
            run("{𝕊 𝕩} 1").unwrap_err(),
            BqnError::DepthExceeded(eval::MAX_DEPTH)
        );
    }

    #[test]
    fn character_table_result() {
        assert_eq!(run("2‿2⥊\"abcd\"").unwrap(), "┌─\n╵\"ab\n  cd\"\n     ┘");
    }

    #[test]
    fn nested_unit_result() {
        assert_eq!(
            run("< < 1").unwrap(),
            "┌·\n· ┌·\n  · 1\n      ┘\n        ┘"
        );
    }

    #[test]
    fn guarded_recursion_scenario() {
        assert_eq!(run("{𝕩<1 ? 0 ; 𝕩 + 𝕊 𝕩-1} 30").unwrap(), "465");
    }

    #[test]
    fn oversized_array_becomes_an_error() {
        assert_eq!(run("↕1e9").unwrap_err(), BqnError::TooLarge(1_000_000_000));
    }

    #[test]
    fn each_evaluation_starts_fresh() {
        let engine = Engine::new();
        assert_eq!(engine.evaluate("a ← 1 ⋄ a").unwrap(), "1");
        assert_eq!(engine.evaluate("a ← 2 ⋄ a").unwrap(), "2");
    }
}
