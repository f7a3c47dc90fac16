//! BQN, evaluated in-process by `glyph-bqn`.

use std::sync::OnceLock;

use async_trait::async_trait;
use glyph_bqn::Engine;
use tracing::debug;

use super::trait_def::Adapter;
use crate::language::LanguageId;
use crate::types::ExecutionResult;

#[derive(Debug, Default)]
pub struct BqnAdapter {
    engine: OnceLock<Engine>,
}

impl BqnAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn engine(&self) -> Engine {
        self.engine.get_or_init(Engine::new).clone()
    }
}

/// `{CODE 𝕩} INPUT`, or `LEFT {𝕨 CODE 𝕩} INPUT` when dyadic.
pub fn wrap(code: &str, input: &str, left: Option<&str>) -> String {
    match left {
        Some(left) => format!("{left} {{𝕨 {code} 𝕩}} {input}"),
        None => format!("{{{code} 𝕩}} {input}"),
    }
}

#[async_trait]
impl Adapter for BqnAdapter {
    fn language(&self) -> LanguageId {
        LanguageId::Bqn
    }

    fn wrap(&self, code: &str, input: &str, left: Option<&str>) -> String {
        wrap(code, input, left)
    }

    async fn invoke(&self, code: &str, input: &str, left: Option<&str>) -> ExecutionResult {
        let source = wrap(code, input, left);
        let engine = self.engine();
        let evaluated = tokio::task::spawn_blocking(move || engine.evaluate(&source)).await;
        match evaluated {
            Ok(Ok(output)) => ExecutionResult::ok(output),
            Ok(Err(e)) => {
                debug!(error = %e, "bqn evaluation failed");
                ExecutionResult::failed(e.to_string())
            }
            Err(e) => ExecutionResult::failed(format!("evaluation task failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_monadic_and_dyadic_calls() {
        assert_eq!(wrap("1+↕", "3", None), "{1+↕ 𝕩} 3");
        assert_eq!(wrap("⌽", "1‿2‿3‿4‿5", Some("2")), "2 {𝕨 ⌽ 𝕩} 1‿2‿3‿4‿5");
    }

    #[tokio::test]
    async fn iota_runs_in_process() {
        let result = BqnAdapter::new().invoke("1+↕", "3", None).await;
        assert_eq!(result, ExecutionResult::ok("⟨ 1 2 3 ⟩"));
    }

    #[tokio::test]
    async fn dyadic_rotate() {
        let result = BqnAdapter::new().invoke("⌽", "1‿2‿3‿4‿5", Some("2")).await;
        assert_eq!(result, ExecutionResult::ok("⟨ 3 4 5 1 2 ⟩"));
    }

    #[tokio::test]
    async fn evaluation_errors_become_failed_results() {
        let result = BqnAdapter::new().invoke("1‿2+", "1‿2‿3", None).await;
        assert!(!result.success);
        assert!(result.output.starts_with("+: "), "got {}", result.output);
    }
}
