//! The single entry point into the harness.
//!
//! A [`Dispatcher`] is built once per process and shared (it is cheap to
//! clone). It selects the adapter for a request's language and never
//! special-cases behavior by language.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::adapter::{Adapter, AdapterRegistry};
use crate::config::HarnessConfig;
use crate::error::DispatchError;
use crate::language::LanguageId;
use crate::probe::Prober;
use crate::runner;
use crate::types::{
    ExecutionRequest, ExecutionResult, FormatResult, TestCase, TestReport, TestResult,
};

#[derive(Debug)]
struct Inner {
    config: Arc<HarnessConfig>,
    prober: Arc<Prober>,
    registry: AdapterRegistry,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// A dispatcher with an adapter for every language.
    pub fn new(config: HarnessConfig) -> Self {
        let config = Arc::new(config);
        let prober = Arc::new(Prober::new(config.clone()));
        let registry = AdapterRegistry::with_defaults(config.clone(), prober.clone());
        Self::with_registry(config, prober, registry)
    }

    /// A dispatcher over a caller-supplied registry. `prober` should be the
    /// one the registry's adapters resolve through.
    pub fn with_registry(
        config: Arc<HarnessConfig>,
        prober: Arc<Prober>,
        registry: AdapterRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                prober,
                registry,
            }),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.inner.config
    }

    fn adapter(&self, language: LanguageId) -> Result<&dyn Adapter, DispatchError> {
        self.inner
            .registry
            .get(language)
            .ok_or(DispatchError::Unregistered(language))
    }

    /// Run one request, or report that no adapter handles its language.
    pub async fn try_run(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, DispatchError> {
        let adapter = self.adapter(request.language)?;
        let left = request.left_arg.as_deref().filter(|l| !l.is_empty());
        debug!(language = %request.language, dyadic = left.is_some(), "dispatching");
        Ok(adapter.invoke(&request.code, &request.input, left).await)
    }

    /// Run one request. An unregistered language is reported as a failed
    /// result.
    pub async fn run_single(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.try_run(request)
            .await
            .unwrap_or_else(|e| ExecutionResult::failed(e.to_string()))
    }

    /// Run `code` against every case, sequentially and in order.
    pub async fn run_tests(
        &self,
        language: LanguageId,
        code: &str,
        cases: &[TestCase],
    ) -> TestReport {
        let Ok(adapter) = self.adapter(language) else {
            let results = cases
                .iter()
                .map(|case| TestResult {
                    input: case.display_input(),
                    expected: case.expected.clone(),
                    actual: DispatchError::Unregistered(language).to_string(),
                    passed: false,
                })
                .collect();
            return TestReport::from_results(results);
        };
        let available = self.inner.prober.probe(language).await;
        runner::run_tests(adapter, available, code, cases).await
    }

    /// Probe every registered language concurrently.
    pub async fn available_languages(&self) -> BTreeMap<LanguageId, bool> {
        let mut probes = JoinSet::new();
        for language in self.inner.registry.list() {
            let prober = self.inner.prober.clone();
            probes.spawn(async move { (language, prober.probe(language).await) });
        }
        let mut availability = BTreeMap::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((language, available)) => {
                    availability.insert(language, available);
                }
                Err(e) => warn!(error = %e, "availability probe task failed"),
            }
        }
        availability
    }

    /// Executable resolved for `language`, probing if necessary.
    pub async fn resolve(&self, language: LanguageId) -> Option<PathBuf> {
        self.inner.prober.resolve(language).await
    }

    /// Canonical formatting of `code`; the code is echoed back unchanged
    /// when the language has no formatter or formatting fails.
    pub async fn format_code(&self, language: LanguageId, code: &str) -> FormatResult {
        match self.adapter(language) {
            Ok(adapter) => adapter.format(code).await,
            Err(_) => FormatResult::unchanged(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Dispatcher {
        let config = Arc::new(HarnessConfig::default());
        let prober = Arc::new(Prober::new(config.clone()));
        Dispatcher::with_registry(config, prober, AdapterRegistry::new())
    }

    #[tokio::test]
    async fn unregistered_language_is_a_dispatch_error() {
        let request = ExecutionRequest::new(LanguageId::J, "+/", "1 2 3", None);
        let dispatcher = empty();
        assert_eq!(
            dispatcher.try_run(&request).await,
            Err(DispatchError::Unregistered(LanguageId::J))
        );
        let result = dispatcher.run_single(&request).await;
        assert!(!result.success);
        assert_eq!(result.output, "no adapter registered for language j");
    }

    #[tokio::test]
    async fn unregistered_language_fails_every_case() {
        let cases = [TestCase {
            input: "1".into(),
            expected: "1".into(),
            left_arg: None,
        }];
        let report = empty().run_tests(LanguageId::Kap, "⊢", &cases).await;
        assert_eq!(report.total_count, 1);
        assert!(!report.all_passed);
    }

    #[tokio::test]
    async fn embedded_language_is_always_listed_available() {
        let availability = Dispatcher::new(HarnessConfig::default())
            .available_languages()
            .await;
        assert_eq!(availability.len(), LanguageId::ALL.len());
        assert_eq!(availability.get(&LanguageId::Bqn), Some(&true));
    }

    #[tokio::test]
    async fn format_without_formatter_echoes_code() {
        let formatted = Dispatcher::new(HarnessConfig::default())
            .format_code(LanguageId::Bqn, "1+↕")
            .await;
        assert_eq!(formatted, FormatResult::unchanged("1+↕"));
    }
}
