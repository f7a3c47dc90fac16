//! Discovery of installed interpreters.
//!
//! Each language has an ordered candidate list. A candidate is selected
//! when its self-check exits with status zero; the first success is cached
//! for the life of the [`Prober`]. Failures are not cached, so an
//! interpreter installed while the server runs is found on the next call.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::languages::Toolchain;
use crate::process::{self, ProcessSpec};

/// Expand a leading `~/` to the home directory.
pub fn expand_home(candidate: &str) -> PathBuf {
    match candidate.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(candidate)),
        None => PathBuf::from(candidate),
    }
}

/// Resolved-path registry keyed by language.
///
/// Slots are write-once. Concurrent first probes may race; they produce the
/// same answer, so whichever write lands first is kept.
#[derive(Debug)]
pub struct Prober {
    config: Arc<HarnessConfig>,
    slots: [OnceLock<PathBuf>; LanguageId::ALL.len()],
}

impl Prober {
    pub fn new(config: Arc<HarnessConfig>) -> Self {
        Self {
            config,
            slots: Default::default(),
        }
    }

    fn slot(&self, language: LanguageId) -> &OnceLock<PathBuf> {
        &self.slots[language.index()]
    }

    /// Path cached by an earlier successful probe, without probing.
    pub fn cached(&self, language: LanguageId) -> Option<PathBuf> {
        self.slot(language).get().cloned()
    }

    /// Find the executable for `language`. Always `None` for embedded
    /// engines, which need no executable.
    pub async fn resolve(&self, language: LanguageId) -> Option<PathBuf> {
        if language.is_embedded() {
            return None;
        }
        if let Some(path) = self.cached(language) {
            return Some(path);
        }
        if let Some(path) = self.config.explicit_path(language) {
            debug!(%language, path = %path.display(), "using configured interpreter path");
            return Some(self.remember(language, path.to_path_buf()));
        }
        let toolchain = self.config.toolchain(language)?;
        for candidate in &toolchain.candidates {
            let program = expand_home(candidate);
            if self.self_check(&toolchain, &program).await {
                info!(%language, path = %program.display(), "resolved interpreter");
                return Some(self.remember(language, program));
            }
            debug!(%language, candidate = %program.display(), "candidate failed self-check");
        }
        debug!(%language, "no interpreter found");
        None
    }

    /// Whether `language` can run on this machine.
    pub async fn probe(&self, language: LanguageId) -> bool {
        language.is_embedded() || self.resolve(language).await.is_some()
    }

    fn remember(&self, language: LanguageId, path: PathBuf) -> PathBuf {
        let slot = self.slot(language);
        let _ = slot.set(path.clone());
        slot.get().cloned().unwrap_or(path)
    }

    async fn self_check(&self, toolchain: &Toolchain, program: &std::path::Path) -> bool {
        let mut spec = ProcessSpec::new(program, self.config.probe_timeout_for(toolchain))
            .args(toolchain.probe_args.iter().cloned())
            .envs(&toolchain.env);
        spec.stdin = toolchain.probe_stdin.clone();
        process::run(&spec).await.succeeded()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageOverride;

    fn prober_with(language: LanguageId, over: LanguageOverride) -> Prober {
        Prober::new(Arc::new(HarnessConfig::default().with_override(language, over)))
    }

    #[test]
    fn expands_home_relative_candidates() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/.cargo/bin/uiua"), home.join(".cargo/bin/uiua"));
        assert_eq!(expand_home("/usr/bin/uiua"), PathBuf::from("/usr/bin/uiua"));
        assert_eq!(expand_home("uiua"), PathBuf::from("uiua"));
    }

    #[tokio::test]
    async fn embedded_languages_are_always_available() {
        let prober = Prober::new(Arc::new(HarnessConfig::default()));
        assert!(prober.probe(LanguageId::Bqn).await);
        assert!(prober.resolve(LanguageId::Bqn).await.is_none());
    }

    #[tokio::test]
    async fn first_passing_candidate_wins_and_is_cached() {
        let prober = prober_with(
            LanguageId::Uiua,
            LanguageOverride {
                candidates: vec!["/nonexistent/uiua".into(), "true".into(), "sh".into()],
                ..LanguageOverride::default()
            },
        );
        assert_eq!(prober.resolve(LanguageId::Uiua).await, Some(PathBuf::from("true")));
        assert_eq!(prober.cached(LanguageId::Uiua), Some(PathBuf::from("true")));
    }

    #[tokio::test]
    async fn failing_candidates_are_not_cached() {
        let prober = prober_with(
            LanguageId::Kap,
            LanguageOverride {
                candidates: vec!["false".into(), "/nonexistent/kap".into()],
                ..LanguageOverride::default()
            },
        );
        assert!(!prober.probe(LanguageId::Kap).await);
        assert!(prober.cached(LanguageId::Kap).is_none());
    }

    #[tokio::test]
    async fn explicit_path_skips_probing() {
        let prober = prober_with(
            LanguageId::J,
            LanguageOverride {
                path: Some(PathBuf::from("/opt/j/bin/jconsole")),
                ..LanguageOverride::default()
            },
        );
        assert_eq!(
            prober.resolve(LanguageId::J).await,
            Some(PathBuf::from("/opt/j/bin/jconsole"))
        );
    }
}
