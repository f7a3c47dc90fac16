//! Toolchain data for the external interpreters.
//!
//! Candidate executables, probe commands, run arguments, environment, and
//! noise filters are defined in `languages.toml` and embedded in the binary
//! at compile time. Configuration may override parts of an entry through
//! [`LanguageOverride`].

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::config::LanguageOverride;
use crate::language::LanguageId;
use crate::normalize::FilterSet;

/// How to find, check, and run one interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Toolchain {
    pub id: LanguageId,
    /// Executables to try, in order. A leading `~/` is the home directory.
    pub candidates: Vec<String>,
    /// Arguments for the self-check run.
    #[serde(default)]
    pub probe_args: Vec<String>,
    /// Text written to stdin during the self-check.
    #[serde(default)]
    pub probe_stdin: Option<String>,
    /// Self-check limit for slow-starting interpreters.
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,
    /// Arguments placed before the program file (if any).
    #[serde(default)]
    pub run_args: Vec<String>,
    /// Arguments placed before the file when formatting; empty means the
    /// language has no formatter.
    #[serde(default)]
    pub format_args: Vec<String>,
    /// Extension of temporary program files; `None` means the program is
    /// written to stdin.
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Extra environment for every run, including the self-check.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: FilterSet,
}

/// Container for deserializing the embedded TOML file.
#[derive(Debug, Deserialize)]
struct ToolchainLibrary {
    language: Vec<Toolchain>,
}

/// The embedded toolchain TOML.
static LANGUAGES_TOML: &str = include_str!("languages.toml");

/// Load every toolchain from the embedded library.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. This is a compile-time
/// invariant -- if the binary was built, the TOML is valid.
pub fn load_toolchains() -> &'static [Toolchain] {
    static LIBRARY: OnceLock<Vec<Toolchain>> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let lib: ToolchainLibrary =
            toml::from_str(LANGUAGES_TOML).expect("embedded languages.toml is invalid");
        lib.language
    })
}

/// The built-in toolchain for `language`; `None` for embedded engines.
pub fn builtin(language: LanguageId) -> Option<&'static Toolchain> {
    load_toolchains().iter().find(|t| t.id == language)
}

impl Toolchain {
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    pub fn has_formatter(&self) -> bool {
        !self.format_args.is_empty()
    }

    /// Apply a configuration override: non-empty `candidates` replace the
    /// built-in list and `filters`, when present, replace the built-in ones.
    pub fn with_override(&self, over: &LanguageOverride) -> Toolchain {
        let mut merged = self.clone();
        if !over.candidates.is_empty() {
            merged.candidates = over.candidates.clone();
        }
        if let Some(filters) = &over.filters {
            merged.filters = filters.clone();
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::LineFilter;

    #[test]
    fn every_external_language_has_a_toolchain() {
        for id in LanguageId::ALL {
            assert_eq!(
                builtin(id).is_some(),
                !id.is_embedded(),
                "toolchain presence for {id}"
            );
        }
    }

    #[test]
    fn candidates_start_with_bare_command_names() {
        let uiua = builtin(LanguageId::Uiua).unwrap();
        assert_eq!(uiua.candidates[0], "uiua");
        assert_eq!(uiua.candidates.last().map(String::as_str), Some("~/.cargo/bin/uiua"));
    }

    #[test]
    fn dyalog_noise_filters_are_data() {
        let apl = builtin(LanguageId::Apl).unwrap();
        assert!(apl.filters.stderr.drop_blank);
        assert!(apl.filters.stderr.drop_contains.iter().any(|s| s == "ERR: Display.cpp"));
        assert_eq!(apl.filters.stdout.drop_prefixes, vec!["Was ", "*"]);
        assert_eq!(apl.probe_timeout(), Some(Duration::from_millis(3000)));
        assert_eq!(apl.run_args, vec!["-b"]);
    }

    #[test]
    fn only_uiua_formats() {
        let formatters: Vec<_> = load_toolchains()
            .iter()
            .filter(|t| t.has_formatter())
            .map(|t| t.id)
            .collect();
        assert_eq!(formatters, vec![LanguageId::Uiua]);
    }

    #[test]
    fn stdin_languages_have_no_extension() {
        assert!(builtin(LanguageId::J).unwrap().file_extension.is_none());
        assert!(builtin(LanguageId::Apl).unwrap().file_extension.is_none());
        assert_eq!(
            builtin(LanguageId::Kap).unwrap().file_extension.as_deref(),
            Some("kap")
        );
    }

    #[test]
    fn override_replaces_candidates_and_filters() {
        let j = builtin(LanguageId::J).unwrap();
        let over = LanguageOverride {
            candidates: vec!["/opt/j/bin/jconsole".into()],
            filters: Some(FilterSet {
                stdout: LineFilter {
                    drop_blank: true,
                    ..LineFilter::default()
                },
                stderr: LineFilter::default(),
            }),
            ..LanguageOverride::default()
        };
        let merged = j.with_override(&over);
        assert_eq!(merged.candidates, vec!["/opt/j/bin/jconsole"]);
        assert!(merged.filters.stdout.drop_blank);
        assert_eq!(merged.probe_args, j.probe_args);
    }
}
