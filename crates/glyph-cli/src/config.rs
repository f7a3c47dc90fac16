//! Configuration file management for glyph.
//!
//! Provides a TOML-based config file at `~/.config/glyph/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use glyph_core::{HarnessConfig, LanguageId, LanguageOverride};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;

pub const BIND_ENV: &str = "GLYPH_BIND";
pub const PORT_ENV: &str = "GLYPH_PORT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub execution: ExecutionSection,
    pub server: ServerSection,
    /// Per-language overrides, e.g. `[languages.j] path = "..."`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub languages: BTreeMap<LanguageId, LanguageOverride>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,
    pub format_timeout_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_ms: glyph_core::config::DEFAULT_EXEC_TIMEOUT.as_millis() as u64,
            probe_timeout_ms: None,
            format_timeout_ms: glyph_core::config::DEFAULT_FORMAT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the glyph config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/glyph` or `~/.config/glyph`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("glyph");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("glyph")
}

/// Return the path to the glyph config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if there is one.
///
/// A missing file is not an error; a file that exists but does not parse
/// is.
pub fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if config_path().exists() {
        load_config().map(Some)
    } else {
        Ok(None)
    }
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub timeout_ms: Option<u64>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GlyphConfig {
    pub harness: HarnessConfig,
    pub server: ServerSection,
}

impl GlyphConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Timeouts: `--timeout-ms` > `GLYPH_*_TIMEOUT_MS` env > `[execution]` > built-in defaults
    /// - Server: `--bind`/`--port` > `GLYPH_BIND`/`GLYPH_PORT` env > `[server]` > `127.0.0.1:3001`
    /// - Languages: `[languages.<id>]` tables only
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config_if_present()?;
        Self::resolve_with(cli, file, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        cli: &CliOverrides,
        file: Option<ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();

        let mut harness = HarnessConfig {
            exec_timeout: Duration::from_millis(file.execution.timeout_ms),
            probe_timeout: file.execution.probe_timeout_ms.map(Duration::from_millis),
            format_timeout: Duration::from_millis(file.execution.format_timeout_ms),
            languages: file.languages,
            ..HarnessConfig::default()
        }
        .apply_env(&env)?;
        if let Some(ms) = cli.timeout_ms {
            harness.exec_timeout = Duration::from_millis(ms);
        }

        let mut server = file.server;
        if let Some(bind) = env(BIND_ENV) {
            server.bind = bind;
        }
        if let Some(raw) = env(PORT_ENV) {
            server.port = raw
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} must be a port number, got {raw:?}"))?;
        }
        if let Some(bind) = &cli.bind {
            server.bind = bind.clone();
        }
        if let Some(port) = cli.port {
            server.port = port;
        }

        Ok(Self { harness, server })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = GlyphConfig::resolve_with(&CliOverrides::default(), None, no_env).unwrap();
        assert_eq!(config.harness.exec_timeout, Duration::from_secs(10));
        assert_eq!(config.server, ServerSection::default());
        assert!(config.harness.languages.is_empty());
    }

    #[test]
    fn config_file_sections_parse() {
        let file: ConfigFile = toml::from_str(
            r#"
            [execution]
            timeout_ms = 4000

            [server]
            port = 8080

            [languages.j]
            path = "/opt/j9.6/bin/jconsole"

            [languages.uiua]
            candidates = ["/usr/local/bin/uiua"]
            "#,
        )
        .unwrap();
        assert_eq!(file.execution.timeout_ms, 4000);
        assert_eq!(file.execution.format_timeout_ms, 5000);
        assert_eq!(file.server.bind, DEFAULT_BIND);
        assert_eq!(file.server.port, 8080);
        assert_eq!(
            file.languages[&LanguageId::J].path,
            Some(PathBuf::from("/opt/j9.6/bin/jconsole"))
        );

        let config = GlyphConfig::resolve_with(&CliOverrides::default(), Some(file), no_env).unwrap();
        assert_eq!(config.harness.exec_timeout, Duration::from_millis(4000));
        assert_eq!(
            config.harness.toolchain(LanguageId::Uiua).unwrap().candidates,
            vec!["/usr/local/bin/uiua"]
        );
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let file: ConfigFile = toml::from_str("[execution]\ntimeout_ms = 4000\n[server]\nport = 8080\n").unwrap();
        let env = |name: &str| match name {
            "GLYPH_EXEC_TIMEOUT_MS" => Some("2500".to_string()),
            PORT_ENV => Some("9000".to_string()),
            _ => None,
        };

        let from_env = GlyphConfig::resolve_with(&CliOverrides::default(), Some(file), env).unwrap();
        assert_eq!(from_env.harness.exec_timeout, Duration::from_millis(2500));
        assert_eq!(from_env.server.port, 9000);

        let cli = CliOverrides {
            timeout_ms: Some(100),
            bind: Some("0.0.0.0".into()),
            port: Some(1234),
        };
        let from_cli = GlyphConfig::resolve_with(&cli, None, env).unwrap();
        assert_eq!(from_cli.harness.exec_timeout, Duration::from_millis(100));
        assert_eq!(from_cli.server.bind, "0.0.0.0");
        assert_eq!(from_cli.server.port, 1234);
    }

    #[test]
    fn malformed_port_is_an_error() {
        let env = |name: &str| (name == PORT_ENV).then(|| "eighty".to_string());
        let err = GlyphConfig::resolve_with(&CliOverrides::default(), None, env).unwrap_err();
        assert!(err.to_string().contains(PORT_ENV), "unexpected error: {err}");
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let mut original = ConfigFile::default();
        original.server.port = 4242;
        original.languages.insert(
            LanguageId::Kap,
            LanguageOverride {
                path: Some(PathBuf::from("/opt/kap/bin/kap")),
                ..LanguageOverride::default()
            },
        );
        let saved = save_config(&original);
        let loaded = load_config();
        let path = config_path();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        saved.unwrap();
        let loaded = loaded.unwrap();
        assert_eq!(loaded.server.port, 4242);
        assert_eq!(loaded.languages, original.languages);
        assert!(path.starts_with(tmp.path()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&path).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let result = load_config_if_present();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert!(result.unwrap().is_none());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("glyph/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
