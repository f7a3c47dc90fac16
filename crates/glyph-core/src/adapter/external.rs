//! Plumbing shared by the adapters that drive an external interpreter.
//!
//! [`External`] resolves the executable through the [`Prober`], delivers
//! the program either on stdin or in a temporary file (per the toolchain's
//! `file_extension`), and maps the supervisor's outcome onto
//! [`HarnessError`]. Language-specific result extraction stays in each
//! adapter.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::language::LanguageId;
use crate::languages::Toolchain;
use crate::normalize::FilterSet;
use crate::probe::Prober;
use crate::process::{self, ProcessSpec, RunOutcome, TempProgram};
use crate::types::FormatResult;

/// Output of an interpreter that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct External {
    language: LanguageId,
    toolchain: Option<Toolchain>,
    config: Arc<HarnessConfig>,
    prober: Arc<Prober>,
}

impl External {
    pub fn new(language: LanguageId, config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        Self {
            language,
            toolchain: config.toolchain(language),
            config,
            prober,
        }
    }

    pub fn language(&self) -> LanguageId {
        self.language
    }

    /// Noise filters for this interpreter; empty when none are configured.
    pub fn filters(&self) -> FilterSet {
        self.toolchain
            .as_ref()
            .map(|t| t.filters.clone())
            .unwrap_or_default()
    }

    async fn locate(&self) -> Result<(&Toolchain, PathBuf), HarnessError> {
        let unavailable = || HarnessError::unavailable(self.language);
        let toolchain = self.toolchain.as_ref().ok_or_else(unavailable)?;
        let program = self
            .prober
            .resolve(self.language)
            .await
            .ok_or_else(unavailable)?;
        Ok((toolchain, program))
    }

    /// Run `program` with the language's run arguments and the execution
    /// timeout.
    pub async fn execute(&self, program: &str) -> Result<Captured, HarnessError> {
        let (toolchain, executable) = self.locate().await?;
        let spec = ProcessSpec::new(executable, self.config.exec_timeout)
            .args(toolchain.run_args.iter().cloned())
            .envs(&toolchain.env);

        // Held until the process is gone; dropping it removes the file.
        let (spec, _file) = match toolchain.file_extension.as_deref() {
            Some(extension) => {
                let file = self.write_program(extension, program)?;
                let path = file.path().to_string_lossy().into_owned();
                (spec.args([path]), Some(file))
            }
            None => (spec.stdin(program), None),
        };

        match process::run(&spec).await {
            RunOutcome::Exited {
                exit_code,
                stdout,
                stderr,
            } => Ok(Captured {
                exit_code,
                stdout,
                stderr,
            }),
            RunOutcome::TimedOut => Err(HarnessError::Timeout),
            RunOutcome::SpawnFailed(message) => Err(HarnessError::Spawn(message)),
        }
    }

    /// Run the language's in-place formatter on a temporary copy of `code`
    /// and read the result back. Any failure echoes `code` unchanged.
    pub async fn format(&self, code: &str) -> FormatResult {
        let Ok((toolchain, executable)) = self.locate().await else {
            return FormatResult::unchanged(code);
        };
        if !toolchain.has_formatter() {
            return FormatResult::unchanged(code);
        }
        let extension = toolchain.file_extension.as_deref().unwrap_or("txt");
        let Ok(file) = self.write_program(extension, code) else {
            return FormatResult::unchanged(code);
        };

        let spec = ProcessSpec::new(executable, self.config.format_timeout)
            .args(toolchain.format_args.iter().cloned())
            .args([file.path().to_string_lossy().into_owned()])
            .envs(&toolchain.env);

        match process::run(&spec).await {
            RunOutcome::Exited { exit_code, .. } => match file.read() {
                Ok(formatted) => {
                    debug!(language = %self.language, ?exit_code, "formatter finished");
                    FormatResult {
                        success: true,
                        formatted: formatted.trim().to_owned(),
                    }
                }
                Err(e) => {
                    debug!(language = %self.language, error = %e, "could not read formatted file");
                    FormatResult::unchanged(code)
                }
            },
            RunOutcome::TimedOut | RunOutcome::SpawnFailed(_) => FormatResult::unchanged(code),
        }
    }

    fn write_program(&self, extension: &str, text: &str) -> Result<TempProgram, HarnessError> {
        TempProgram::write_in(&self.config.temp_dir, self.language, extension, text)
            .map_err(|e| HarnessError::Spawn(format!("could not write program file: {e}")))
    }
}
