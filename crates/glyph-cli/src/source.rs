//! Where a command reads its code from.
//!
//! Array-language glyphs are awkward to quote in a shell, so every command
//! that takes code accepts either `--code` or `--code-file`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct CodeSource {
    /// Code, inline
    #[arg(long, short)]
    code: Option<String>,
    /// Read the code from a file
    #[arg(long)]
    code_file: Option<PathBuf>,
}

impl CodeSource {
    /// The code text; trailing whitespace from files is dropped so the
    /// snippet can be wrapped in a single expression.
    pub fn read(&self) -> Result<String> {
        match (&self.code, &self.code_file) {
            (Some(code), _) => Ok(code.clone()),
            (None, Some(path)) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read code file {}", path.display()))?;
                Ok(text.trim_end().to_string())
            }
            (None, None) => anyhow::bail!("no code given; pass --code or --code-file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_code_is_used_verbatim() {
        let source = CodeSource {
            code: Some(" 1+↕ ".into()),
            code_file: None,
        };
        assert_eq!(source.read().unwrap(), " 1+↕ ");
    }

    #[test]
    fn code_file_drops_trailing_newline() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("solution.bqn");
        std::fs::write(&path, "⌽1+↕\n").unwrap();
        let source = CodeSource {
            code: None,
            code_file: Some(path),
        };
        assert_eq!(source.read().unwrap(), "⌽1+↕");
    }

    #[test]
    fn missing_code_file_names_the_path() {
        let source = CodeSource {
            code: None,
            code_file: Some(PathBuf::from("/nonexistent/solution.ua")),
        };
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/solution.ua"), "got {err}");
    }
}
