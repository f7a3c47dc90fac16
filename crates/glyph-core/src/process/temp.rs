//! Temporary program files for interpreters that read source from disk.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use tempfile::TempPath;
use tracing::debug;

use crate::language::LanguageId;

/// A uniquely named program file, deleted when dropped.
///
/// Names look like `uiua_1718000000000_XXXXXX.ua`: the language, a
/// millisecond timestamp, and a random suffix so concurrent invocations
/// never collide.
#[derive(Debug)]
pub struct TempProgram {
    path: Option<TempPath>,
}

impl TempProgram {
    /// Write `contents` to a new file in `dir`.
    pub fn write_in(
        dir: &Path,
        language: LanguageId,
        extension: &str,
        contents: &str,
    ) -> io::Result<Self> {
        let prefix = format!("{}_{}_", language.as_str(), Utc::now().timestamp_millis());
        let suffix = format!(".{extension}");
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path();
        debug!(path = %path.display(), "wrote temporary program");
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Read the file back, e.g. after an in-place formatter ran on it.
    pub fn read(&self) -> io::Result<String> {
        std::fs::read_to_string(self.path())
    }
}

impl Drop for TempProgram {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                debug!(path = %shown, error = %e, "failed to remove temporary program");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let program = TempProgram::write_in(dir.path(), LanguageId::Uiua, "ua", "1 2\n+").unwrap();
        let path = program.path().to_path_buf();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("uiua_"), "got {name}");
        assert!(name.ends_with(".ua"), "got {name}");
        assert_eq!(program.read().unwrap(), "1 2\n+");

        drop(program);
        assert!(!path.exists());
    }

    #[test]
    fn names_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = TempProgram::write_in(dir.path(), LanguageId::Kap, "kap", "1").unwrap();
        let b = TempProgram::write_in(dir.path(), LanguageId::Kap, "kap", "2").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn file_already_gone_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let program = TempProgram::write_in(dir.path(), LanguageId::Tinyapl, "tinyapl", "").unwrap();
        std::fs::remove_file(program.path()).unwrap();
        drop(program);
    }
}
