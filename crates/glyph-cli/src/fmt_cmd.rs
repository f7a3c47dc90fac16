//! `glyph fmt` command.

use glyph_core::{Dispatcher, LanguageId};

/// Print the formatted code. Returns whether the formatter ran; on failure
/// the original code is printed unchanged.
pub async fn run_fmt(dispatcher: &Dispatcher, language: LanguageId, code: &str) -> bool {
    let result = dispatcher.format_code(language, code).await;
    println!("{}", result.formatted);
    if !result.success {
        tracing::warn!(%language, "formatter unavailable or failed; code left unchanged");
    }
    result.success
}
