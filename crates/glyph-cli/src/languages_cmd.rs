//! `glyph languages` command: show interpreter availability.

use anyhow::Result;
use serde::Serialize;

use glyph_core::{Dispatcher, LanguageId};

#[derive(Debug, Serialize)]
struct LanguageStatus {
    language: LanguageId,
    name: &'static str,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

pub async fn run_languages(dispatcher: &Dispatcher, json: bool) -> Result<()> {
    let availability = dispatcher.available_languages().await;
    let mut statuses = Vec::with_capacity(availability.len());
    for (language, available) in availability {
        let path = if available {
            dispatcher
                .resolve(language)
                .await
                .map(|p| p.display().to_string())
        } else {
            None
        };
        statuses.push(LanguageStatus {
            language,
            name: language.display_name(),
            available,
            path,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    for status in &statuses {
        let icon = if status.available { "+" } else { "-" };
        let location = match (&status.path, status.language.is_embedded()) {
            (Some(path), _) => path.clone(),
            (None, true) => "embedded".to_string(),
            (None, false) => "not found".to_string(),
        };
        println!("  [{icon}] {:<8} {:<11} {location}", status.language.as_str(), status.name);
    }
    Ok(())
}
