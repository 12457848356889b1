//! Product analysis: prompt construction, model call and tolerant recovery
//! of the structured result.

use std::path::Path;
use std::sync::Arc;

use affvid_core::{Analysis, ProductBrief};
use serde_json::{Map, Value};

use crate::error::ContentError;
use crate::llm::{ChatMessage, CompletionRequest, TextGenerator};

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 300;
const NO_DESCRIPTION: &str = "No description provided";

/// Builds the single user message asking for a JSON analysis.
#[must_use]
pub fn build_analysis_prompt(brief: &ProductBrief) -> String {
    let description = brief
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION);
    let price = brief
        .price
        .map_or_else(|| "unknown".to_owned(), |p| p.to_string());

    format!(
        "You are a marketing expert. Analyze the product below and answer in JSON.\n\
         \n\
         Product name: {title}\n\
         Description: {description}\n\
         Price: {price}\n\
         \n\
         Requirements:\n\
         - Return exactly one JSON object with this structure:\n\
         {{\n  \"summary\": \"a short product summary (1-2 sentences)\",\n  \
         \"keywords\": [\"keyword 1\", \"keyword 2\"],\n  \
         \"selling_points\": [\"strength 1\", \"strength 2\"]\n}}\n\
         Do not add any other explanation.",
        title = brief.title,
    )
}

/// Recovers an [`Analysis`] from raw model output. Never fails.
///
/// Tried in order: the whole text as a JSON object; the greedy span from the
/// first `{` to the last `}`; the first balanced `{…}` span; finally the raw
/// text becomes the summary. Missing keys default to empty values.
#[must_use]
pub fn recover_analysis(raw: &str) -> Analysis {
    let trimmed = raw.trim();

    if let Some(analysis) = parse_object(trimmed) {
        return analysis;
    }

    if let Some(analysis) = greedy_span(trimmed).and_then(parse_object) {
        return analysis;
    }

    if let Some(analysis) = balanced_span(trimmed).and_then(parse_object) {
        return analysis;
    }

    if !trimmed.is_empty() {
        tracing::warn!("model output is not JSON, using raw text as summary");
    }
    Analysis::from_summary(trimmed)
}

fn parse_object(text: &str) -> Option<Analysis> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(analysis_from_object(&map)),
        _ => None,
    }
}

/// Lenient field mapping: a key of the wrong shape degrades to empty rather
/// than discarding the whole object.
fn analysis_from_object(map: &Map<String, Value>) -> Analysis {
    let summary = match map.get("summary") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    Analysis {
        summary,
        keywords: string_list(map.get("keywords")),
        selling_points: string_list(map.get("selling_points")),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// The first `{…}` span whose braces balance, ignoring braces inside JSON
/// string literals.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Produces marketing analyses through a [`TextGenerator`].
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl Analyzer {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    /// Analyzes a product. A failed model call yields an empty
    /// [`Analysis`]; malformed output goes through [`recover_analysis`].
    pub async fn analyze(&self, brief: &ProductBrief) -> Analysis {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(build_analysis_prompt(brief))],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        match self.generator.complete(request).await {
            Ok(raw) => recover_analysis(&raw),
            Err(e) => {
                tracing::error!(title = %brief.title, error = %e, "analysis generation failed");
                Analysis::default()
            }
        }
    }
}

/// Writes `analysis` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`ContentError::Io`] if the file cannot be written.
pub async fn save_analysis(analysis: &Analysis, path: &Path) -> Result<(), ContentError> {
    let json = serde_json::to_string_pretty(analysis).map_err(|e| ContentError::Json {
        context: "analysis".to_owned(),
        source: e,
    })?;
    write_creating_parents(path, json.as_bytes()).await?;
    tracing::info!(path = %path.display(), "saved analysis");
    Ok(())
}

/// Reads an analysis written by [`save_analysis`].
///
/// # Errors
///
/// Returns [`ContentError::Io`] if the file cannot be read, or
/// [`ContentError::Json`] if it is not an analysis object.
pub async fn load_analysis(path: &Path) -> Result<Analysis, ContentError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ContentError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    serde_json::from_str(&raw).map_err(|e| ContentError::Json {
        context: path.display().to_string(),
        source: e,
    })
}

pub(crate) async fn write_creating_parents(path: &Path, bytes: &[u8]) -> Result<(), ContentError> {
    let io_err = |e| ContentError::Io {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)
}

#[cfg(test)]
#[path = "analyze_test.rs"]
mod tests;
