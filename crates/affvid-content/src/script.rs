//! Short-form video script generation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use affvid_core::{Analysis, ProductMeta};

use crate::analyze::write_creating_parents;
use crate::error::ContentError;
use crate::llm::{ChatMessage, CompletionRequest, TextGenerator};

/// Closing line every script ends with.
pub const CALL_TO_ACTION: &str = "Click the link in the description to buy now!";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 400;
const SYSTEM_PROMPT: &str = "You are an expert copywriter for short video advertisements.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Persuasive,
    Friendly,
    Informative,
}

impl Tone {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Persuasive => "persuasive",
            Tone::Friendly => "friendly",
            Tone::Informative => "informative",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "persuasive" => Ok(Tone::Persuasive),
            "friendly" => Ok(Tone::Friendly),
            "informative" => Ok(Tone::Informative),
            other => Err(format!("unknown tone \"{other}\"")),
        }
    }
}

/// The script used when generation fails: the summary followed by the
/// call to action.
#[must_use]
pub fn fallback_script(analysis: &Analysis) -> String {
    format!("{}\n\n{CALL_TO_ACTION}", analysis.summary)
}

/// Builds the user message for script generation. Absent metadata fields
/// are left out of the prompt entirely.
#[must_use]
pub fn build_script_prompt(analysis: &Analysis, meta: &ProductMeta, tone: Tone) -> String {
    let keywords = analysis.keywords.join(", ");
    let selling_points = analysis
        .selling_points
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut product_lines = Vec::new();
    if let Some(title) = meta.title.as_deref().filter(|t| !t.is_empty()) {
        product_lines.push(format!("- Product name: {title}"));
    }
    if let Some(price) = meta.price {
        product_lines.push(format!("- Price: {price}"));
    }
    if let Some(link) = meta.affiliate_link.as_deref().filter(|l| !l.is_empty()) {
        product_lines.push(format!("- Affiliate link: {link}"));
    }

    format!(
        "Write a short advertising script for a 30-60 second video based on the \
         information below. Keep it concise and engaging, with a call to action.\n\
         \n\
         Information:\n\
         - Summary: {summary}\n\
         - Keywords: {keywords}\n\
         - Highlights:\n{selling_points}\n\
         {product}\n\
         \n\
         Requirements:\n\
         - Length suitable for 30-60 seconds of narration (about 80-140 words).\n\
         - Tone: {tone}\n\
         - End with this exact call to action: '{CALL_TO_ACTION}'\n\
         \n\
         Output only the script, without notes.",
        summary = analysis.summary,
        product = product_lines.join("\n"),
    )
}

/// Writes scripts through a [`TextGenerator`].
pub struct ScriptWriter {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl ScriptWriter {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    /// Generates a script. On a failed call or an empty completion the
    /// [`fallback_script`] is returned instead; no error escapes.
    pub async fn write_script(&self, analysis: &Analysis, meta: &ProductMeta, tone: Tone) -> String {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_script_prompt(analysis, meta, tone)),
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        match self.generator.complete(request).await {
            Ok(script) if !script.trim().is_empty() => script.trim().to_owned(),
            Ok(_) => {
                tracing::warn!("script generation returned empty text, using fallback");
                fallback_script(analysis)
            }
            Err(e) => {
                tracing::error!(error = %e, "script generation failed, using fallback");
                fallback_script(analysis)
            }
        }
    }
}

/// Writes the script as plain text, creating parent directories.
///
/// # Errors
///
/// Returns [`ContentError::Io`] if the file cannot be written.
pub async fn save_script(script: &str, path: &Path) -> Result<(), ContentError> {
    write_creating_parents(path, script.as_bytes()).await?;
    tracing::info!(path = %path.display(), "saved script");
    Ok(())
}
