//! Marketing analysis and script generation over a chat-completion model.
//!
//! Generation is best-effort: neither [`Analyzer`] nor [`ScriptWriter`]
//! surfaces a model failure to the caller. Both degrade to deterministic
//! fallbacks and log the cause.

pub mod analyze;
pub mod error;
pub mod llm;
pub mod script;

pub use analyze::{build_analysis_prompt, load_analysis, recover_analysis, save_analysis, Analyzer};
pub use error::ContentError;
pub use llm::{ChatMessage, CompletionRequest, OpenAiClient, Role, TextGenerator};
pub use script::{build_script_prompt, fallback_script, save_script, ScriptWriter, Tone, CALL_TO_ACTION};
