//! Video rendering through the video-generation API, plus optional speech
//! narration.

pub mod error;
pub mod narration;
pub mod producer;
pub mod videogen;

pub use error::MediaError;
pub use narration::{OpenAiSpeechClient, SpeechSynthesizer};
pub use producer::{MediaRequest, VideoGenProducer, VideoProducer};
pub use videogen::{JobState, VideoGenClient};
