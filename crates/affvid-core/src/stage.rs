use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Status of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Success,
    Failed,
}

impl PublishStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStatus::Pending => "pending",
            PublishStatus::Success => "success",
            PublishStatus::Failed => "failed",
        }
    }

    /// `true` once no further transition is permitted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PublishStatus::Pending)
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PublishStatus::Pending),
            "success" => Ok(PublishStatus::Success),
            "failed" => Ok(PublishStatus::Failed),
            other => Err(CoreError::InvalidPublishStatus(other.to_string())),
        }
    }
}

/// Per-product pipeline stages, in the only order they may be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovered,
    Extracted,
    Analyzed,
    Scripted,
    MediaProduced,
    Published,
    Done,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Discovered => "discovered",
            Stage::Extracted => "extracted",
            Stage::Analyzed => "analyzed",
            Stage::Scripted => "scripted",
            Stage::MediaProduced => "media_produced",
            Stage::Published => "published",
            Stage::Done => "done",
        }
    }

    /// The stage that follows this one, or `None` for [`Stage::Done`].
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Discovered => Some(Stage::Extracted),
            Stage::Extracted => Some(Stage::Analyzed),
            Stage::Analyzed => Some(Stage::Scripted),
            Stage::Scripted => Some(Stage::MediaProduced),
            Stage::MediaProduced => Some(Stage::Published),
            Stage::Published => Some(Stage::Done),
            Stage::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
