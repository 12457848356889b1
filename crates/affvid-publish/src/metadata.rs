use serde::Serialize;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
/// "People & Blogs".
pub const DEFAULT_CATEGORY_ID: &str = "22";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Title, description and tags for an upload.
///
/// [`VideoMetadata::new`] enforces the platform's length limits by
/// truncating on character boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

impl VideoMetadata {
    #[must_use]
    pub fn new(title: &str, description: &str, tags: Vec<String>) -> Self {
        Self {
            title: truncate_chars(title.trim(), MAX_TITLE_CHARS),
            description: truncate_chars(description, MAX_DESCRIPTION_CHARS),
            tags,
            category_id: DEFAULT_CATEGORY_ID.to_owned(),
            privacy: Privacy::default(),
        }
    }

    #[must_use]
    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }

    /// The `videos.insert` resource body.
    pub(crate) fn resource(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy,
            }
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
