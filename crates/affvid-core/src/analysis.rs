use serde::{Deserialize, Serialize};

/// Structured marketing analysis of a product.
///
/// Always a total structure: keys missing from model output deserialize to
/// empty values rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    pub summary: String,
    pub keywords: Vec<String>,
    pub selling_points: Vec<String>,
}

impl Analysis {
    /// Analysis whose summary is `text` and whose lists are empty.
    #[must_use]
    pub fn from_summary(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.keywords.is_empty() && self.selling_points.is_empty()
    }
}
