use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Title stored when a page yields no usable title, so the non-empty
/// `products.title` invariant always holds.
pub const PLACEHOLDER_TITLE: &str = "(No title)";

/// A product record produced by the extractor, normalized for storage.
///
/// Only `external_id` is mandatory at extraction time; every other field is
/// best-effort and degrades to `None` when the source markup lacks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    /// Site-specific catalog code, e.g. `"B0DWGX3WQC"`. Natural key for upsert.
    pub external_id: String,
    pub title: String,
    /// Source URL exactly as ingested, including any affiliate query string.
    pub url: String,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    /// Star rating on the site's 0–5 scale.
    pub rating: Option<Decimal>,
    /// Referrer tag read from the `tag` query parameter.
    pub affiliate_tag: Option<String>,
    pub description: Option<String>,
}

impl ExtractedProduct {
    /// The subset of fields the analysis prompt needs.
    #[must_use]
    pub fn brief(&self) -> ProductBrief {
        ProductBrief {
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }

    /// Script metadata with the affiliate link resolved.
    #[must_use]
    pub fn meta(&self) -> ProductMeta {
        ProductMeta {
            title: Some(self.title.clone()),
            price: self.price,
            affiliate_link: Some(affiliate_link(&self.url, self.affiliate_tag.as_deref())),
        }
    }
}

/// Product facts embedded in the analysis prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBrief {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// Optional product metadata embedded in the script prompt.
///
/// Every field is optional; absent fields are simply left out of the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMeta {
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub affiliate_link: Option<String>,
}

/// Returns the shareable affiliate link for a product URL.
///
/// The URL is returned unchanged when no tag is known or when it already
/// carries a `tag` query parameter; otherwise `tag=<affiliate_tag>` is
/// appended to the query string (before any fragment).
#[must_use]
pub fn affiliate_link(url: &str, affiliate_tag: Option<&str>) -> String {
    let Some(tag) = affiliate_tag.filter(|t| !t.is_empty()) else {
        return url.to_string();
    };

    let (base, fragment) = match url.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (url, None),
    };

    let has_tag = base
        .split_once('?')
        .is_some_and(|(_, query)| query.split('&').any(|pair| pair.starts_with("tag=")));
    if has_tag {
        return url.to_string();
    }

    let separator = if base.contains('?') { '&' } else { '?' };
    let mut link = format!("{base}{separator}tag={tag}");
    if let Some(fragment) = fragment {
        link.push('#');
        link.push_str(fragment);
    }
    link
}
