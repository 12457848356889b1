//! Identifier and referrer-tag extraction from product URLs.

use std::sync::LazyLock;

use regex::Regex;

static DP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("valid dp regex"));
static GP_PRODUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/gp/product/([A-Z0-9]{10})").expect("valid gp/product regex")
});

/// Returns the 10-character catalog code from a product URL.
///
/// The `/dp/<code>` segment is preferred; `/gp/product/<code>` is accepted
/// as a fallback. Returns `None` when neither is present.
#[must_use]
pub fn extract_external_id(url: &str) -> Option<String> {
    DP_RE
        .captures(url)
        .or_else(|| GP_PRODUCT_RE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns the value of the `tag` query parameter, if any.
///
/// Unparseable URLs and empty tag values yield `None`.
#[must_use]
pub fn extract_affiliate_tag(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "tag")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
