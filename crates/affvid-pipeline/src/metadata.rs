//! Upload metadata derived from a product and its analysis.

use affvid_core::Analysis;
use affvid_db::ProductRow;
use affvid_publish::VideoMetadata;

/// The platform rejects tag lists longer than this in total.
const MAX_TAGS_CHARS: usize = 500;

/// Builds the video description.
///
/// The affiliate link leads so that truncation to the platform limit can
/// never cut it off; the summary and selling points follow when present.
#[must_use]
pub fn build_description(analysis: &Analysis, affiliate_link: &str) -> String {
    let mut sections = vec![format!("Buy here: {affiliate_link}")];

    let summary = analysis.summary.trim();
    if !summary.is_empty() {
        sections.push(summary.to_owned());
    }

    let points: Vec<String> = analysis
        .selling_points
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!("- {p}"))
        .collect();
    if !points.is_empty() {
        sections.push(points.join("\n"));
    }

    sections.join("\n\n")
}

/// Tags from the analysis keywords: trimmed, blank and duplicate entries
/// dropped (case-insensitively), and capped at the platform's total length.
#[must_use]
pub fn build_tags(analysis: &Analysis) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut total = 0;

    for keyword in &analysis.keywords {
        let tag = keyword.trim();
        if tag.is_empty() || tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        let len = tag.chars().count();
        if total + len > MAX_TAGS_CHARS {
            break;
        }
        total += len;
        tags.push(tag.to_owned());
    }

    tags
}

#[must_use]
pub fn build_video_metadata(product: &ProductRow, analysis: &Analysis) -> VideoMetadata {
    VideoMetadata::new(
        &product.title,
        &build_description(analysis, &product.affiliate_link()),
        build_tags(analysis),
    )
}
