//! Field selection over a fetched product page.
//!
//! Each field has an ordered list of locators; the first one that yields a
//! non-empty value wins. A missing field degrades to `None` (or the
//! placeholder title) and never fails the record.

use std::sync::LazyLock;

use affvid_core::{ExtractedProduct, PLACEHOLDER_TITLE};
use scraper::{Html, Selector};

use crate::error::ScraperError;
use crate::ident::{extract_affiliate_tag, extract_external_id};
use crate::normalize::{collapse_whitespace, parse_price, parse_rating};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("#productTitle"));
static OG_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:title"]"#));
static DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));

static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".a-price .a-offscreen"));
static PRICE_OUR: LazyLock<Selector> = LazyLock::new(|| selector("#priceblock_ourprice"));
static PRICE_DEAL: LazyLock<Selector> = LazyLock::new(|| selector("#priceblock_dealprice"));

static RATING: LazyLock<Selector> =
    LazyLock::new(|| selector("span[data-asin] span.a-icon-alt"));
static RATING_STAR: LazyLock<Selector> =
    LazyLock::new(|| selector("i.a-icon-star span.a-icon-alt"));
static RATING_POPOVER: LazyLock<Selector> = LazyLock::new(|| selector("#acrPopover"));

static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("#landingImage"));
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:image"]"#));

static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| selector("#productDescription"));
static FEATURE_BULLETS: LazyLock<Selector> = LazyLock::new(|| selector("#feature-bullets li"));

/// Parses a product page into an [`ExtractedProduct`].
///
/// The identifier and affiliate tag come from `url`, everything else from
/// the markup. The URL is stored exactly as given.
///
/// # Errors
///
/// Returns [`ScraperError::MissingIdentifier`] if `url` carries no product
/// code.
pub fn parse_product_page(html: &str, url: &str) -> Result<ExtractedProduct, ScraperError> {
    let external_id = extract_external_id(url).ok_or_else(|| ScraperError::MissingIdentifier {
        url: url.to_string(),
    })?;

    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE)
        .or_else(|| first_attr(&document, &OG_TITLE, "content"))
        .or_else(|| first_text(&document, &DOC_TITLE))
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

    let price = [&*PRICE, &*PRICE_OUR, &*PRICE_DEAL]
        .into_iter()
        .find_map(|sel| first_text(&document, sel).and_then(|t| parse_price(&t)));

    let rating = [&*RATING, &*RATING_STAR]
        .into_iter()
        .find_map(|sel| first_text(&document, sel).and_then(|t| parse_rating(&t)))
        .or_else(|| {
            first_attr(&document, &RATING_POPOVER, "title").and_then(|t| parse_rating(&t))
        });

    let image = first_attr(&document, &IMAGE, "src")
        .or_else(|| first_attr(&document, &IMAGE, "data-old-hires"))
        .or_else(|| first_attr(&document, &OG_IMAGE, "content"));

    let description = first_text(&document, &DESCRIPTION).or_else(|| {
        let bullets: Vec<String> = document
            .select(&FEATURE_BULLETS)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        (!bullets.is_empty()).then(|| bullets.join("\n"))
    });

    Ok(ExtractedProduct {
        external_id,
        title,
        url: url.to_string(),
        image,
        price,
        rating,
        affiliate_tag: extract_affiliate_tag(url),
        description,
    })
}

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn first_attr(document: &Html, sel: &Selector, attr: &str) -> Option<String> {
    document
        .select(sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "page_test.rs"]
mod tests;
