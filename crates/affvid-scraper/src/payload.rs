//! Marketplace listing API payloads and their conversion into
//! [`ExtractedProduct`].

use affvid_core::{ExtractedProduct, PLACEHOLDER_TITLE};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ScraperError;
use crate::normalize::collapse_whitespace;

/// Prefix applied to marketplace item ids so they share the `external_id`
/// namespace with page-extracted products without colliding.
pub const MARKETPLACE_ID_PREFIX: &str = "tiki-";

/// One page of the `/api/v2/products` listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingResponse {
    #[serde(default)]
    pub data: Vec<ListingItem>,
}

/// A single listing entry. Every field is optional in the wire format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingItem {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub rating_average: Option<f64>,
    pub review_count: Option<i64>,
    pub thumbnail_url: Option<String>,
    pub url_path: Option<String>,
    pub short_description: Option<String>,
}

/// Converts a listing item into an [`ExtractedProduct`].
///
/// The product URL is `base_url` joined with the item's `url_path`. A blank
/// name falls back to the placeholder title and a zero rating (the API's
/// value for "unrated") maps to `None`.
///
/// # Errors
///
/// Returns [`ScraperError::MissingIdentifier`] when the item has no `id`.
pub fn extract_from_payload(
    item: &ListingItem,
    base_url: &str,
) -> Result<ExtractedProduct, ScraperError> {
    let base = base_url.trim_end_matches('/');
    let url_path = item
        .url_path
        .as_deref()
        .unwrap_or_default()
        .trim_start_matches('/');
    let url = format!("{base}/{url_path}");

    let id = item
        .id
        .ok_or_else(|| ScraperError::MissingIdentifier { url: url.clone() })?;

    let title = item
        .name
        .as_deref()
        .map(collapse_whitespace)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

    let price = item
        .price
        .and_then(|p| Decimal::try_from(p).ok())
        .filter(|p| !p.is_sign_negative())
        .map(|p| p.round_dp(2));

    let rating = item
        .rating_average
        .and_then(|r| Decimal::try_from(r).ok())
        .filter(|r| *r > Decimal::ZERO && *r <= Decimal::from(5))
        .map(|r| r.round_dp(2));

    Ok(ExtractedProduct {
        external_id: format!("{MARKETPLACE_ID_PREFIX}{id}"),
        title,
        url,
        image: item.thumbnail_url.clone().filter(|u| !u.is_empty()),
        price,
        rating,
        affiliate_tag: None,
        description: item
            .short_description
            .as_deref()
            .map(collapse_whitespace)
            .filter(|d| !d.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item() -> ListingItem {
        serde_json::from_value(serde_json::json!({
            "id": 271_998_812,
            "name": "Tai nghe  Bluetooth",
            "price": 250_000,
            "rating_average": 4.6,
            "review_count": 312,
            "thumbnail_url": "https://salt.tikicdn.com/cache/280x280/a.jpg",
            "url_path": "tai-nghe-bluetooth-p271998812.html?spid=271998813"
        }))
        .unwrap()
    }

    #[test]
    fn converts_listing_item() {
        let product = extract_from_payload(&item(), "https://tiki.vn/").unwrap();

        assert_eq!(product.external_id, "tiki-271998812");
        assert_eq!(product.title, "Tai nghe Bluetooth");
        assert_eq!(
            product.url,
            "https://tiki.vn/tai-nghe-bluetooth-p271998812.html?spid=271998813"
        );
        assert_eq!(product.price, Some(Decimal::from(250_000)));
        assert_eq!(product.rating, Some(Decimal::from_str("4.6").unwrap()));
        assert!(product.image.is_some());
        assert!(product.affiliate_tag.is_none());
    }

    #[test]
    fn zero_rating_and_blank_name_degrade() {
        let mut raw = item();
        raw.rating_average = Some(0.0);
        raw.name = Some("   ".to_string());

        let product = extract_from_payload(&raw, "https://tiki.vn").unwrap();
        assert!(product.rating.is_none());
        assert_eq!(product.title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn missing_id_fails() {
        let mut raw = item();
        raw.id = None;
        let err = extract_from_payload(&raw, "https://tiki.vn").unwrap_err();
        assert!(matches!(err, ScraperError::MissingIdentifier { .. }));
    }

    #[test]
    fn listing_response_tolerates_missing_data_key() {
        let response: ListingResponse = serde_json::from_str(r#"{"paging": {}}"#).unwrap();
        assert!(response.data.is_empty());
    }
}
