//! Product extraction from retail pages and the marketplace listing API.

pub mod client;
pub mod error;
pub mod ident;
pub mod normalize;
pub mod page;
pub mod payload;
pub(crate) mod rate_limit;

pub use client::{MarketplaceClient, PageClient};
pub use error::ScraperError;
pub use ident::{extract_affiliate_tag, extract_external_id};
pub use normalize::{collapse_whitespace, parse_price, parse_rating};
pub use page::parse_product_page;
pub use payload::{extract_from_payload, ListingItem, ListingResponse, MARKETPLACE_ID_PREFIX};
