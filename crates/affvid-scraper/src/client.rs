//! HTTP clients for product pages and the marketplace listing API.

use std::time::Duration;

use affvid_core::ExtractedProduct;
use reqwest::{header, Client, StatusCode};

use crate::error::ScraperError;
use crate::ident::extract_external_id;
use crate::page::parse_product_page;
use crate::payload::{ListingItem, ListingResponse};
use crate::rate_limit::retry_with_backoff;

const PAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, ScraperError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Maps a non-2xx response to a typed error.
fn status_error(response: &reqwest::Response, url: &str) -> ScraperError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return ScraperError::RateLimited {
            domain: host_of(url),
            retry_after_secs,
        };
    }
    if status == StatusCode::NOT_FOUND {
        return ScraperError::NotFound {
            url: url.to_owned(),
        };
    }
    ScraperError::UnexpectedStatus {
        status: status.as_u16(),
        url: url.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// PageClient
// ---------------------------------------------------------------------------

/// Fetches and parses retail product pages.
///
/// Requests carry a browser-like header set; `reqwest` negotiates
/// gzip/deflate/brotli transparently. Transient failures are retried with
/// exponential backoff and jitter up to `max_retries` additional attempts.
pub struct PageClient {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PageClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches the raw markup of `url`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] on 429 after all retries.
    /// - [`ScraperError::NotFound`] on 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`] on any other non-2xx (5xx retried).
    /// - [`ScraperError::Http`] on network failure after all retries.
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let response = self
                .client
                .get(url)
                .header(header::ACCEPT, PAGE_ACCEPT)
                .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
                .header("DNT", "1")
                .header("Upgrade-Insecure-Requests", "1")
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(status_error(&response, url));
            }

            Ok(response.text().await?)
        })
        .await
    }

    /// Extracts one product from its page URL.
    ///
    /// The identifier is checked before any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MissingIdentifier`] if `url` has no product
    /// code, or any error from [`PageClient::fetch_page`].
    pub async fn scrape_product(&self, url: &str) -> Result<ExtractedProduct, ScraperError> {
        if extract_external_id(url).is_none() {
            return Err(ScraperError::MissingIdentifier {
                url: url.to_owned(),
            });
        }

        let html = self.fetch_page(url).await?;
        let product = parse_product_page(&html, url)?;

        tracing::debug!(
            external_id = %product.external_id,
            url,
            has_price = product.price.is_some(),
            has_rating = product.rating.is_some(),
            "product page extracted"
        );
        Ok(product)
    }
}

// ---------------------------------------------------------------------------
// MarketplaceClient
// ---------------------------------------------------------------------------

/// Client for the marketplace's public `/api/v2/products` search listing.
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
    inter_page_delay: Duration,
}

impl MarketplaceClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_retries,
            backoff_base_ms,
            inter_page_delay: Duration::from_secs(1),
        })
    }

    /// Sets the pause between consecutive listing pages.
    #[must_use]
    pub fn with_inter_page_delay(mut self, delay: Duration) -> Self {
        self.inter_page_delay = delay;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches `pages` listing pages of `limit` items for `keyword`.
    ///
    /// A page that answers with a non-2xx status is logged and skipped; the
    /// remaining pages are still fetched.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] on network failure after all retries,
    /// or [`ScraperError::Deserialize`] if a page body is not a listing.
    pub async fn search(
        &self,
        keyword: &str,
        limit: u32,
        pages: u32,
    ) -> Result<Vec<ListingItem>, ScraperError> {
        let mut items = Vec::new();

        for page in 1..=pages {
            if page > 1 && !self.inter_page_delay.is_zero() {
                tokio::time::sleep(self.inter_page_delay).await;
            }

            match self.fetch_listing_page(keyword, limit, page).await {
                Ok(response) => {
                    tracing::debug!(
                        keyword,
                        page,
                        count = response.data.len(),
                        "listing page fetched"
                    );
                    items.extend(response.data);
                }
                Err(
                    e @ (ScraperError::UnexpectedStatus { .. }
                    | ScraperError::NotFound { .. }
                    | ScraperError::RateLimited { .. }),
                ) => {
                    tracing::warn!(keyword, page, error = %e, "listing page skipped");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(items)
    }

    async fn fetch_listing_page(
        &self,
        keyword: &str,
        limit: u32,
        page: u32,
    ) -> Result<ListingResponse, ScraperError> {
        let url = format!("{}/api/v2/products", self.base_url);
        let limit = limit.to_string();
        let page = page.to_string();

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let query = [("q", keyword), ("limit", limit.as_str()), ("page", page.as_str())];
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header(header::ACCEPT, "application/json")
                    .query(&query)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(status_error(&response, &url));
                }

                let body = response.text().await?;
                serde_json::from_str::<ListingResponse>(&body).map_err(|e| {
                    ScraperError::Deserialize {
                        context: format!("listing page from {url}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }
}
