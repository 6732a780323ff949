//! Utilities for interacting with the Google Custom Search JSON API.
//! Requires `GOOGLE_API_KEY` and `GOOGLE_SEARCH_ENGINE_ID`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error};

use crate::analysis::products::Product;

/// The API never returns more than this many items per request.
pub const MAX_RESULTS_PER_REQUEST: u32 = 10;

/// Retailers whose listings are treated as more trustworthy product pages.
const KNOWN_RETAILERS: [&str; 6] = [
    "sephora",
    "ulta",
    "dermstore",
    "lookfantastic",
    "cultbeauty",
    "beautylish",
];

/// Errors that can occur during Custom Search API interactions.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Error during HTTP request communication, including non-2xx statuses.
    #[error("API communication failure: {0}")]
    Api(#[from] reqwest::Error),

    /// Error parsing the JSON response from the API.
    #[error("Unable to parse response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings applied to every query.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub safe: String,
    pub country: String,
    pub language: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            safe: "active".to_string(),
            country: "us".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Raw response body of `GET /customsearch/v1`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
    #[serde(default)]
    pub search_information: Option<SearchInformation>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInformation {
    #[serde(default)]
    pub search_time: f64,
    /// The API reports this as a string.
    #[serde(default)]
    pub total_results: String,
}

/// A single result item.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub display_link: Option<String>,
    /// Structured data scraped from the page, keyed by object type (`offer`, `product`, `metatags`, ...).
    #[serde(default)]
    pub pagemap: Option<HashMap<String, Vec<Map<String, Value>>>>,
}

impl SearchItem {
    fn pagemap_first(&self, kind: &str) -> Option<&Map<String, Value>> {
        self.pagemap.as_ref()?.get(kind)?.first()
    }

    fn has_pagemap(&self, kind: &str) -> bool {
        self.pagemap
            .as_ref()
            .is_some_and(|pagemap| pagemap.contains_key(kind))
    }

    /// Product image: the CSE thumbnail first, otherwise the first `og:image` metatag.
    pub fn image(&self) -> Option<String> {
        if let Some(src) = self.pagemap_first("cse_image").and_then(|m| str_field(m, "src")) {
            return Some(src);
        }

        self.pagemap
            .as_ref()?
            .get("metatags")?
            .iter()
            .find_map(|metatag| str_field(metatag, "og:image"))
    }

    /// Base 0.5, +0.3 for a known retailer, +0.2 for structured product data, capped at 1.0.
    pub fn relevance(&self) -> f64 {
        let mut score: f64 = 0.5;

        let domain = self.display_link.as_deref().unwrap_or_default().to_lowercase();
        if KNOWN_RETAILERS.iter().any(|retailer| domain.contains(retailer)) {
            score += 0.3;
        }

        if self.has_pagemap("product") {
            score += 0.2;
        }

        score.min(1.0)
    }

    /// Reshape the item into a [`Product`] at 1-based position `rank`.
    pub fn into_product(self, rank: usize) -> Product {
        let image = self.image();
        let relevance_score = self.relevance();

        let offer = self.pagemap_first("offer");
        let price = offer.and_then(|o| str_field(o, "price")).and_then(|p| parse_number(&p));
        let currency = offer.map(|o| str_field(o, "pricecurrency").unwrap_or_else(|| "USD".to_string()));
        let availability =
            offer.map(|o| str_field(o, "availability").unwrap_or_else(|| "unknown".to_string()));

        let product_info = self.pagemap_first("product");
        let mut brand = product_info.and_then(|p| str_field(p, "brand"));
        let rating = product_info
            .and_then(|p| str_field(p, "ratingvalue"))
            .and_then(|r| parse_number(&r));
        let review_count = product_info
            .and_then(|p| str_field(p, "reviewcount"))
            .and_then(|r| r.trim().replace(',', "").parse::<u32>().ok());

        if brand.is_none() {
            brand = self
                .pagemap_first("metatags")
                .and_then(|m| str_field(m, "og:brand").or_else(|| str_field(m, "product:brand")));
        }

        Product {
            name: self.title.unwrap_or_else(|| "Unknown Product".to_string()),
            description: self.snippet.unwrap_or_default(),
            url: self.link.unwrap_or_default(),
            source: self.display_link,
            image,
            brand,
            price,
            currency,
            availability,
            rating,
            review_count,
            product_type: None,
            rank,
            relevance_score,
            conditions_matched: Vec::new(),
            final_score: None,
        }
    }
}

/// Read a pagemap field as a string. Numbers are stringified.
fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse numbers like `"$16.99"` or `"4.5"`.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// One page of reshaped results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub query: String,
    pub products: Vec<Product>,
    pub search_time: f64,
    pub total_available: String,
}

/// A web search backend that returns product-shaped results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchPage, SearchError>;
}

/// Google Custom Search backed [`ProductSearch`].
pub struct GoogleSearch {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
    settings: SearchSettings,
}

impl GoogleSearch {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            settings,
        }
    }
}

#[async_trait]
impl ProductSearch for GoogleSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchPage, SearchError> {
        let url = format!("{}/customsearch/v1", self.base_url.trim_end_matches('/'));
        let num = max_results.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();
        let lr = format!("lang_{}", self.settings.language);

        debug!("Searching products: {}", query);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("safe", self.settings.safe.as_str()),
                ("gl", self.settings.country.as_str()),
                ("lr", lr.as_str()),
            ])
            .header("Accept", "application/json")
            .send()
            .await?;

        // Convert HTTP error status into our custom API error.
        let response = response.error_for_status().map_err(|e| {
            error!("Custom Search API error: {}", e);
            SearchError::Api(e)
        })?;

        let body = response.text().await?;
        let parsed: CustomSearchResponse = serde_json::from_str(&body)?;
        let info = parsed.search_information.unwrap_or_default();

        let products = parsed
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| item.into_product(idx + 1))
            .collect::<Vec<_>>();

        debug!("Query '{}' returned {} products", query, products.len());

        Ok(SearchPage {
            query: query.to_string(),
            products,
            search_time: info.search_time,
            total_available: if info.total_results.is_empty() {
                "0".to_string()
            } else {
                info.total_results
            },
        })
    }
}

/// Module containing tests for the Custom Search utility functions.
#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GoogleSearch {
        GoogleSearch::new(
            Client::new(),
            server.uri(),
            "test-key",
            "test-cx",
            SearchSettings::default(),
        )
    }

    fn item(value: Value) -> SearchItem {
        serde_json::from_value(value).unwrap()
    }

    /// Tests relevance boosts for retailer domains and structured product data.
    #[test]
    fn test_relevance_scoring() {
        assert_eq!(item(json!({ "displayLink": "blog.example.com" })).relevance(), 0.5);
        assert_eq!(item(json!({ "displayLink": "www.Sephora.com" })).relevance(), 0.8);
        assert_eq!(
            item(json!({ "displayLink": "www.ulta.com", "pagemap": { "product": [{}] } })).relevance(),
            1.0
        );
        assert_eq!(
            item(json!({ "displayLink": "shop.example", "pagemap": { "product": [{}] } })).relevance(),
            0.7
        );
    }

    #[test]
    fn test_image_prefers_cse_image_then_og_image() {
        let with_cse = item(json!({
            "pagemap": {
                "cse_image": [{ "src": "https://img/cse.jpg" }],
                "metatags": [{ "og:image": "https://img/og.jpg" }]
            }
        }));
        assert_eq!(with_cse.image().as_deref(), Some("https://img/cse.jpg"));

        let og_only = item(json!({
            "pagemap": { "metatags": [{ "viewport": "x" }, { "og:image": "https://img/og.jpg" }] }
        }));
        assert_eq!(og_only.image().as_deref(), Some("https://img/og.jpg"));

        assert_eq!(item(json!({})).image(), None);
    }

    /// Tests that offer, product and metatag data are lifted into the product.
    #[test]
    fn test_into_product_extracts_metadata() {
        let product = item(json!({
            "title": "CeraVe Hydrating Cleanser",
            "snippet": "Gentle cleanser with ceramides",
            "link": "https://www.ulta.com/cerave",
            "displayLink": "www.ulta.com",
            "pagemap": {
                "offer": [{ "price": "$16.99", "availability": "InStock" }],
                "product": [{ "brand": "CeraVe", "ratingvalue": "4.7", "reviewcount": "1,204" }]
            }
        }))
        .into_product(3);

        assert_eq!(product.name, "CeraVe Hydrating Cleanser");
        assert_eq!(product.url, "https://www.ulta.com/cerave");
        assert_eq!(product.source.as_deref(), Some("www.ulta.com"));
        assert_eq!(product.price, Some(16.99));
        assert_eq!(product.currency.as_deref(), Some("USD"));
        assert_eq!(product.availability.as_deref(), Some("InStock"));
        assert_eq!(product.brand.as_deref(), Some("CeraVe"));
        assert_eq!(product.rating, Some(4.7));
        assert_eq!(product.review_count, Some(1204));
        assert_eq!(product.rank, 3);
        assert_eq!(product.relevance_score, 1.0);
    }

    #[test]
    fn test_into_product_defaults_and_brand_fallback() {
        let product = item(json!({
            "link": "https://example.com/p",
            "pagemap": { "metatags": [{ "product:brand": "The Ordinary" }] }
        }))
        .into_product(1);

        assert_eq!(product.name, "Unknown Product");
        assert_eq!(product.description, "");
        assert_eq!(product.brand.as_deref(), Some("The Ordinary"));
        assert_eq!(product.price, None);
        assert_eq!(product.currency, None);
    }

    /// Tests the `search` function with a successful mock API response.
    #[tokio::test]
    async fn test_search_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("key", "test-key"))
            .and(query_param("cx", "test-cx"))
            .and(query_param("q", "niacinamide serum"))
            .and(query_param("num", "5"))
            .and(query_param("safe", "active"))
            .and(query_param("gl", "us"))
            .and(query_param("lr", "lang_en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "searchInformation": { "searchTime": 0.21, "totalResults": "1240" },
                "items": [
                    { "title": "Niacinamide 10%", "link": "https://a.example/1", "displayLink": "a.example" },
                    { "title": "Niacinamide Booster", "link": "https://www.sephora.com/2", "displayLink": "www.sephora.com" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).search("niacinamide serum", 5).await.unwrap();

        assert_eq!(page.query, "niacinamide serum");
        assert_eq!(page.total_available, "1240");
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[0].rank, 1);
        assert_eq!(page.products[1].rank, 2);
        assert_eq!(page.products[1].relevance_score, 0.8);
        server.verify().await;
    }

    /// Tests that more than ten results are never requested.
    #[tokio::test]
    async fn test_search_clamps_num() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).search("spf", 50).await.unwrap();
        assert!(page.products.is_empty());
        assert_eq!(page.total_available, "0");
        server.verify().await;
    }

    /// Tests the `search` function handling a non-2xx HTTP status code from the mock API.
    #[tokio::test]
    async fn test_search_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client_for(&server).search("retinol", 10).await;

        match result {
            Err(SearchError::Api(e)) => {
                assert!(e.is_status());
                assert_eq!(e.status(), Some(reqwest::StatusCode::FORBIDDEN));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).search("retinol", 10).await;
        assert_matches!(result, Err(SearchError::Json(_)));
    }
}
