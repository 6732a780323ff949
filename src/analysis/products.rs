//! Product matching: query building from a skin profile, multi-condition search,
//! deduplication and ranking.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::analysis::catalog;
use crate::analysis::diagnosis::Recommendations;
use crate::models::SkinProfile;
use crate::utils::google_search::ProductSearch;

/// Conditions searched per analysis.
const MAX_CONDITIONS: usize = 3;
/// Ingredient-specific searches per analysis.
const MAX_INGREDIENT_QUERIES: usize = 2;
const INGREDIENT_RESULTS: u32 = 5;
/// Products returned to the client.
const MAX_PRODUCTS: usize = 10;

/// A product as returned to clients, whether found by web search or taken from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
    /// Explicit category (Cleanser, Serum, ...) when the source knows it.
    #[serde(default, rename = "type")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub rank: usize,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub conditions_matched: Vec<String>,
    #[serde(default)]
    pub final_score: Option<f64>,
}

impl Product {
    /// Score used for ordering: final score when ranked, relevance otherwise.
    pub fn score(&self) -> f64 {
        self.final_score.unwrap_or(self.relevance_score)
    }

    /// Identity for deduplication: URL when known, lowercased name otherwise.
    fn dedup_key(&self) -> String {
        if self.url.is_empty() {
            self.name.to_lowercase()
        } else {
            self.url.clone()
        }
    }
}

/// Query refinements derived from what the user told us about their skin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub brand: Option<String>,
    pub product_type: Option<String>,
    pub skin_type: Option<String>,
    pub ingredients_include: Vec<String>,
    pub ingredients_exclude: Vec<String>,
}

impl SearchFilters {
    pub fn from_profile(profile: Option<&SkinProfile>) -> Self {
        let Some(profile) = profile else {
            return Self::default();
        };

        let mut filters = Self {
            ingredients_exclude: profile.data.allergies.clone(),
            skin_type: profile.data.skin_type.map(|t| t.as_str().to_string()),
            ..Default::default()
        };

        if profile.has_high_sensitivity() {
            filters.ingredients_include = ["fragrance-free", "gentle", "hypoallergenic"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        }

        filters
    }
}

/// Assemble the final query string from a base query, an optional condition and filters.
pub fn build_query(base: &str, condition: Option<&str>, filters: &SearchFilters) -> String {
    let mut parts = vec![base.trim().to_string()];

    if let Some(condition) = condition {
        let condition = condition.replace('_', " ");
        if !base.to_lowercase().contains(&condition.to_lowercase()) {
            parts.push(format!("for {}", condition));
        }
    }

    if let Some(brand) = &filters.brand {
        parts.push(brand.clone());
    }
    if let Some(product_type) = &filters.product_type {
        parts.push(product_type.clone());
    }
    if !filters.ingredients_include.is_empty() {
        parts.push(format!("with {}", filters.ingredients_include.join(" ")));
    }
    for ingredient in &filters.ingredients_exclude {
        parts.push(format!("-{}", ingredient.trim().replace(' ', "-")));
    }

    parts.join(" ")
}

/// Merge per-condition result lists: the first occurrence of a URL wins and
/// collects every condition it was found for; then score and sort.
pub fn dedupe_and_rank(products_by_condition: Vec<(String, Vec<Product>)>) -> Vec<Product> {
    let mut unique: Vec<Product> = Vec::new();

    for (condition, products) in products_by_condition {
        for mut product in products {
            if product.url.is_empty() {
                continue;
            }
            match unique.iter_mut().find(|existing| existing.url == product.url) {
                Some(existing) => {
                    if !existing.conditions_matched.contains(&condition) {
                        existing.conditions_matched.push(condition.clone());
                    }
                }
                None => {
                    product.conditions_matched = vec![condition.clone()];
                    unique.push(product);
                }
            }
        }
    }

    for product in unique.iter_mut() {
        let mut score = product.relevance_score;
        score += product.conditions_matched.len() as f64 * 0.1;
        if product.rating.is_some() {
            score += 0.1;
        }
        if product.price.is_some() {
            score += 0.05;
        }
        product.final_score = Some(score.min(1.0));
    }

    sort_by_score(&mut unique);
    unique
}

fn sort_by_score(products: &mut [Product]) {
    products.sort_by(|a, b| b.score().total_cmp(&a.score()));
}

/// Search once per condition and merge the results. Failed queries are skipped.
pub async fn search_for_conditions(
    search: &dyn ProductSearch,
    conditions: &[String],
    profile: Option<&SkinProfile>,
    max_results: u32,
) -> Vec<Product> {
    let filters = SearchFilters::from_profile(profile);
    let mut by_condition = Vec::with_capacity(conditions.len());

    for condition in conditions {
        let readable = condition.replace('_', " ");
        let query = build_query(
            &format!("skincare products for {}", readable),
            Some(condition),
            &filters,
        );

        match search.search(&query, max_results).await {
            Ok(page) => by_condition.push((condition.clone(), page.products)),
            Err(e) => warn!("Product search for '{}' failed: {}", condition, e),
        }
    }

    dedupe_and_rank(by_condition)
}

/// Products found for an analysis, with how they were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductResults {
    pub products: Vec<Product>,
    pub search_queries_used: Vec<String>,
    pub total_found: usize,
    /// `google_search` or `catalog`.
    pub source: String,
}

/// Find products for the recommendations of an analysis.
///
/// With no search backend the curated catalog answers instead.
pub async fn products_for_recommendations(
    search: Option<&dyn ProductSearch>,
    recommendations: &Recommendations,
    profile: Option<&SkinProfile>,
    max_results: u32,
) -> ProductResults {
    let Some(search) = search else {
        warn!("Product search is not enabled, using the curated catalog");
        let products = catalog::catalog_products(&recommendations.conditions);
        return ProductResults {
            total_found: products.len(),
            products: products.into_iter().take(MAX_PRODUCTS).collect(),
            search_queries_used: Vec::new(),
            source: "catalog".to_string(),
        };
    };

    let mut all_products = Vec::new();
    let mut queries_used = Vec::new();

    let conditions: Vec<String> = recommendations
        .conditions
        .iter()
        .take(MAX_CONDITIONS)
        .cloned()
        .collect();

    if !conditions.is_empty() {
        let found = search_for_conditions(search, &conditions, profile, max_results).await;
        if !found.is_empty() {
            queries_used.push(format!("Conditions: {}", conditions.join(", ")));
        }
        all_products.extend(found);
    }

    for ingredient in recommendations
        .recommended_ingredients
        .iter()
        .take(MAX_INGREDIENT_QUERIES)
    {
        let query = format!("skincare {} serum", ingredient);
        match search.search(&query, INGREDIENT_RESULTS).await {
            Ok(page) => {
                all_products.extend(page.products);
                queries_used.push(query);
            }
            Err(e) => warn!("Ingredient search '{}' failed: {}", query, e),
        }
    }

    let mut seen = HashSet::new();
    let mut unique: Vec<Product> = all_products
        .into_iter()
        .filter(|p| !p.url.is_empty() && seen.insert(p.url.clone()))
        .collect();

    sort_by_score(&mut unique);
    let total_found = unique.len();
    unique.truncate(MAX_PRODUCTS);

    info!(
        "Found {} unique products across {} queries",
        total_found,
        queries_used.len()
    );

    ProductResults {
        products: unique,
        search_queries_used: queries_used,
        total_found,
        source: "google_search".to_string(),
    }
}

/// Products for a bare list of conditions: live search when available, catalog otherwise.
pub async fn products_for_conditions(
    search: Option<&dyn ProductSearch>,
    conditions: &[String],
    max_results: u32,
) -> ProductResults {
    match search {
        Some(search) => {
            let products = search_for_conditions(search, conditions, None, max_results).await;
            debug!("Live search returned {} products", products.len());
            ProductResults {
                total_found: products.len(),
                search_queries_used: conditions
                    .iter()
                    .map(|c| format!("skincare products for {}", c.replace('_', " ")))
                    .collect(),
                products,
                source: "google_search".to_string(),
            }
        }
        None => {
            let products = catalog::catalog_products(conditions);
            ProductResults {
                total_found: products.len(),
                products,
                search_queries_used: Vec::new(),
                source: "catalog".to_string(),
            }
        }
    }
}

/// Remove later duplicates, keeping the first occurrence of each product.
pub fn dedupe(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Level, SkinProfileData, SkinType};
    use crate::utils::google_search::{MockProductSearch, SearchError, SearchPage};
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use uuid::Uuid;

    fn product(name: &str, url: &str, relevance: f64) -> Product {
        Product {
            name: name.to_string(),
            url: url.to_string(),
            relevance_score: relevance,
            ..Default::default()
        }
    }

    fn page(products: Vec<Product>) -> SearchPage {
        SearchPage {
            products,
            ..Default::default()
        }
    }

    fn sensitive_profile() -> SkinProfile {
        SkinProfile::new(
            Uuid::new_v4(),
            SkinProfileData {
                skin_type: Some(SkinType::Dry),
                sensitivity_level: Some(Level::High),
                allergies: vec!["fragrance".to_string(), "tea tree oil".to_string()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_filters_from_profile() {
        assert_eq!(SearchFilters::from_profile(None), SearchFilters::default());

        let filters = SearchFilters::from_profile(Some(&sensitive_profile()));
        assert_eq!(filters.ingredients_exclude, vec!["fragrance", "tea tree oil"]);
        assert_eq!(
            filters.ingredients_include,
            vec!["fragrance-free", "gentle", "hypoallergenic"]
        );
        assert_eq!(filters.skin_type.as_deref(), Some("dry"));
    }

    #[test_case("skincare products for acne", Some("acne"), "skincare products for acne" ; "condition already in base")]
    #[test_case("moisturizer", Some("dark_spots"), "moisturizer for dark spots" ; "condition appended")]
    #[test_case("  spf  ", None, "spf" ; "base trimmed")]
    fn test_build_query_without_filters(base: &str, condition: Option<&str>, expected: &str) {
        assert_eq!(build_query(base, condition, &SearchFilters::default()), expected);
    }

    #[test]
    fn test_build_query_with_filters() {
        let filters = SearchFilters::from_profile(Some(&sensitive_profile()));
        assert_eq!(
            build_query("skincare products for acne", Some("acne"), &filters),
            "skincare products for acne with fragrance-free gentle hypoallergenic -fragrance -tea-tree-oil"
        );
    }

    #[test]
    fn test_build_query_leaves_skin_type_out() {
        let filters = SearchFilters {
            skin_type: Some("oily".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_query("skincare products for acne", Some("acne"), &filters),
            "skincare products for acne"
        );
    }

    /// Tests that duplicates merge their conditions and scores include the boosts.
    #[test]
    fn test_dedupe_and_rank() {
        let mut rated = product("Rated", "https://x/rated", 0.5);
        rated.rating = Some(4.5);
        rated.price = Some(12.0);

        let ranked = dedupe_and_rank(vec![
            (
                "acne".to_string(),
                vec![product("Shared", "https://x/shared", 0.5), rated],
            ),
            (
                "redness".to_string(),
                vec![
                    product("Shared again", "https://x/shared", 0.9),
                    product("No url", "", 1.0),
                ],
            ),
        ]);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Rated");
        assert!((ranked[0].final_score.unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(ranked[1].name, "Shared");
        assert_eq!(ranked[1].conditions_matched, vec!["acne", "redness"]);
        assert!((ranked[1].final_score.unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_dedupe_and_rank_caps_score() {
        let mut best = product("Best", "https://x/best", 1.0);
        best.rating = Some(5.0);
        let ranked = dedupe_and_rank(vec![("acne".to_string(), vec![best])]);
        assert_eq!(ranked[0].final_score, Some(1.0));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let products = vec![
            product("A", "https://x/a", 0.1),
            product("A copy", "https://x/a", 0.9),
            product("Catalog item", "", 0.0),
            product("catalog ITEM", "", 0.0),
        ];
        let deduped = dedupe(products);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "A");
        assert_eq!(deduped[1].name, "Catalog item");
    }

    /// Tests that a failing condition query does not abort the others.
    #[tokio::test]
    async fn test_search_for_conditions_skips_failures() {
        let mut search = MockProductSearch::new();
        search
            .expect_search()
            .withf(|query, max| query == "skincare products for acne" && *max == 10)
            .times(1)
            .returning(|_, _| Ok(page(vec![product("Acne gel", "https://x/gel", 0.5)])));
        search
            .expect_search()
            .withf(|query, max| query == "skincare products for dark spots" && *max == 10)
            .times(1)
            .returning(|_, _| Err(SearchError::Json(serde_json::from_str::<u8>("x").unwrap_err())));

        let conditions = vec!["acne".to_string(), "dark_spots".to_string()];
        let products = search_for_conditions(&search, &conditions, None, 10).await;

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].conditions_matched, vec!["acne"]);
    }

    /// Tests condition and ingredient searches being merged, deduplicated and capped.
    #[tokio::test]
    async fn test_products_for_recommendations() {
        let mut search = MockProductSearch::new();
        search
            .expect_search()
            .withf(|query, _| query.starts_with("skincare products for"))
            .times(3)
            .returning(|query, _| {
                let slug = query.replace(' ', "-");
                Ok(page(
                    (0..4)
                        .map(|i| product(&format!("{} {}", query, i), &format!("https://x/{}/{}", slug, i), 0.5))
                        .collect(),
                ))
            });
        search
            .expect_search()
            .withf(|query, max| query == "skincare niacinamide serum" && *max == 5)
            .times(1)
            .returning(|_, _| Ok(page(vec![product("Dup", "https://x/skincare-products-for-acne/0", 0.9)])));
        search
            .expect_search()
            .withf(|query, max| query == "skincare retinol serum" && *max == 5)
            .times(1)
            .returning(|_, _| Ok(page(vec![product("Retinol", "https://x/retinol", 0.95)])));

        let recommendations = Recommendations {
            conditions: vec![
                "acne".to_string(),
                "redness".to_string(),
                "wrinkles".to_string(),
                "rosacea".to_string(),
            ],
            recommended_ingredients: vec![
                "niacinamide".to_string(),
                "retinol".to_string(),
                "spf".to_string(),
            ],
            ..Default::default()
        };

        let results = products_for_recommendations(Some(&search), &recommendations, None, 10).await;

        assert_eq!(results.source, "google_search");
        assert_eq!(results.total_found, 13);
        assert_eq!(results.products.len(), 10);
        assert_eq!(results.products[0].name, "Retinol");
        assert_eq!(
            results.search_queries_used,
            vec![
                "Conditions: acne, redness, wrinkles",
                "skincare niacinamide serum",
                "skincare retinol serum"
            ]
        );
    }

    #[tokio::test]
    async fn test_products_for_recommendations_without_search_uses_catalog() {
        let recommendations = Recommendations {
            conditions: vec!["acne".to_string()],
            ..Default::default()
        };

        let results = products_for_recommendations(None, &recommendations, None, 10).await;

        assert_eq!(results.source, "catalog");
        assert_eq!(results.products.len(), 2);
        assert!(results.search_queries_used.is_empty());
    }
}
