//! Curated fallback catalog, used when live product search is unavailable.

use std::sync::LazyLock;

use crate::analysis::products::{Product, dedupe};

struct CatalogEntry {
    name: &'static str,
    brand: &'static str,
    price: f64,
    rating: f64,
    description: &'static str,
    image: &'static str,
    product_type: &'static str,
}

impl CatalogEntry {
    fn to_product(&self, condition: &str) -> Product {
        Product {
            name: self.name.to_string(),
            description: self.description.to_string(),
            source: Some("catalog".to_string()),
            image: Some(self.image.to_string()),
            brand: Some(self.brand.to_string()),
            price: Some(self.price),
            currency: Some("USD".to_string()),
            rating: Some(self.rating),
            product_type: Some(self.product_type.to_string()),
            conditions_matched: vec![condition.to_string()],
            ..Default::default()
        }
    }
}

static CATALOG: LazyLock<Vec<(&'static str, Vec<CatalogEntry>)>> = LazyLock::new(|| {
    vec![
        (
            "acne",
            vec![
                CatalogEntry {
                    name: "CeraVe Acne Foaming Cream Cleanser",
                    brand: "CeraVe",
                    price: 16.99,
                    rating: 4.5,
                    description: "Contains benzoyl peroxide to treat acne",
                    image: "/cerave-acne-cleanser.jpg",
                    product_type: "Cleanser",
                },
                CatalogEntry {
                    name: "The Ordinary Niacinamide 10% + Zinc 1%",
                    brand: "The Ordinary",
                    price: 12.90,
                    rating: 4.6,
                    description: "Reduces blemishes and balances oil production",
                    image: "/ordinary-niacinamide.jpg",
                    product_type: "Serum",
                },
            ],
        ),
        (
            "hyperpigmentation",
            vec![
                CatalogEntry {
                    name: "Paula's Choice 10% Azelaic Acid Booster",
                    brand: "Paula's Choice",
                    price: 36.00,
                    rating: 4.7,
                    description: "Reduces dark spots and evens skin tone",
                    image: "/paula-choice-azelaic.jpg",
                    product_type: "Treatment",
                },
                CatalogEntry {
                    name: "The Ordinary Vitamin C Suspension 23%",
                    brand: "The Ordinary",
                    price: 7.20,
                    rating: 4.3,
                    description: "Brightens skin and reduces dark spots",
                    image: "/ordinary-vitamin-c.jpg",
                    product_type: "Serum",
                },
            ],
        ),
        (
            "dry_skin",
            vec![CatalogEntry {
                name: "CeraVe Moisturizing Cream",
                brand: "CeraVe",
                price: 19.99,
                rating: 4.8,
                description: "Rich moisturizer with ceramides and hyaluronic acid",
                image: "/cerave-moisturizer.jpg",
                product_type: "Moisturizer",
            }],
        ),
        (
            "wrinkles",
            vec![CatalogEntry {
                name: "The Ordinary Retinol 0.5% in Squalane",
                brand: "The Ordinary",
                price: 9.80,
                rating: 4.4,
                description: "Anti-aging retinol treatment",
                image: "/ordinary-retinol.jpg",
                product_type: "Treatment",
            }],
        ),
    ]
});

/// Catalog conditions that a diagnosed condition maps onto.
fn catalog_keys(condition: &str) -> &[&'static str] {
    match condition {
        "acne" | "blackheads" | "whiteheads" | "oily" | "enlarged_pores" => &["acne"],
        "hyperpigmentation" | "dark_spots" | "sun_damage" => &["hyperpigmentation"],
        "dry_skin" | "dryness" | "eczema" => &["dry_skin"],
        "wrinkles" | "fine_lines" | "aging_signs" => &["wrinkles"],
        _ => &[],
    }
}

/// Catalog products for the given conditions, deduplicated by name and sorted by rating (best first).
pub fn catalog_products(conditions: &[String]) -> Vec<Product> {
    let mut products = Vec::new();

    for condition in conditions {
        for key in catalog_keys(condition) {
            if let Some((_, entries)) = CATALOG.iter().find(|(name, _)| name == key) {
                products.extend(entries.iter().map(|entry| entry.to_product(condition)));
            }
        }
    }

    let mut unique = dedupe(products);
    unique.sort_by(|a, b| {
        b.rating
            .unwrap_or_default()
            .total_cmp(&a.rating.unwrap_or_default())
    });
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_catalog_sorted_by_rating() {
        let products =
            catalog_products(&["acne".to_string(), "hyperpigmentation".to_string()]);

        assert_eq!(
            names(&products),
            vec![
                "Paula's Choice 10% Azelaic Acid Booster",
                "The Ordinary Niacinamide 10% + Zinc 1%",
                "CeraVe Acne Foaming Cream Cleanser",
                "The Ordinary Vitamin C Suspension 23%",
            ]
        );
    }

    #[test]
    fn test_catalog_deduplicates_overlapping_conditions() {
        let products = catalog_products(&["acne".to_string(), "blackheads".to_string()]);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].conditions_matched, vec!["acne"]);
    }

    #[rstest]
    #[case("dryness", "CeraVe Moisturizing Cream")]
    #[case("fine_lines", "The Ordinary Retinol 0.5% in Squalane")]
    #[case("dark_spots", "Paula's Choice 10% Azelaic Acid Booster")]
    fn test_catalog_aliases(#[case] condition: &str, #[case] first: &str) {
        let products = catalog_products(&[condition.to_string()]);
        assert_eq!(products[0].name, first);
    }

    #[test]
    fn test_catalog_unknown_condition_is_empty() {
        assert!(catalog_products(&["rosacea".to_string()]).is_empty());
        assert!(catalog_products(&[]).is_empty());
    }
}
