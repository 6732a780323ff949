//! Slots products into morning and evening routine steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::products::Product;

const MAX_TREATMENTS: usize = 2;
const DEFAULT_TIMELINE: &str = "Expect to see improvements in 4-6 weeks with consistent use";
const NOTES: [&str; 3] = [
    "Introduce new products one at a time (wait 1 week between additions)",
    "Always patch test new products",
    "Consistency is key - stick to routine for best results",
];

/// Where a product fits in a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductCategory {
    Cleanser,
    Treatment,
    Moisturizer,
    Sunscreen,
}

impl ProductCategory {
    /// Explicit type wins; otherwise the name decides, sunscreen first so an
    /// "SPF 30 moisturizing cream" is not mistaken for a plain moisturizer.
    pub fn of(product: &Product) -> Option<Self> {
        if let Some(kind) = product.product_type.as_deref() {
            if let Some(category) = Self::from_keywords(&kind.to_lowercase()) {
                return Some(category);
            }
        }
        Self::from_keywords(&product.name.to_lowercase())
    }

    fn from_keywords(text: &str) -> Option<Self> {
        if text.contains("sunscreen") || text.contains("spf") {
            Some(ProductCategory::Sunscreen)
        } else if text.contains("cleanser") {
            Some(ProductCategory::Cleanser)
        } else if text.contains("serum") || text.contains("treatment") {
            Some(ProductCategory::Treatment)
        } else if text.contains("moisturizer") || text.contains("cream") {
            Some(ProductCategory::Moisturizer)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineStep {
    pub step: u32,
    pub action: String,
    pub product: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub duration: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub morning: Vec<RoutineStep>,
    pub evening: Vec<RoutineStep>,
    pub key_ingredients: Vec<String>,
    pub timeline: String,
    pub notes: Vec<String>,
    pub total_products: usize,
    pub estimated_cost: f64,
    pub generated_at: DateTime<Utc>,
}

/// Builds one routine, numbering steps from 1 as they are added.
struct StepList {
    steps: Vec<RoutineStep>,
}

impl StepList {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn push(&mut self, action: &str, product: &Product, duration: &str, instructions: &str) {
        self.steps.push(RoutineStep {
            step: self.steps.len() as u32 + 1,
            action: action.to_string(),
            product: product.name.clone(),
            brand: product.brand.clone(),
            url: (!product.url.is_empty()).then(|| product.url.clone()),
            duration: duration.to_string(),
            instructions: instructions.to_string(),
        });
    }
}

/// Generate the routine for `products`.
///
/// `key_ingredients` comes from the diagnosis; `timeline` falls back to a generic
/// estimate when the diagnosis did not give one.
pub fn generate_routine(
    products: &[Product],
    key_ingredients: &[String],
    timeline: Option<&str>,
) -> Routine {
    let by_category = |category: ProductCategory| -> Vec<&Product> {
        products
            .iter()
            .filter(|p| ProductCategory::of(p) == Some(category))
            .collect()
    };

    let cleansers = by_category(ProductCategory::Cleanser);
    let treatments = by_category(ProductCategory::Treatment);
    let moisturizers = by_category(ProductCategory::Moisturizer);
    let sunscreens = by_category(ProductCategory::Sunscreen);

    let mut morning = StepList::new();
    if let Some(cleanser) = cleansers.first() {
        morning.push(
            "Gentle Cleanser",
            cleanser,
            "1 min",
            "Cleanse face with lukewarm water, massage for 60 seconds, rinse thoroughly",
        );
    }
    for treatment in treatments.iter().take(MAX_TREATMENTS) {
        morning.push(
            "Treatment Serum",
            treatment,
            "30 sec",
            "Apply 2-3 drops, gently pat into skin, wait 1-2 minutes before next step",
        );
    }
    if let Some(moisturizer) = moisturizers.first() {
        morning.push(
            "Moisturizer",
            moisturizer,
            "30 sec",
            "Apply while skin is slightly damp for better absorption",
        );
    }
    if let Some(sunscreen) = sunscreens.first() {
        morning.push(
            "Sunscreen SPF 30+",
            sunscreen,
            "1 min",
            "Apply generously, reapply every 2 hours if outdoors",
        );
    }

    let mut evening = StepList::new();
    if let Some(cleanser) = cleansers.first() {
        evening.push(
            "Double Cleanse",
            cleanser,
            "1 min",
            "First with oil/balm, then with water-based cleanser",
        );
    }
    for treatment in treatments.iter().take(MAX_TREATMENTS) {
        evening.push(
            "Treatment Serum",
            treatment,
            "30 sec",
            "Apply on clean, dry skin",
        );
    }
    if let Some(moisturizer) = moisturizers.first() {
        evening.push(
            "Night Moisturizer",
            moisturizer,
            "1 min",
            "Apply generously as last step to seal in treatments",
        );
    }

    let timeline = timeline
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TIMELINE);

    Routine {
        morning: morning.steps,
        evening: evening.steps,
        key_ingredients: key_ingredients.to_vec(),
        timeline: timeline.to_string(),
        notes: NOTES.iter().map(|n| n.to_string()).collect(),
        total_products: products.len(),
        estimated_cost: products.iter().filter_map(|p| p.price).sum(),
        generated_at: Utc::now(),
    }
}
