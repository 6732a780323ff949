//! Reshapes the vision model's free-text diagnosis into structured fields.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

const CONDITION_KEYWORDS: [&str; 16] = [
    "acne",
    "hyperpigmentation",
    "dark spots",
    "wrinkles",
    "fine lines",
    "rosacea",
    "eczema",
    "dryness",
    "oily",
    "blackheads",
    "whiteheads",
    "enlarged pores",
    "redness",
    "inflammation",
    "aging signs",
    "sun damage",
];

/// Checked in order; the first hit wins.
const SKIN_TYPES: [&str; 5] = ["oily", "dry", "combination", "normal", "sensitive"];

const INGREDIENT_KEYWORDS: [&str; 13] = [
    "niacinamide",
    "retinol",
    "hyaluronic acid",
    "vitamin c",
    "salicylic acid",
    "benzoyl peroxide",
    "azelaic acid",
    "glycolic acid",
    "ceramides",
    "peptides",
    "antioxidants",
    "spf",
    "sunscreen",
];

const PRODUCT_TYPES: [&str; 9] = [
    "cleanser",
    "toner",
    "serum",
    "moisturizer",
    "sunscreen",
    "exfoliant",
    "mask",
    "spot treatment",
    "eye cream",
];

/// Markdown headings (`#` to `####`), optionally wrapped in bold.
static HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{0,3}#{1,4}\s*(?:\d+\.\s*)?\**(.+?)\**\s*$").unwrap()
});

/// Bullet or numbered list items.
static BULLET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").unwrap());

static SEVERITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(mild|moderate|severe)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "mild" => Some(Severity::Mild),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            _ => None,
        }
    }
}

/// Structured view of a diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinAnalysis {
    pub conditions_detected: Vec<String>,
    pub skin_type: String,
    pub severity_assessment: BTreeMap<String, Severity>,
    pub recommended_ingredients: Vec<String>,
    pub recommended_product_types: Vec<String>,
    pub precautions: Vec<String>,
    pub improvement_timeline: String,
    pub full_analysis: String,
}

/// Parse the model's answer. Keyword matching is case-insensitive and keeps keyword order.
pub fn parse_analysis(text: &str) -> SkinAnalysis {
    let lower = text.to_lowercase();

    let conditions_detected: Vec<String> = CONDITION_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| keyword.replace(' ', "_"))
        .collect();

    let skin_type = SKIN_TYPES
        .iter()
        .find(|skin_type| lower.contains(*skin_type))
        .map(|skin_type| skin_type.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let sections = split_sections(text);

    SkinAnalysis {
        severity_assessment: severity_by_condition(text, &conditions_detected),
        recommended_ingredients: keywords_in(&lower, &INGREDIENT_KEYWORDS),
        recommended_product_types: keywords_in(&lower, &PRODUCT_TYPES),
        precautions: section_body(&sections, "precaution")
            .map(bullets)
            .unwrap_or_default(),
        improvement_timeline: section_body(&sections, "timeline")
            .map(|body| body.trim().to_string())
            .unwrap_or_default(),
        conditions_detected,
        skin_type,
        full_analysis: text.to_string(),
    }
}

fn keywords_in(lower: &str, keywords: &[&str]) -> Vec<String> {
    keywords
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// Split markdown into `(heading, body)` pairs. Text before the first heading is dropped.
fn split_sections(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = HEADING_REGEX.captures(line) {
            sections.push((caps[1].trim().to_string(), String::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    sections
}

fn section_body<'a>(sections: &'a [(String, String)], needle: &str) -> Option<&'a str> {
    sections
        .iter()
        .find(|(heading, _)| heading.to_lowercase().contains(needle))
        .map(|(_, body)| body.as_str())
}

fn bullets(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| BULLET_REGEX.captures(line))
        .map(|caps| caps[1].replace("**", ""))
        .collect()
}

/// For each condition, the severity word on the first line that mentions both.
fn severity_by_condition(text: &str, conditions: &[String]) -> BTreeMap<String, Severity> {
    let mut assessment = BTreeMap::new();

    for condition in conditions {
        let needle = condition.replace('_', " ");
        let severity = text
            .lines()
            .filter(|line| line.to_lowercase().contains(&needle))
            .find_map(|line| {
                SEVERITY_REGEX
                    .captures(line)
                    .and_then(|caps| Severity::parse(&caps[1]))
            });

        if let Some(severity) = severity {
            assessment.insert(condition.clone(), severity);
        }
    }

    assessment
}

/// What to search for, derived from an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub search_queries: Vec<String>,
    pub conditions: Vec<String>,
    pub recommended_ingredients: Vec<String>,
    pub recommended_products: Vec<String>,
    pub skin_type: String,
}

pub fn recommend(analysis: &SkinAnalysis) -> Recommendations {
    let mut search_queries: Vec<String> = analysis
        .conditions_detected
        .iter()
        .map(|condition| format!("treatment for {}", condition.replace('_', " ")))
        .collect();

    search_queries.extend(
        analysis
            .recommended_ingredients
            .iter()
            .take(3)
            .map(|ingredient| format!("serum with {}", ingredient)),
    );

    search_queries.extend(
        analysis
            .recommended_product_types
            .iter()
            .map(|product_type| format!("{} for {} skin", product_type, analysis.skin_type)),
    );

    Recommendations {
        search_queries,
        conditions: analysis.conditions_detected.clone(),
        recommended_ingredients: analysis.recommended_ingredients.clone(),
        recommended_products: analysis.recommended_product_types.clone(),
        skin_type: analysis.skin_type.clone(),
    }
}
