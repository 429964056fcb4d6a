//! Text normalization for raw listing fields.
//!
//! All detectors are keyword rules evaluated in a fixed priority order: the
//! first rule that matches wins regardless of where its keyword appears in
//! the text.

use std::str::FromStr;
use std::sync::LazyLock;

use phonedb_core::{Category, Condition};
use regex::Regex;
use rust_decimal::Decimal;

/// Ordered brand table. `iPhone` and `Pixel` resolve to their maker.
const BRANDS: [&str; 24] = [
    "Samsung", "Apple", "iPhone", "Huawei", "Xiaomi", "Oppo", "Vivo", "OnePlus", "Realme",
    "Nokia", "Sony", "LG", "Motorola", "Google", "Pixel", "Asus", "ZTE", "Honor", "Infinix",
    "Tecno", "Poco", "Redmi", "Galaxy", "Condor",
];

const CATEGORY_RULES: [(Category, &[&str]); 3] = [
    (Category::Tablet, &["tablet", "tablette"]),
    (Category::FeaturePhone, &["feature phone", "téléphone basique"]),
    (
        Category::Accessory,
        &["accessoire", "accessory", "case", "charger"],
    ),
];

const CONDITION_RULES: [(Condition, &[&str]); 3] = [
    (Condition::New, &["neuf", "new", "nouveau"]),
    (Condition::LikeNew, &["comme neuf", "like new", "excellent"]),
    (Condition::ForParts, &["pièces", "parts", "défectueux"]),
];

static MARKETING_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:comme\s+neuf|neuf|new|used|occasion|original|authentic)\b")
        .expect("valid marketing words regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Parse a free-text price such as `"45 000 DA"` or `"12,5 €"`.
///
/// Everything except digits, `.` and `,` is stripped, the first `,` becomes
/// a decimal point, and the longest leading decimal literal is parsed.
/// Returns `None` when no number can be read, which is distinct from zero.
#[must_use]
pub fn normalize_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let normalized = cleaned.replacen(',', ".", 1);

    let mut int_part = String::new();
    let mut frac_part = String::new();
    let mut seen_point = false;
    for c in normalized.chars() {
        match c {
            '0'..='9' if seen_point => frac_part.push(c),
            '0'..='9' => int_part.push(c),
            '.' if !seen_point => seen_point = true,
            _ => break,
        }
    }

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let literal = format!(
        "{}.{}",
        if int_part.is_empty() { "0" } else { &int_part },
        if frac_part.is_empty() { "0" } else { &frac_part }
    );
    Decimal::from_str(&literal).ok().map(|d| d.normalize())
}

/// Classify a listing by keyword over `title + description`.
/// Priority: tablet, feature phone, accessory, then smartphone.
#[must_use]
pub fn detect_category(title: &str, description: &str) -> Category {
    let text = format!("{title} {description}").to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or(Category::Smartphone, |(category, _)| *category)
}

/// Priority: new, like new, for parts, then used.
#[must_use]
pub fn detect_condition(title: &str, description: &str) -> Condition {
    let text = format!("{title} {description}").to_lowercase();
    CONDITION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or(Condition::Used, |(condition, _)| *condition)
}

/// First brand from the ordered table found in `title`, or `"Unknown"`.
#[must_use]
pub fn extract_brand(title: &str) -> String {
    let upper = title.to_uppercase();
    BRANDS
        .iter()
        .find(|brand| upper.contains(&brand.to_uppercase()))
        .map_or("Unknown", |brand| match *brand {
            "iPhone" => "Apple",
            "Pixel" => "Google",
            other => other,
        })
        .to_string()
}

/// Strip marketing words from a title and collapse whitespace.
#[must_use]
pub fn clean_model_name(title: &str) -> String {
    let stripped = MARKETING_WORDS.replace_all(title, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
