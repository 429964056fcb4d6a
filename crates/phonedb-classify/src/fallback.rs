//! Deterministic keyword classifier used whenever the inference service is
//! unavailable or returns something unusable.

use rust_decimal::Decimal;

use crate::types::{Analysis, Product, ProductCategory};

/// Keyword rules in priority order. The first rule with any keyword found in
/// the lowercased title wins.
pub(crate) const CATEGORY_RULES: &[(ProductCategory, &[&str])] = &[
    (
        ProductCategory::Display,
        &["écran", "screen", "display", "afficheur", "lcd"],
    ),
    (
        ProductCategory::Laptop,
        &["laptop", "macbook", "pc portable", "ordinateur"],
    ),
    (ProductCategory::Tablet, &["tablet", "tablette", "ipad"]),
    (
        ProductCategory::Accessory,
        &[
            "buds",
            "ecouteur",
            "earphone",
            "case",
            "coque",
            "charger",
            "cable",
            "câble",
            "protection",
            "chargeur",
        ],
    ),
];

/// Checked in order; the first substring hit names the brand.
pub(crate) const BRANDS: &[&str] = &[
    "samsung", "iphone", "apple", "xiaomi", "oppo", "realme", "tecno", "infinix", "huawei",
    "honor", "nokia", "motorola", "oneplus", "vivo", "anker", "boya", "jbl", "sony", "lg",
    "dell", "hp", "lenovo", "asus",
];

const FALLBACK_CONFIDENCE: f32 = 0.7;

const UNREALISTIC_PRICE: &str = "Price is unrealistic (too low or too high)";

/// Minimum plausible price in DZD per category.
fn price_floor(category: ProductCategory) -> Option<(i64, &'static str)> {
    match category {
        ProductCategory::Smartphone => Some((5_000, "Price too low for a smartphone")),
        ProductCategory::Tablet => Some((10_000, "Price too low for a tablet")),
        ProductCategory::Laptop => Some((50_000, "Price too low for a laptop")),
        _ => None,
    }
}

/// Category from title keywords, else the product's current category, else
/// smartphone.
#[must_use]
pub fn categorize(title: &str, current: Option<ProductCategory>) -> ProductCategory {
    let title = title.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| title.contains(k)))
        .map_or_else(
            || current.unwrap_or(ProductCategory::Smartphone),
            |(category, _)| *category,
        )
}

/// Returns `Err(reason)` when the price is implausible for `category`. A
/// missing price counts as zero.
///
/// # Errors
///
/// Returns the human-readable reason the price was rejected.
pub fn validate_price(price: Option<Decimal>, category: ProductCategory) -> Result<(), &'static str> {
    let price = price.unwrap_or(Decimal::ZERO);

    if price <= Decimal::ONE || price >= Decimal::from(1_000_000) {
        return Err(UNREALISTIC_PRICE);
    }
    match price_floor(category) {
        Some((floor, reason)) if price < Decimal::from(floor) => Err(reason),
        _ => Ok(()),
    }
}

/// First brand keyword found in the title, title-cased; `iphone` maps to
/// `Apple`.
#[must_use]
pub fn detect_brand(title: &str) -> Option<String> {
    let title = title.to_lowercase();
    let hit = BRANDS.iter().find(|brand| title.contains(*brand))?;
    if *hit == "iphone" {
        return Some("Apple".to_string());
    }
    let mut chars = hit.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
}

/// Rule-based analysis. Never fails.
#[must_use]
pub fn fallback_analysis(product: &Product) -> Analysis {
    let category = categorize(&product.title, product.category.map(ProductCategory::from));
    let price_check = validate_price(product.price, category);
    let brand = detect_brand(&product.title)
        .or_else(|| product.brand.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    Analysis {
        category,
        brand,
        is_valid_price: price_check.is_ok(),
        price_reason: price_check.err().unwrap_or_default().to_string(),
        cleaned_title: product.title.clone(),
        confidence: FALLBACK_CONFIDENCE,
    }
}
