//! Classification cleanup pass over persisted catalog entries.

use phonedb_classify::{analyze_with_fallback, AiClient, Analysis, Product, ProductCategory};
use phonedb_core::{AppConfig, Availability};
use phonedb_db::{PhoneFix, PhoneRow};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CleanTally {
    pub processed: usize,
    pub updated: usize,
    pub recategorized: usize,
    pub brand_updates: usize,
    pub price_issues: usize,
}

/// Corrections for one phone derived from its analysis.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PlannedFix {
    pub fix: PhoneFix,
    pub price_issue: bool,
    /// Label the classifier chose that has no catalog category.
    pub unmapped_category: Option<ProductCategory>,
}

pub(crate) fn product_from_row(phone: &PhoneRow) -> Product {
    Product {
        title: phone.model.clone(),
        price: phone.price,
        brand: Some(phone.brand.clone()),
        category: phone.category.parse().ok(),
    }
}

pub(crate) fn plan_fix(phone: &PhoneRow, analysis: &Analysis) -> PlannedFix {
    let mut plan = PlannedFix::default();

    if analysis.category.as_str() != phone.category {
        match analysis.category.catalog_category() {
            Some(category) => plan.fix.category = Some(category),
            None => plan.unmapped_category = Some(analysis.category),
        }
    }

    if analysis.brand != "Unknown" && analysis.brand != phone.brand {
        plan.fix.brand = Some(analysis.brand.clone());
    }

    if !analysis.is_valid_price {
        plan.price_issue = true;
        if phone.availability_status != Availability::OutOfStock.as_str() {
            plan.fix.availability = Some(Availability::OutOfStock);
        }
    }

    let cleaned = analysis.cleaned_title.trim();
    let length = cleaned.chars().count();
    if cleaned != phone.model && length > 3 && length < 255 {
        plan.fix.model = Some(cleaned.to_string());
    }

    plan
}

fn describe(fix: &PhoneFix) -> String {
    let mut parts = Vec::new();
    if let Some(category) = fix.category {
        parts.push(format!("category={category}"));
    }
    if let Some(brand) = &fix.brand {
        parts.push(format!("brand={brand}"));
    }
    if let Some(model) = &fix.model {
        parts.push(format!("model={model}"));
    }
    if let Some(availability) = fix.availability {
        parts.push(format!("availability={availability}"));
    }
    parts.join(", ")
}

/// Classifies up to `limit` of the most recent phones in `marketplace`
/// (every marketplace when `None`) and applies the resulting fixes.
///
/// # Errors
///
/// Returns an error if the phones cannot be loaded. Per-phone failures are
/// logged and skipped.
pub(crate) async fn run_clean(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    marketplace: Option<&str>,
    limit: i64,
    dry_run: bool,
) -> anyhow::Result<CleanTally> {
    let client = AiClient::from_config(config);
    if client.is_available().await {
        tracing::info!(model = client.model(), "clean: inference service available");
    } else {
        tracing::warn!(
            url = %config.ai_url,
            "clean: inference service unavailable, using rule-based classification"
        );
    }

    let phones = phonedb_db::list_recent_phones(pool, marketplace, limit).await?;
    tracing::info!(
        marketplace = marketplace.unwrap_or("all"),
        count = phones.len(),
        dry_run,
        "clean: analyzing phones"
    );

    let mut tally = CleanTally::default();
    for phone in &phones {
        let analysis = analyze_with_fallback(&client, &product_from_row(phone)).await;
        let plan = plan_fix(phone, &analysis);
        tally.processed += 1;

        if plan.price_issue {
            tally.price_issues += 1;
            tracing::warn!(
                id = phone.id,
                price = ?phone.price,
                reason = %analysis.price_reason,
                "clean: invalid price"
            );
        }
        if let Some(label) = plan.unmapped_category {
            tracing::info!(id = phone.id, label = %label, "clean: not a catalog category, left unchanged");
        }

        if !plan.fix.is_empty() {
            if plan.fix.category.is_some() {
                tally.recategorized += 1;
            }
            if plan.fix.brand.is_some() {
                tally.brand_updates += 1;
            }

            if dry_run {
                println!("[{}] would update: {}", phone.id, describe(&plan.fix));
                tally.updated += 1;
            } else {
                match phonedb_db::apply_phone_fix(pool, phone.id, &plan.fix).await {
                    Ok(()) => {
                        tracing::info!(id = phone.id, changes = %describe(&plan.fix), "clean: updated");
                        tally.updated += 1;
                    }
                    Err(e) => tracing::error!(id = phone.id, error = %e, "clean: update failed"),
                }
            }
        }

        if tally.processed % PROGRESS_EVERY == 0 {
            tracing::info!(done = tally.processed, total = phones.len(), "clean: progress");
        }
    }

    println!("processed:      {}", tally.processed);
    println!("updated:        {}", tally.updated);
    println!("re-categorized: {}", tally.recategorized);
    println!("brand updates:  {}", tally.brand_updates);
    println!("price issues:   {}", tally.price_issues);
    if dry_run {
        println!("dry run: no changes were written");
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use phonedb_core::Category;
    use rust_decimal::Decimal;

    use super::*;

    fn phone(model: &str, brand: &str, category: &str) -> PhoneRow {
        let now = Utc::now();
        PhoneRow {
            id: 7,
            model: model.to_string(),
            raw_title: None,
            brand: brand.to_string(),
            category: category.to_string(),
            condition: "used".to_string(),
            price: Some(Decimal::from(3_000)),
            currency: "DZD".to_string(),
            image_url: None,
            source_url: None,
            marketplace_name: "ouedkniss".to_string(),
            listing_count: 1,
            stock_level: 1,
            availability_status: "in_stock".to_string(),
            location: None,
            seller_name: None,
            seller_type: None,
            scraped_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn analysis(category: ProductCategory, brand: &str, valid: bool, title: &str) -> Analysis {
        Analysis {
            category,
            brand: brand.to_string(),
            is_valid_price: valid,
            price_reason: String::new(),
            cleaned_title: title.to_string(),
            confidence: 0.7,
        }
    }

    #[test]
    fn unchanged_analysis_plans_nothing() {
        let row = phone("Galaxy A14", "Samsung", "smartphone");
        let plan = plan_fix(
            &row,
            &analysis(ProductCategory::Smartphone, "Samsung", true, "Galaxy A14"),
        );
        assert!(plan.fix.is_empty());
        assert!(!plan.price_issue);
    }

    #[test]
    fn category_and_brand_changes_are_planned() {
        let row = phone("Galaxy Buds 2", "Galaxy", "smartphone");
        let plan = plan_fix(
            &row,
            &analysis(ProductCategory::Accessory, "Samsung", true, "Galaxy Buds 2"),
        );
        assert_eq!(plan.fix.category, Some(Category::Accessory));
        assert_eq!(plan.fix.brand.as_deref(), Some("Samsung"));
        assert!(plan.fix.model.is_none());
    }

    #[test]
    fn unknown_brand_never_overwrites() {
        let row = phone("Pixel 8", "Google", "smartphone");
        let plan = plan_fix(&row, &analysis(ProductCategory::Smartphone, "Unknown", true, "Pixel 8"));
        assert!(plan.fix.brand.is_none());
    }

    #[test]
    fn non_catalog_label_is_reported_not_written() {
        let row = phone("Ecran iPhone 12", "Apple", "smartphone");
        let plan = plan_fix(
            &row,
            &analysis(ProductCategory::Display, "Apple", true, "Ecran iPhone 12"),
        );
        assert!(plan.fix.category.is_none());
        assert_eq!(plan.unmapped_category, Some(ProductCategory::Display));
    }

    #[test]
    fn invalid_price_marks_out_of_stock_once() {
        let mut row = phone("Galaxy A14", "Samsung", "smartphone");
        let verdict = analysis(ProductCategory::Smartphone, "Samsung", false, "Galaxy A14");

        let plan = plan_fix(&row, &verdict);
        assert!(plan.price_issue);
        assert_eq!(plan.fix.availability, Some(Availability::OutOfStock));

        row.availability_status = "out_of_stock".to_string();
        let plan = plan_fix(&row, &verdict);
        assert!(plan.price_issue);
        assert!(plan.fix.availability.is_none());
    }

    #[test]
    fn cleaned_title_must_be_a_sensible_length() {
        let row = phone("SAMSUNG  galaxy s23 ultra PROMO", "Samsung", "smartphone");

        let plan = plan_fix(
            &row,
            &analysis(ProductCategory::Smartphone, "Samsung", true, "  Galaxy S23 Ultra "),
        );
        assert_eq!(plan.fix.model.as_deref(), Some("Galaxy S23 Ultra"));

        let short = plan_fix(&row, &analysis(ProductCategory::Smartphone, "Samsung", true, "S23"));
        assert!(short.fix.model.is_none());

        let long = "x".repeat(255);
        let too_long = plan_fix(&row, &analysis(ProductCategory::Smartphone, "Samsung", true, &long));
        assert!(too_long.fix.model.is_none());
    }

    #[test]
    fn product_carries_row_fields() {
        let row = phone("Tab S9", "Samsung", "tablet");
        let product = product_from_row(&row);
        assert_eq!(product.title, "Tab S9");
        assert_eq!(product.category, Some(Category::Tablet));
        assert_eq!(product.brand.as_deref(), Some("Samsung"));
        assert_eq!(product.price, Some(Decimal::from(3_000)));
    }

    #[test]
    fn fix_description_lists_changes() {
        let fix = PhoneFix {
            category: Some(Category::Tablet),
            availability: Some(Availability::OutOfStock),
            ..PhoneFix::default()
        };
        assert_eq!(describe(&fix), "category=tablet, availability=out_of_stock");
    }
}
