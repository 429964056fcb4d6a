//! Client for an Ollama-compatible inference service.

use std::sync::LazyLock;
use std::time::Duration;

use phonedb_core::AppConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::types::{Analysis, Product, ProductCategory};

/// Availability probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Shape the model is asked to emit. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireAnalysis {
    category: Option<String>,
    brand: Option<String>,
    is_valid_price: Option<bool>,
    price_reason: Option<String>,
    cleaned_title: Option<String>,
    confidence: Option<f32>,
}

/// HTTP client for the inference service.
#[derive(Debug, Clone)]
pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl AiClient {
    #[must_use]
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.ai_url, &config.ai_model)
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// `true` when `GET /api/tags` answers 200 within [`PROBE_TIMEOUT`].
    /// Any error or timeout reads as unavailable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(url, error = %e, "inference service probe failed");
                false
            }
        }
    }

    /// Asks the model to classify one product.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Http`] on transport failure or timeout,
    /// [`ClassifyError::Status`] on a non-2xx response, and
    /// [`ClassifyError::NoJson`] / [`ClassifyError::Json`] when the model's
    /// answer carries no parseable JSON object.
    pub async fn analyze(&self, product: &Product) -> Result<Analysis, ClassifyError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(product),
            stream: false,
            options: GenerateOptions {
                temperature: 0.1,
                top_p: 0.9,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(GENERATE_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClassifyError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        parse_analysis(&body.response, product)
    }
}

fn build_prompt(product: &Product) -> String {
    let price = product
        .price
        .map_or_else(|| "unknown".to_string(), |p| p.to_string());
    let brand = product.brand.as_deref().unwrap_or("Unknown");
    let category = product.category.map_or("Unknown", |c| c.as_str());

    format!(
        "Analyze this product listing from an Algerian marketplace and answer with JSON only.

Product Title: {title}
Price: {price} DZD
Brand: {brand}
Current Category: {category}

Use exactly this format:
{{
  \"category\": \"smartphone|tablet|feature_phone|accessory|display|laptop|other\",
  \"brand\": \"brand name or Unknown\",
  \"isValidPrice\": true or false,
  \"priceReason\": \"why the price is invalid, empty otherwise\",
  \"cleanedTitle\": \"product name without store names or filler\",
  \"confidence\": 0.0 to 1.0
}}

Rules:
- Screens, displays and écrans are \"display\".
- Earbuds, buds, cases, chargers and cables are \"accessory\".
- Laptops, MacBooks and PCs are \"laptop\".
- A price of 1 DZD or 1000000 DZD and above is invalid, as is a price far too low for the product type.
- Take the brand from the title (\"Samsung Galaxy S23\" is Samsung, \"Anker charger\" is Anker).
- Common brands: Samsung, Apple, Xiaomi, Oppo, Realme, Tecno, Infinix.

Respond with the JSON object and nothing else.",
        title = product.title,
    )
}

/// Extracts the outermost `{...}` span of a model answer and maps it onto an
/// [`Analysis`], filling gaps from `product`.
pub(crate) fn parse_analysis(answer: &str, product: &Product) -> Result<Analysis, ClassifyError> {
    let json = JSON_OBJECT_RE
        .find(answer)
        .ok_or(ClassifyError::NoJson)?
        .as_str();
    let wire: WireAnalysis = serde_json::from_str(json)?;

    let brand = wire
        .brand
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let cleaned_title = wire
        .cleaned_title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| product.title.clone());

    Ok(Analysis {
        category: wire
            .category
            .as_deref()
            .map_or(ProductCategory::Other, ProductCategory::from_label),
        brand,
        is_valid_price: wire.is_valid_price.unwrap_or(true),
        price_reason: wire.price_reason.unwrap_or_default(),
        cleaned_title,
        confidence: wire.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            title: "Samsung Galaxy S23 Ultra - Boutique Alger".to_string(),
            ..Product::default()
        }
    }

    #[test]
    fn json_is_found_inside_chatter() {
        let answer = r#"Sure! Here you go:
{"category": "smartphone", "brand": "Samsung", "isValidPrice": true,
 "priceReason": "", "cleanedTitle": "Samsung Galaxy S23 Ultra", "confidence": 0.92}
Hope this helps."#;
        let analysis = parse_analysis(answer, &product()).unwrap();
        assert_eq!(analysis.category, ProductCategory::Smartphone);
        assert_eq!(analysis.brand, "Samsung");
        assert_eq!(analysis.cleaned_title, "Samsung Galaxy S23 Ultra");
        assert!((analysis.confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn unknown_category_is_coerced_to_other() {
        let answer = r#"{"category": "smartwatch", "brand": "Huawei"}"#;
        let analysis = parse_analysis(answer, &product()).unwrap();
        assert_eq!(analysis.category, ProductCategory::Other);
        assert!(analysis.is_valid_price);
    }

    #[test]
    fn missing_fields_fall_back_to_product() {
        let analysis = parse_analysis(r#"{"category": "display"}"#, &product()).unwrap();
        assert_eq!(analysis.brand, "Unknown");
        assert_eq!(analysis.cleaned_title, product().title);
    }

    #[test]
    fn answer_without_object_is_rejected() {
        let err = parse_analysis("I cannot help with that.", &product()).unwrap_err();
        assert!(matches!(err, ClassifyError::NoJson));
    }

    #[test]
    fn malformed_object_is_a_json_error() {
        let err = parse_analysis("{category: smartphone}", &product()).unwrap_err();
        assert!(matches!(err, ClassifyError::Json(_)));
    }

    #[test]
    fn prompt_carries_listing_fields() {
        let prompt = build_prompt(&Product {
            title: "Redmi Note 13".to_string(),
            price: Some(rust_decimal::Decimal::from(42_000)),
            brand: Some("Xiaomi".to_string()),
            category: Some(phonedb_core::Category::Smartphone),
        });
        assert!(prompt.contains("Product Title: Redmi Note 13"));
        assert!(prompt.contains("Price: 42000 DZD"));
        assert!(prompt.contains("Brand: Xiaomi"));
        assert!(prompt.contains("Current Category: smartphone"));
    }
}
