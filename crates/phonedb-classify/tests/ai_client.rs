//! Integration tests for `AiClient` and `analyze_with_fallback` using
//! wiremock HTTP mocks.

use std::time::{Duration, Instant};

use phonedb_classify::{analyze_with_fallback, AiClient, Product, ProductCategory};
use rust_decimal::Decimal;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn product() -> Product {
    Product {
        title: "Ecouteurs Samsung Galaxy Buds 2".to_string(),
        price: Some(Decimal::from(9_500)),
        brand: Some("Galaxy".to_string()),
        category: None,
    }
}

async fn mount_tags(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn probe_reports_available_on_200() {
    let server = MockServer::start().await;
    mount_tags(&server, ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    assert!(client.is_available().await);
}

#[tokio::test]
async fn probe_reports_unavailable_on_error_status() {
    let server = MockServer::start().await;
    mount_tags(&server, ResponseTemplate::new(503)).await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    assert!(!client.is_available().await);
}

#[tokio::test]
async fn model_answer_is_used_when_service_is_up() {
    let server = MockServer::start().await;
    mount_tags(&server, ResponseTemplate::new(200)).await;

    let answer = r#"{"category":"accessory","brand":"Samsung","isValidPrice":true,
        "priceReason":"","cleanedTitle":"Samsung Galaxy Buds 2","confidence":0.9}"#;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2:3b",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3.2:3b",
            "response": answer,
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    let analysis = analyze_with_fallback(&client, &product()).await;

    assert_eq!(analysis.category, ProductCategory::Accessory);
    assert_eq!(analysis.brand, "Samsung");
    assert_eq!(analysis.cleaned_title, "Samsung Galaxy Buds 2");
    assert!((analysis.confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn unusable_answer_falls_back_to_rules() {
    let server = MockServer::start().await;
    mount_tags(&server, ResponseTemplate::new(200)).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "Sorry, I am not able to classify products."
        })))
        .mount(&server)
        .await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    let analysis = analyze_with_fallback(&client, &product()).await;

    assert_eq!(analysis.category, ProductCategory::Accessory);
    assert_eq!(analysis.brand, "Samsung");
    assert!((analysis.confidence - 0.7).abs() < f32::EPSILON);
}

#[tokio::test]
async fn generate_error_falls_back_to_rules() {
    let server = MockServer::start().await;
    mount_tags(&server, ResponseTemplate::new(200)).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    let analysis = analyze_with_fallback(&client, &product()).await;
    assert!((analysis.confidence - 0.7).abs() < f32::EPSILON);
}

#[tokio::test]
async fn probe_timeout_degrades_within_probe_window() {
    let server = MockServer::start().await;
    mount_tags(
        &server,
        ResponseTemplate::new(200).set_delay(Duration::from_secs(30)),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AiClient::new(&server.uri(), "llama3.2:3b");
    let started = Instant::now();
    let analysis = analyze_with_fallback(&client, &product()).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
    assert_eq!(analysis.category, ProductCategory::Accessory);
    assert!(analysis.is_valid_price);
    assert!(!analysis.cleaned_title.is_empty());
}

#[tokio::test]
async fn unreachable_service_degrades_to_rules() {
    // nothing listens on the discard port
    let client = AiClient::new("http://127.0.0.1:9", "llama3.2:3b");
    let analysis = analyze_with_fallback(&client, &product()).await;
    assert_eq!(analysis.brand, "Samsung");
}
