use crate::ai::AiClient;
use crate::fallback::fallback_analysis;
use crate::types::{Analysis, Product};

/// Classifies `product` with the inference service when it answers the
/// availability probe, and with the keyword rules otherwise.
///
/// Probe failures, timeouts and unusable model output all degrade to the
/// rule-based result, so this always returns a populated [`Analysis`].
pub async fn analyze_with_fallback(client: &AiClient, product: &Product) -> Analysis {
    if client.is_available().await {
        match client.analyze(product).await {
            Ok(analysis) => return analysis,
            Err(e) => {
                tracing::warn!(
                    title = %product.title,
                    error = %e,
                    "classify: inference failed, using rule-based fallback"
                );
            }
        }
    }

    fallback_analysis(product)
}
