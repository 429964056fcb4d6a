use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference service returned status {0}")]
    Status(u16),

    #[error("inference response contained no JSON object")]
    NoJson,

    #[error("invalid analysis JSON: {0}")]
    Json(#[from] serde_json::Error),
}
