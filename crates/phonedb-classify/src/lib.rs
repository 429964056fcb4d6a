//! Listing classification for the phone catalog.
//!
//! A deterministic keyword classifier is always available. An optional
//! Ollama-compatible inference service is consulted first when it answers
//! its availability probe; any failure there falls back to the rules.

pub mod ai;
pub mod classifier;
pub mod error;
pub mod fallback;
pub mod types;

pub use ai::{AiClient, PROBE_TIMEOUT};
pub use classifier::analyze_with_fallback;
pub use error::ClassifyError;
pub use fallback::{categorize, detect_brand, fallback_analysis, validate_price};
pub use types::{Analysis, Product, ProductCategory};
