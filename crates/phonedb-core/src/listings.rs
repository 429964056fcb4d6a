//! Canonical listing vocabulary shared by extractors, persistence, and the
//! classifier.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct ParseVocabularyError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! vocabulary {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseVocabularyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseVocabularyError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary!(Category, "category", {
    Smartphone => "smartphone",
    Tablet => "tablet",
    FeaturePhone => "feature_phone",
    Accessory => "accessory",
});

vocabulary!(Condition, "condition", {
    New => "new",
    LikeNew => "like_new",
    Used => "used",
    ForParts => "for_parts",
});

vocabulary!(Availability, "availability", {
    InStock => "in_stock",
    LimitedStock => "limited_stock",
    OutOfStock => "out_of_stock",
});

/// One observation of an item on a marketplace, normalized and ready for the
/// deduplication engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub model: String,
    pub raw_title: String,
    pub brand: String,
    pub category: Category,
    pub price: Option<Decimal>,
    pub currency: String,
    pub condition: Condition,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub marketplace: String,
    pub listing_count: i32,
    pub stock_level: i32,
    pub availability_status: Availability,
    pub location: Option<String>,
    pub seller_name: Option<String>,
    pub seller_type: Option<String>,
}
