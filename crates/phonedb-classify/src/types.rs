use std::fmt;
use std::str::FromStr;

use phonedb_core::Category;
use rust_decimal::Decimal;
use serde::Serialize;

/// Classification label. Wider than the catalog [`Category`]: screens and
/// laptops show up in phone searches and need a label of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Smartphone,
    Tablet,
    FeaturePhone,
    Accessory,
    Display,
    Laptop,
    Other,
}

impl ProductCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smartphone => "smartphone",
            Self::Tablet => "tablet",
            Self::FeaturePhone => "feature_phone",
            Self::Accessory => "accessory",
            Self::Display => "display",
            Self::Laptop => "laptop",
            Self::Other => "other",
        }
    }

    /// The catalog category this label maps to, if the catalog has one.
    #[must_use]
    pub fn catalog_category(self) -> Option<Category> {
        match self {
            Self::Smartphone => Some(Category::Smartphone),
            Self::Tablet => Some(Category::Tablet),
            Self::FeaturePhone => Some(Category::FeaturePhone),
            Self::Accessory => Some(Category::Accessory),
            Self::Display | Self::Laptop | Self::Other => None,
        }
    }

    /// Lenient parse used on inference output: anything unrecognised is
    /// [`ProductCategory::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        label.trim().to_lowercase().parse().unwrap_or(Self::Other)
    }
}

impl From<Category> for ProductCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Smartphone => Self::Smartphone,
            Category::Tablet => Self::Tablet,
            Category::FeaturePhone => Self::FeaturePhone,
            Category::Accessory => Self::Accessory,
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smartphone" => Ok(Self::Smartphone),
            "tablet" => Ok(Self::Tablet),
            "feature_phone" => Ok(Self::FeaturePhone),
            "accessory" => Ok(Self::Accessory),
            "display" => Ok(Self::Display),
            "laptop" => Ok(Self::Laptop),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown product category '{other}'")),
        }
    }
}

/// What the classifier looks at for one persisted listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Product {
    pub title: String,
    pub price: Option<Decimal>,
    pub brand: Option<String>,
    pub category: Option<Category>,
}

/// Classification result. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub category: ProductCategory,
    pub brand: String,
    pub is_valid_price: bool,
    /// Empty when the price is valid.
    pub price_reason: String,
    pub cleaned_title: String,
    /// 0.0 to 1.0.
    pub confidence: f32,
}
