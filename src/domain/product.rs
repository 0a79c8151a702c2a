use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default currency for harvested prices
pub const DEFAULT_CURRENCY: &str = "VND";

/// Product variant tag, chosen by the site job that produced the data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Smartphone,
    Laptop,
    #[default]
    Generic,
}

impl ProductCategory {
    /// Lenient parse of a category label from configuration
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "smartphone" | "smartphones" | "phone" | "phones" | "mobile" | "dien-thoai" | "điện thoại" => {
                Self::Smartphone
            }
            "laptop" | "laptops" | "notebook" | "notebooks" | "may-tinh-xach-tay" => Self::Laptop,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smartphone => "smartphone",
            Self::Laptop => "laptop",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived value inside `categoryData`: either a plain string or a nested group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryValue {
    Text(String),
    Group(BTreeMap<String, CategoryValue>),
}

impl CategoryValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, CategoryValue>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Text(_) => None,
        }
    }
}

/// Search-oriented grouping of specifications plus the inferred brand
pub type CategoryData = BTreeMap<String, CategoryValue>;

/// One customer review found on a detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub text: String,
    pub rating: f64,
    pub date: String,
}

/// Review strings as they were found on the page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReview {
    pub author: String,
    pub text: String,
    pub rating_text: String,
    pub date: String,
}

/// Extracted-but-unvalidated fields of one detail page
///
/// Only built once the name chain produced a value; everything else may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFieldSet {
    pub name: String,
    pub price_text: String,
    pub image_url: String,
    pub description: String,
    /// Label/value pairs in page order
    pub specifications: Vec<(String, String)>,
    pub rating_text: String,
    pub review_count_text: String,
    pub reviews: Vec<RawReview>,
}

/// Classified product record handed to sinks
///
/// `category`, `name` and `specifications` feed `categoryData`, so they are
/// only readable from outside the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    category: ProductCategory,
    name: String,
    pub product_url: String,
    pub image_url: String,
    pub price: f64,
    pub price_currency: String,
    pub description: String,
    specifications: BTreeMap<String, String>,
    pub overall_rating: f64,
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
    category_data: CategoryData,
}

impl Product {
    /// Unclassified product with documented defaults
    pub fn new(category: ProductCategory, name: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            product_url: product_url.into(),
            image_url: String::new(),
            price: 0.0,
            price_currency: DEFAULT_CURRENCY.to_string(),
            description: String::new(),
            specifications: BTreeMap::new(),
            overall_rating: 0.0,
            review_count: 0,
            reviews: Vec::new(),
            category_data: CategoryData::new(),
        }
    }

    pub fn category(&self) -> ProductCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specifications(&self) -> &BTreeMap<String, String> {
        &self.specifications
    }

    /// Keeps the first value seen for a label; callers reclassify afterwards
    pub(crate) fn insert_specification(&mut self, label: String, value: String) {
        self.specifications.entry(label).or_insert(value);
    }

    pub fn category_data(&self) -> &CategoryData {
        &self.category_data
    }

    /// Brand inferred during classification, if any
    pub fn brand(&self) -> Option<&str> {
        self.category_data.get("brand").and_then(CategoryValue::as_text)
    }

    /// Replaces the derived view wholesale; only the classifier calls this
    pub(crate) fn replace_category_data(&mut self, data: CategoryData) {
        self.category_data = data;
    }
}
