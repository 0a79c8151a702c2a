//! Product factory and specification classifier
//!
//! Turns a raw field set into a typed `Product` and derives its search-oriented
//! `categoryData`: specification keys grouped into semantic categories by
//! keyword, plus the brand inferred from the product name.
//!
//! Categories are tested in a fixed order and the first match wins, so a key
//! lands in exactly one category even when several keyword sets would accept
//! it. Keys that match nothing stay in `specifications` only.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{CategoryData, CategoryValue, Product, ProductCategory, RawFieldSet, Review};
use crate::infrastructure::normalize::{parse_first_integer, parse_price, parse_rating};

/// Keywords this short only match whole tokens ("ram" must not hit "camera")
const WHOLE_TOKEN_MAX_CHARS: usize = 3;

struct CategoryRule {
    name: &'static str,
    keywords: &'static [&'static str],
    excludes: &'static [&'static str],
}

const DISPLAY: &str = "display";

static CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        name: "processor",
        keywords: &["processor", "cpu", "chip", "vi xử lý", "bộ xử lý"],
        excludes: &[],
    },
    CategoryRule {
        name: "memory",
        keywords: &["ram", "memory", "bộ nhớ"],
        excludes: &["storage", "rom", "ssd", "hdd", "lưu trữ", "bộ nhớ trong", "thẻ nhớ"],
    },
    CategoryRule {
        name: "storage",
        keywords: &["storage", "ssd", "hdd", "disk", "rom", "ổ cứng", "lưu trữ", "bộ nhớ trong", "thẻ nhớ"],
        excludes: &[],
    },
    CategoryRule {
        name: DISPLAY,
        keywords: &["display", "screen", "resolution", "monitor", "màn hình", "độ phân giải", "tần số quét"],
        excludes: &[],
    },
    CategoryRule {
        name: "graphics",
        keywords: &["graphics", "gpu", "vga", "đồ họa"],
        excludes: &[],
    },
    CategoryRule {
        name: "battery",
        keywords: &["battery", "power", "charging", "pin", "sạc"],
        excludes: &[],
    },
    CategoryRule {
        name: "connectivity",
        keywords: &[
            "wifi", "wi-fi", "bluetooth", "port", "usb", "hdmi", "ethernet", "thunderbolt", "nfc", "5g", "kết nối",
            "cổng", "jack", "sim",
        ],
        excludes: &[],
    },
    CategoryRule {
        name: "physical",
        keywords: &[
            "weight", "dimension", "material", "color", "colour", "size", "trọng lượng", "kích thước", "chất liệu",
            "màu",
        ],
        excludes: &["display", "screen", "màn hình"],
    },
    CategoryRule {
        name: "os",
        keywords: &["os", "operating system", "operating-system", "windows", "macos", "linux", "hệ điều hành"],
        excludes: &[],
    },
];

/// Display keys that describe the resolution rather than the panel size
const RESOLUTION_KEYWORDS: &[&str] = &["resolution", "độ phân giải", "pixel"];

/// Phone brands as (name substring, brand)
const PHONE_BRANDS: &[(&str, &str)] = &[
    ("samsung", "Samsung"),
    ("apple", "Apple"),
    ("iphone", "Apple"),
    ("xiaomi", "Xiaomi"),
    ("oppo", "Oppo"),
    ("vivo", "Vivo"),
    ("nokia", "Nokia"),
    ("sony", "Sony"),
    ("google", "Google"),
    ("pixel", "Google"),
];

/// Laptop brands as (name substring, brand)
const LAPTOP_BRANDS: &[(&str, &str)] = &[
    ("dell", "Dell"),
    ("hp", "HP"),
    ("lenovo", "Lenovo"),
    ("asus", "Asus"),
    ("acer", "Acer"),
    ("apple", "Apple"),
    ("macbook", "Apple"),
    ("msi", "MSI"),
    ("samsung", "Samsung"),
    ("huawei", "Huawei"),
    ("gigabyte", "Gigabyte"),
    ("microsoft", "Microsoft"),
    ("surface", "Microsoft"),
];

/// Lower-cased text split into alphanumeric tokens
fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect()
}

fn keyword_matches(haystack: &str, haystack_tokens: &[&str], keyword: &str) -> bool {
    if keyword.chars().count() <= WHOLE_TOKEN_MAX_CHARS {
        haystack_tokens.contains(&keyword)
    } else {
        haystack.contains(keyword)
    }
}

fn any_keyword(haystack: &str, haystack_tokens: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| keyword_matches(haystack, haystack_tokens, k))
}

/// Category a specification key belongs to, if any
fn category_of(key: &str) -> Option<&'static str> {
    let lower = key.to_lowercase();
    let lower_tokens = tokens(&lower);
    CATEGORY_RULES
        .iter()
        .find(|rule| {
            any_keyword(&lower, &lower_tokens, rule.keywords) && !any_keyword(&lower, &lower_tokens, rule.excludes)
        })
        .map(|rule| rule.name)
}

fn is_resolution_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    RESOLUTION_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub struct ProductClassifier;

impl ProductClassifier {
    /// Build a classified product of `category` from the fields found at `url`
    pub fn build(category: ProductCategory, raw: RawFieldSet, url: &str) -> Product {
        let mut product = Product::new(category, raw.name, url);

        product.price = parse_price(Some(&raw.price_text));
        product.image_url = raw.image_url;
        product.description = raw.description;
        product.overall_rating = parse_rating(&raw.rating_text);

        for (label, value) in raw.specifications {
            product.insert_specification(label, value);
        }

        product.reviews = raw
            .reviews
            .into_iter()
            .map(|review| Review {
                rating: parse_rating(&review.rating_text),
                author: review.author,
                text: review.text,
                date: review.date,
            })
            .collect();

        product.review_count = if raw.review_count_text.trim().is_empty() {
            u32::try_from(product.reviews.len()).unwrap_or(u32::MAX)
        } else {
            parse_first_integer(&raw.review_count_text)
        };

        Self::classify(&mut product);
        product
    }

    /// Recompute `categoryData` from the product's specifications and name
    pub fn classify(product: &mut Product) {
        let mut data = Self::organize_specifications_into_categories(product.specifications());
        if let Some(brand) = Self::infer_brand(product.category(), product.name()) {
            data.insert("brand".to_string(), CategoryValue::Text(brand.to_string()));
        }
        debug!(
            "Classified '{}' into {} categories",
            product.name(),
            data.len()
        );
        product.replace_category_data(data);
    }

    /// Group specification entries by semantic category; empty groups are omitted
    pub fn organize_specifications_into_categories(specifications: &BTreeMap<String, String>) -> CategoryData {
        let mut groups: BTreeMap<&'static str, BTreeMap<String, CategoryValue>> = BTreeMap::new();
        let mut display_size = BTreeMap::new();
        let mut display_resolution = BTreeMap::new();

        for (key, value) in specifications {
            let Some(category) = category_of(key) else {
                continue;
            };
            let entry = CategoryValue::Text(value.clone());
            if category == DISPLAY {
                if is_resolution_key(key) {
                    display_resolution.insert(key.clone(), entry);
                } else {
                    display_size.insert(key.clone(), entry);
                }
            } else {
                groups.entry(category).or_default().insert(key.clone(), entry);
            }
        }

        let mut data: CategoryData = groups
            .into_iter()
            .map(|(name, group)| (name.to_string(), CategoryValue::Group(group)))
            .collect();

        let mut display = BTreeMap::new();
        if !display_size.is_empty() {
            display.insert("size".to_string(), CategoryValue::Group(display_size));
        }
        if !display_resolution.is_empty() {
            display.insert("resolution".to_string(), CategoryValue::Group(display_resolution));
        }
        if !display.is_empty() {
            data.insert(DISPLAY.to_string(), CategoryValue::Group(display));
        }

        data
    }

    /// First known brand contained in `name`; generic products try phone brands first
    pub fn infer_brand(category: ProductCategory, name: &str) -> Option<&'static str> {
        let lower = name.to_lowercase();
        let name_tokens = tokens(&lower);
        let lists: &[&[(&str, &str)]] = match category {
            ProductCategory::Smartphone => &[PHONE_BRANDS],
            ProductCategory::Laptop => &[LAPTOP_BRANDS],
            ProductCategory::Generic => &[PHONE_BRANDS, LAPTOP_BRANDS],
        };

        lists
            .iter()
            .flat_map(|list| list.iter())
            .find(|(needle, _)| keyword_matches(&lower, &name_tokens, needle))
            .map(|(_, brand)| *brand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawReview;
    use proptest::prelude::*;

    fn specs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn group<'a>(data: &'a CategoryData, name: &str) -> &'a BTreeMap<String, CategoryValue> {
        data.get(name).and_then(CategoryValue::as_group).unwrap()
    }

    #[test]
    fn test_brand_inference() {
        assert_eq!(
            ProductClassifier::infer_brand(ProductCategory::Smartphone, "Samsung Galaxy S23 Ultra"),
            Some("Samsung")
        );
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Smartphone, "iPhone 15 Pro Max"), Some("Apple"));
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Laptop, "HP Pavilion 15"), Some("HP"));
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Laptop, "MacBook Air M2"), Some("Apple"));
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Generic, "Dell XPS 13"), Some("Dell"));
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Smartphone, "Unknown Device X1"), None);
        // "hp" inside another word is not the HP brand
        assert_eq!(ProductClassifier::infer_brand(ProductCategory::Laptop, "Chromebook Shpere 5"), None);
    }

    #[test]
    fn test_unknown_brand_leaves_no_key() {
        let mut product = Product::new(ProductCategory::Smartphone, "Unknown Device X1", "https://shop.example/p/1");
        ProductClassifier::classify(&mut product);
        assert!(!product.category_data().contains_key("brand"));

        let mut product = Product::new(ProductCategory::Smartphone, "Samsung Galaxy S23 Ultra", "https://shop.example/p/2");
        ProductClassifier::classify(&mut product);
        assert_eq!(product.brand(), Some("Samsung"));
    }

    #[test]
    fn test_first_matching_category_wins() {
        let data = ProductClassifier::organize_specifications_into_categories(&specs(&[
            ("CPU", "Apple M2"),
            ("RAM", "8 GB"),
            ("Bộ nhớ trong", "256 GB"),
            ("Ổ cứng", "512 GB SSD"),
            ("Camera sau", "48 MP"),
            ("Dung lượng pin", "4500 mAh"),
            ("Cổng kết nối", "2 x Thunderbolt"),
            ("Trọng lượng", "1.24 kg"),
            ("Hệ điều hành", "macOS"),
            ("Card đồ họa", "10-core GPU"),
        ]));

        assert!(group(&data, "processor").contains_key("CPU"));
        assert!(group(&data, "memory").contains_key("RAM"));
        assert!(group(&data, "storage").contains_key("Bộ nhớ trong"));
        assert!(group(&data, "storage").contains_key("Ổ cứng"));
        assert!(group(&data, "battery").contains_key("Dung lượng pin"));
        assert!(group(&data, "connectivity").contains_key("Cổng kết nối"));
        assert!(group(&data, "physical").contains_key("Trọng lượng"));
        assert!(group(&data, "os").contains_key("Hệ điều hành"));
        assert!(group(&data, "graphics").contains_key("Card đồ họa"));
        // "camera" contains "ram" but no category accepts it as a whole token
        assert!(data.values().filter_map(CategoryValue::as_group).all(|g| !g.contains_key("Camera sau")));
    }

    #[test]
    fn test_display_is_split_into_size_and_resolution() {
        let data = ProductClassifier::organize_specifications_into_categories(&specs(&[
            ("Màn hình", "6.8 inch"),
            ("Độ phân giải", "QHD+ (1440 x 3088 Pixels)"),
            ("Screen resolution", "2560x1600"),
            ("Kích thước", "163.4 x 78.1 x 8.9 mm"),
        ]));

        let display = group(&data, "display");
        let size = display.get("size").and_then(CategoryValue::as_group).unwrap();
        let resolution = display.get("resolution").and_then(CategoryValue::as_group).unwrap();
        assert_eq!(size.keys().collect::<Vec<_>>(), vec!["Màn hình"]);
        assert_eq!(resolution.len(), 2);
        assert!(group(&data, "physical").contains_key("Kích thước"));
    }

    #[test]
    fn test_empty_categories_are_omitted() {
        let data = ProductClassifier::organize_specifications_into_categories(&specs(&[("Xuất xứ", "Việt Nam")]));
        assert!(data.is_empty());
    }

    #[test]
    fn test_build_normalizes_fields() {
        let raw = RawFieldSet {
            name: "Xiaomi Redmi Note 13".into(),
            price_text: "4.990.000₫".into(),
            rating_text: "4,6/5".into(),
            review_count_text: "".into(),
            specifications: vec![
                ("Chip".into(), "Snapdragon 685".into()),
                ("Chip".into(), "duplicate".into()),
            ],
            reviews: vec![RawReview {
                author: "An".into(),
                text: "Tốt".into(),
                rating_text: "5".into(),
                date: String::new(),
            }],
            ..RawFieldSet::default()
        };
        let product = ProductClassifier::build(ProductCategory::Smartphone, raw, "https://shop.example/p/13");

        assert_eq!(product.price, 4_990_000.0);
        assert_eq!(product.price_currency, "VND");
        assert!((product.overall_rating - 4.6).abs() < f64::EPSILON);
        assert_eq!(product.review_count, 1);
        assert_eq!(product.specifications().get("Chip").map(String::as_str), Some("Snapdragon 685"));
        assert_eq!(product.brand(), Some("Xiaomi"));
        assert_eq!(product.reviews[0].rating, 5.0);
    }

    #[test]
    fn test_serialized_field_names_are_stable() {
        let product = ProductClassifier::build(
            ProductCategory::Laptop,
            RawFieldSet {
                name: "Asus Zenbook 14".into(),
                ..RawFieldSet::default()
            },
            "https://shop.example/p/z14",
        );
        let json = serde_json::to_value(&product).unwrap();
        for field in ["name", "productUrl", "price", "priceCurrency", "specifications", "categoryData", "overallRating", "reviewCount"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["categoryData"]["brand"], "Asus");
    }

    #[test]
    fn test_explicit_zero_review_count_is_kept() {
        let raw = RawFieldSet {
            name: "Realme C55".into(),
            review_count_text: "0 đánh giá".into(),
            reviews: vec![RawReview {
                author: "Bình".into(),
                text: "Ổn".into(),
                rating_text: "4".into(),
                date: String::new(),
            }],
            ..RawFieldSet::default()
        };
        let product = ProductClassifier::build(ProductCategory::Smartphone, raw, "https://shop.example/p/c55");
        assert_eq!(product.review_count, 0);
        assert_eq!(product.reviews.len(), 1);
    }

    #[test]
    fn test_populated_classification_is_stable() {
        let raw = RawFieldSet {
            name: "Samsung Galaxy S23 Ultra".into(),
            specifications: vec![
                ("Màn hình".into(), "6.8 inch".into()),
                ("Độ phân giải".into(), "QHD+ (1440 x 3088 Pixels)".into()),
                ("RAM".into(), "12 GB".into()),
                ("CPU".into(), "Snapdragon 8 Gen 2".into()),
                ("Dung lượng pin".into(), "5000 mAh".into()),
            ],
            ..RawFieldSet::default()
        };
        let mut product = ProductClassifier::build(ProductCategory::Smartphone, raw, "https://shop.example/p/s23");
        let first = serde_json::to_string(product.category_data()).unwrap();

        let display = group(product.category_data(), "display");
        assert!(display.contains_key("size"));
        assert!(display.contains_key("resolution"));
        assert_eq!(product.brand(), Some("Samsung"));

        ProductClassifier::classify(&mut product);
        assert_eq!(serde_json::to_string(product.category_data()).unwrap(), first);
        assert_eq!(product.specifications().len(), 5);
    }

    fn spec_label() -> impl Strategy<Value = String> {
        let known = prop_oneof![
            Just("RAM"),
            Just("CPU"),
            Just("Màn hình"),
            Just("Độ phân giải"),
            Just("Bộ nhớ trong"),
            Just("Dung lượng pin"),
            Just("Card đồ họa"),
            Just("Cổng kết nối"),
            Just("Trọng lượng"),
            Just("Hệ điều hành"),
            Just("Xuất xứ"),
        ];
        prop_oneof![
            3 => (known, "[A-Za-z ]{0,8}").prop_map(|(label, suffix)| format!("{label}{suffix}")),
            1 => "[A-Za-z ]{1,20}",
        ]
    }

    fn product_name() -> impl Strategy<Value = String> {
        let brand = prop_oneof![
            Just("Samsung"),
            Just("Apple"),
            Just("Xiaomi"),
            Just("Dell"),
            Just("Lenovo"),
            Just("Nokia"),
            Just("Unknown"),
        ];
        (brand, "[A-Za-z0-9 ]{0,20}").prop_map(|(brand, model)| format!("{brand} {model}"))
    }

    proptest! {
        #[test]
        fn prop_classification_is_idempotent(
            entries in proptest::collection::btree_map(spec_label(), "[A-Za-z0-9 ]{0,20}", 0..12),
            name in product_name(),
        ) {
            let mut product = Product::new(ProductCategory::Generic, name, "https://shop.example/p");
            for (label, value) in entries {
                product.insert_specification(label, value);
            }

            ProductClassifier::classify(&mut product);
            let first = serde_json::to_string(product.category_data()).unwrap();
            ProductClassifier::classify(&mut product);
            let second = serde_json::to_string(product.category_data()).unwrap();

            prop_assert_eq!(first, second);
        }
    }
}
