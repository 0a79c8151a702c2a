//! Numeric and text normalization for free-text page fields
//!
//! None of these functions fail: unparseable input yields the documented
//! default (0 / 0.0 / empty) and a log line.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static DECIMAL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"));

/// Parse a price such as `"1.234.567đ"` or `"15,5"` into a float
///
/// Keeps digits, `.` and `,`; commas become dots. With several dots, groups of
/// exactly three digits after the first are thousands groups and are joined;
/// otherwise every dot but the last is dropped and the last is the decimal point.
/// Currency words and suffixes such as "triệu" are not interpreted.
pub fn parse_price(text: Option<&str>) -> f64 {
    let Some(raw) = text else {
        return 0.0;
    };

    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let kept = kept.trim_end_matches('.');

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        debug!("No digits in price text '{}', defaulting to 0.0", raw);
        return 0.0;
    }

    let groups: Vec<&str> = kept.split('.').collect();
    let normalized = match groups.split_last() {
        Some((last, rest)) if rest.len() > 1 => {
            if groups[1..].iter().all(|g| g.len() == 3) {
                groups.concat()
            } else {
                format!("{}.{}", rest.concat(), last)
            }
        }
        _ => kept.to_string(),
    };

    match normalized.parse::<f64>() {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse price '{}' (normalized '{}'): {}", raw, normalized, e);
            0.0
        }
    }
}

/// First run of ASCII digits as an integer, 0 when absent
pub fn parse_first_integer(text: &str) -> u32 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return 0;
    }

    digits.parse::<u32>().unwrap_or_else(|e| {
        warn!("Integer '{}' out of range: {}", digits, e);
        0
    })
}

/// First decimal number in rating text (`"4,5/5"` → 4.5), 0.0 when absent
pub fn parse_rating(text: &str) -> f64 {
    DECIMAL_NUMBER
        .find(text)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Collapse runs of whitespace (including NBSP) into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Placeholder values sites print instead of a real spec value
pub fn is_placeholder_value(value: &str) -> bool {
    matches!(value.trim(), "" | "-" | "--" | "N/A" | "n/a" | "TBD" | "Đang cập nhật")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("1.234.567đ"), 1_234_567.0)]
    #[case(Some("15,5 triệu"), 15.5)]
    #[case(Some("29.990.000 ₫"), 29_990_000.0)]
    #[case(Some("1.234.567,89"), 1_234_567.89)]
    #[case(Some("$1,299.99"), 1299.99)]
    #[case(Some("999"), 999.0)]
    #[case(Some("N/A"), 0.0)]
    #[case(Some("Liên hệ"), 0.0)]
    #[case(Some(""), 0.0)]
    #[case(None, 0.0)]
    fn test_parse_price(#[case] input: Option<&str>, #[case] expected: f64) {
        assert!((parse_price(input) - expected).abs() < 1e-6, "{input:?} -> {}", parse_price(input));
    }

    #[rstest]
    #[case("(128 đánh giá)", 128)]
    #[case("Reviews: 42 total, 3 new", 42)]
    #[case("no reviews yet", 0)]
    #[case("", 0)]
    #[case("99999999999999", 0)]
    fn test_parse_first_integer(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_first_integer(input), expected);
    }

    #[test]
    fn test_parse_rating() {
        assert!((parse_rating("4,5/5") - 4.5).abs() < f64::EPSILON);
        assert!((parse_rating("Rated 4.8 out of 5") - 4.8).abs() < f64::EPSILON);
        assert!(parse_rating("chưa có").abs() < f64::EPSILON);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Galaxy\n\tS23 \u{a0} Ultra "), "Galaxy S23 Ultra");
    }
}
