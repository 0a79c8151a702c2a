//! Specification extraction with ordered fallback strategies
//!
//! Strategies are tried in order and the first one that yields at least one
//! label/value pair wins:
//! 1. structured table rows (label cell + value cell)
//! 2. alternate label/value element pairs (definition lists, spec list items)
//! 3. `Label: Value` text of bullets and paragraphs
//! 4. regex scan over raw markup for adjacent two-cell patterns
//! 5. keyword-anchored search for well-known spec names
//!
//! Later strategies are less precise; they only run when the page offers
//! nothing better.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::domain::SiteConfig;
use crate::infrastructure::document::{compile_selector, element_text, PageDocument};
use crate::infrastructure::normalize::{collapse_whitespace, is_placeholder_value};

const MAX_LABEL_CHARS: usize = 60;
const MAX_VALUE_CHARS: usize = 300;

const DEFAULT_TABLES: &[&str] = &["table"];
const DEFAULT_ROWS: &str = "tr";
const CELLS: &str = "th, td";
const DEFAULT_PAIR_ROWS: &[&str] = &[
    "dl",
    "[class*='spec'] li",
    "[class*='parameter'] li",
    "[class*='attribute'] li",
];
const COLON_CANDIDATES: &str = "li, p";

static CELL_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<t[hd]\b[^>]*>(.*?)</t[hd]>\s*<td\b[^>]*>(.*?)</td>").expect("valid regex")
});
static TERM_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<dt\b[^>]*>(.*?)</dt>\s*<dd\b[^>]*>(.*?)</dd>").expect("valid regex")
});
static STRONG_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:strong|b|label)\b[^>]*>([^<]{1,60}?):?\s*</(?:strong|b|label)>\s*:?\s*([^<]{1,300})")
        .expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// Spec names searched for by the keyword-anchored strategy
pub const KNOWN_SPEC_NAMES: &[&str] = &[
    "Công nghệ màn hình",
    "Dung lượng lưu trữ",
    "Hệ điều hành",
    "Bộ nhớ trong",
    "Operating System",
    "Độ phân giải",
    "Camera trước",
    "Trọng lượng",
    "Card đồ họa",
    "Camera sau",
    "Kích thước",
    "Resolution",
    "Processor",
    "Màn hình",
    "Dimensions",
    "Connectivity",
    "Kết nối",
    "Battery",
    "Display",
    "Storage",
    "Screen",
    "Weight",
    "Ổ cứng",
    "Chip",
    "CPU",
    "GPU",
    "RAM",
    "ROM",
    "SSD",
    "Pin",
    "OS",
];

/// Which strategy produced the specifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecStrategy {
    TableRows,
    LabelValuePairs,
    ColonSplit,
    MarkupScan,
    KeywordAnchor,
}

impl fmt::Display for SpecStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TableRows => "table rows",
            Self::LabelValuePairs => "label/value pairs",
            Self::ColonSplit => "colon split",
            Self::MarkupScan => "markup scan",
            Self::KeywordAnchor => "keyword anchor",
        };
        f.write_str(name)
    }
}

/// Specification pairs plus the strategy that found them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecsExtraction {
    pub strategy: Option<SpecStrategy>,
    pub pairs: Vec<(String, String)>,
}

/// Ordered label/value collection that keeps the first value per label
#[derive(Default)]
struct PairCollector {
    seen: HashSet<String>,
    pairs: Vec<(String, String)>,
}

impl PairCollector {
    fn push(&mut self, label: &str, value: &str) {
        let label = collapse_whitespace(label);
        let label = label.trim_end_matches([':', '：']).trim().to_string();
        let value = collapse_whitespace(value);
        let value = value.trim_start_matches([':', '：']).trim().to_string();

        if label.is_empty()
            || label.chars().count() > MAX_LABEL_CHARS
            || label.chars().all(|c| c.is_ascii_digit() || c.is_ascii_punctuation())
            || is_placeholder_value(&value)
            || value.chars().count() > MAX_VALUE_CHARS
            || label.eq_ignore_ascii_case(&value)
        {
            return;
        }

        if self.seen.insert(label.to_lowercase()) {
            self.pairs.push((label, value));
        }
    }

    fn finish(self) -> Option<Vec<(String, String)>> {
        if self.pairs.is_empty() { None } else { Some(self.pairs) }
    }
}

/// Compiled specification selectors for one site
pub struct SpecsExtractor {
    tables: Vec<Selector>,
    row: Selector,
    label: Option<Selector>,
    value: Option<Selector>,
    pair_rows: Vec<Selector>,
    cells: Selector,
    colon_candidates: Selector,
    dt: Selector,
    dd: Selector,
    known_names: Vec<&'static str>,
}

fn compile_all(primary: Option<&str>, defaults: &[&str]) -> Vec<Selector> {
    match primary.and_then(compile_selector) {
        Some(selector) => vec![selector],
        None => defaults.iter().filter_map(|s| compile_selector(s)).collect(),
    }
}

fn fixed(selector: &str) -> Selector {
    Selector::parse(selector).expect("built-in selector is valid")
}

impl SpecsExtractor {
    pub fn new(config: &SiteConfig) -> Self {
        let mut known_names = KNOWN_SPEC_NAMES.to_vec();
        known_names.sort_by_key(|name| std::cmp::Reverse(name.len()));

        Self {
            tables: compile_all(config.specs_table(), DEFAULT_TABLES),
            row: config
                .specs_row()
                .and_then(compile_selector)
                .unwrap_or_else(|| fixed(DEFAULT_ROWS)),
            label: config.specs_label().and_then(compile_selector),
            value: config.specs_value().and_then(compile_selector),
            pair_rows: compile_all(config.alt_specs_row(), DEFAULT_PAIR_ROWS),
            cells: fixed(CELLS),
            colon_candidates: fixed(COLON_CANDIDATES),
            dt: fixed("dt"),
            dd: fixed("dd"),
            known_names,
        }
    }

    /// Run the strategies in order; `raw_html` feeds the markup scan
    pub fn extract(&self, doc: &PageDocument, raw_html: &str) -> SpecsExtraction {
        let attempts: [(SpecStrategy, &dyn Fn() -> Option<Vec<(String, String)>>); 5] = [
            (SpecStrategy::TableRows, &|| self.from_table_rows(doc)),
            (SpecStrategy::LabelValuePairs, &|| self.from_label_value_pairs(doc)),
            (SpecStrategy::ColonSplit, &|| self.from_colon_split(doc)),
            (SpecStrategy::MarkupScan, &|| Self::from_markup_scan(raw_html)),
            (SpecStrategy::KeywordAnchor, &|| self.from_keyword_anchors(doc)),
        ];

        for (strategy, attempt) in attempts {
            if let Some(pairs) = attempt() {
                debug!("Extracted {} specifications using {}", pairs.len(), strategy);
                return SpecsExtraction {
                    strategy: Some(strategy),
                    pairs,
                };
            }
        }

        debug!("No specifications found by any strategy");
        SpecsExtraction::default()
    }

    fn first_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
        scope
            .select(selector)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    }

    fn from_table_rows(&self, doc: &PageDocument) -> Option<Vec<(String, String)>> {
        let mut collector = PairCollector::default();

        for table_selector in &self.tables {
            for table in doc.select(table_selector) {
                for row in table.select(&self.row) {
                    let cells: Vec<String> = row.select(&self.cells).map(|c| element_text(&c)).collect();
                    let label = match &self.label {
                        Some(sel) => Self::first_text(&row, sel),
                        None => cells.first().cloned(),
                    };
                    let value = match &self.value {
                        Some(sel) => Self::first_text(&row, sel),
                        None => cells.get(1).cloned(),
                    };
                    if let (Some(label), Some(value)) = (label, value) {
                        collector.push(&label, &value);
                    }
                }
            }
        }

        collector.finish()
    }

    fn from_label_value_pairs(&self, doc: &PageDocument) -> Option<Vec<(String, String)>> {
        let mut collector = PairCollector::default();

        for row_selector in &self.pair_rows {
            for row in doc.select(row_selector) {
                if row.value().name() == "dl" {
                    let terms = row.select(&self.dt).map(|el| element_text(&el));
                    let definitions = row.select(&self.dd).map(|el| element_text(&el));
                    for (label, value) in terms.zip(definitions) {
                        collector.push(&label, &value);
                    }
                    continue;
                }

                if let (Some(label_sel), Some(value_sel)) = (&self.label, &self.value) {
                    if let (Some(label), Some(value)) =
                        (Self::first_text(&row, label_sel), Self::first_text(&row, value_sel))
                    {
                        collector.push(&label, &value);
                    }
                    continue;
                }

                let texts: Vec<String> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .map(|child| element_text(&child))
                    .filter(|text| !text.is_empty())
                    .take(2)
                    .collect();
                if let [label, value] = texts.as_slice() {
                    collector.push(label, value);
                }
            }
        }

        collector.finish()
    }

    fn from_colon_split(&self, doc: &PageDocument) -> Option<Vec<(String, String)>> {
        let mut collector = PairCollector::default();

        for element in doc.select(&self.colon_candidates) {
            let text = element_text(&element);
            if let Some((label, value)) = text.split_once([':', '：']) {
                collector.push(label, value);
            }
        }

        collector.finish()
    }

    fn from_markup_scan(raw_html: &str) -> Option<Vec<(String, String)>> {
        let mut collector = PairCollector::default();

        for pattern in [&*CELL_PAIR, &*TERM_PAIR, &*STRONG_LABEL] {
            for captures in pattern.captures_iter(raw_html) {
                if let (Some(label), Some(value)) = (captures.get(1), captures.get(2)) {
                    collector.push(&strip_markup(label.as_str()), &strip_markup(value.as_str()));
                }
            }
        }

        collector.finish()
    }

    fn from_keyword_anchors(&self, doc: &PageDocument) -> Option<Vec<(String, String)>> {
        let mut collector = PairCollector::default();
        let lines = doc.visible_lines();

        for (index, line) in lines.iter().enumerate() {
            let Some((name, rest)) = self.match_known_name(line) else {
                continue;
            };
            let value = if rest.is_empty() {
                lines.get(index + 1).map(String::as_str).unwrap_or_default()
            } else {
                rest
            };
            collector.push(name, value);
        }

        collector.finish()
    }

    /// Known spec name at the start of `line` and the text after it
    fn match_known_name<'l>(&self, line: &'l str) -> Option<(&'static str, &'l str)> {
        let trimmed = line.trim_start_matches(|c: char| c == '•' || c == '-' || c == '*' || c.is_whitespace());
        self.known_names.iter().find_map(|name| {
            let head = trimmed.get(..name.len())?;
            if head.to_lowercase() != name.to_lowercase() {
                return None;
            }
            let rest = &trimmed[name.len()..];
            if rest.chars().next().is_some_and(char::is_alphanumeric) {
                return None;
            }
            let rest = rest.trim_start_matches(|c: char| c == ':' || c == '：' || c == '-' || c.is_whitespace());
            Some((*name, rest.trim()))
        })
    }
}

/// Tags removed and common entities decoded
fn strip_markup(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    collapse_whitespace(&text)
}
