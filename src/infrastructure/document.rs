//! Parsed page helpers on top of `scraper`
//!
//! `PageDocument` is not `Send`; it is built from page source inside synchronous
//! extraction code and dropped before the engine awaits again.

use scraper::{ElementRef, Html, Selector};

use crate::infrastructure::normalize::collapse_whitespace;

const INVISIBLE_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(selector)
    }

    pub fn has_match(&self, selector: &Selector) -> bool {
        self.html.select(selector).next().is_some()
    }

    pub fn title(&self) -> String {
        Selector::parse("title")
            .ok()
            .and_then(|sel| self.html.select(&sel).next().map(|el| element_text(&el)))
            .unwrap_or_default()
    }

    /// Visible text nodes of the whole page, one per line
    pub fn visible_lines(&self) -> Vec<String> {
        text_lines(&self.root())
    }

    /// First block marker found in the title or visible body text
    pub fn block_marker<'m>(&self, markers: &'m [String]) -> Option<&'m str> {
        if markers.is_empty() {
            return None;
        }
        let haystack = format!("{}\n{}", self.title(), self.visible_lines().join("\n")).to_lowercase();
        markers
            .iter()
            .map(String::as_str)
            .find(|marker| !marker.is_empty() && haystack.contains(&marker.to_lowercase()))
    }
}

/// Visible text of an element with whitespace collapsed
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&text_lines(element).join(" "))
}

/// Visible, non-empty text nodes under an element
pub fn text_lines(element: &ElementRef<'_>) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .filter_map(|ancestor| ancestor.value().as_element())
                .any(|el| INVISIBLE_ELEMENTS.contains(&el.name()));
            if hidden {
                return None;
            }
            let text = collapse_whitespace(text);
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

/// First non-empty attribute among `names`
pub fn element_attr(element: &ElementRef<'_>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Compile a selector, logging instead of failing on bad input
pub fn compile_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!("Failed to compile selector '{}': {}", selector, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Galaxy S23 | Shop</title><script>var captcha = 1;</script></head>
        <body>
          <h1 class="name">  Galaxy
             S23 </h1>
          <img class="main" data-src="/img/s23.jpg">
          <style>.x { color: red }</style>
          <p>In stock</p>
        </body></html>"#;

    #[test]
    fn test_text_skips_scripts_and_styles() {
        let doc = PageDocument::parse(PAGE);
        let lines = doc.visible_lines();
        assert!(lines.contains(&"Galaxy S23".to_string()));
        assert!(lines.iter().all(|l| !l.contains("captcha") && !l.contains("color")));
        assert_eq!(doc.title(), "Galaxy S23 | Shop");
    }

    #[test]
    fn test_block_marker_ignores_script_content() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(doc.block_marker(&["captcha".to_string()]), None);
        assert_eq!(doc.block_marker(&["in stock".to_string()]), Some("in stock"));
    }

    #[test]
    fn test_element_attr_takes_first_non_empty() {
        let doc = PageDocument::parse(PAGE);
        let sel = Selector::parse("img").unwrap();
        let img = doc.select(&sel).next().unwrap();
        assert_eq!(element_attr(&img, &["src", "data-src"]), Some("/img/s23.jpg".to_string()));
    }

    #[test]
    fn test_compile_selector_rejects_garbage() {
        assert!(compile_selector("div[[[").is_none());
        assert!(compile_selector("div.price").is_some());
    }
}
