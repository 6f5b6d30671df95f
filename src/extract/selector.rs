//! Field selectors
//!
//! A [`FieldSelector`] pulls one value out of a candidate node (or a list of
//! values out of a whole document) using a CSS sub-selector, an extraction
//! mode and an optional regex refinement.

use crate::config::SelectorConfig;
use crate::extract::context::FieldValue;
use crate::extract::escape::escape_markup;
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// What part of a matched element becomes the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractMode {
    /// Concatenated text of the element and its descendants
    Text,
    /// Inner markup of the element
    Html,
    /// Markup of the element including its own tag
    OuterHtml,
    /// Value of the named attribute
    Attr(String),
}

impl ExtractMode {
    /// Parses the configured `attr` string
    ///
    /// Empty and `"text"` select text, `"html"` and `"outer_html"` select
    /// markup, and anything else names an attribute.
    pub fn parse(attr: &str) -> Self {
        match attr {
            "" | "text" => Self::Text,
            "html" => Self::Html,
            "outer_html" => Self::OuterHtml,
            other => Self::Attr(other.to_string()),
        }
    }

    /// Markup modes pass values through unescaped
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Html | Self::OuterHtml)
    }
}

/// A compiled field selector
#[derive(Debug, Clone)]
pub struct FieldSelector {
    source: String,
    selector: Option<Selector>,
    mode: ExtractMode,
    regex: Option<Regex>,
}

impl FieldSelector {
    /// Compiles a selector configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSelector` or `ConfigError::InvalidRegex`
    /// when the CSS selector or regex does not compile.
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        let selector = if config.selector.trim().is_empty() {
            None
        } else {
            Some(parse_css(&config.selector)?)
        };

        let regex = if config.regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&config.regex).map_err(|source| ConfigError::InvalidRegex {
                    pattern: config.regex.clone(),
                    source,
                })?,
            )
        };

        Ok(Self {
            source: config.selector.clone(),
            selector,
            mode: ExtractMode::parse(&config.attr),
            regex,
        })
    }

    /// Extracts a single value scoped to a candidate node
    ///
    /// With an empty sub-selector the node itself is used. A missing
    /// sub-element or attribute is logged and yields an empty string.
    pub fn extract_from(&self, node: ElementRef<'_>) -> String {
        let element = match &self.selector {
            Some(selector) => match node.select(selector).next() {
                Some(el) => el,
                None => {
                    tracing::warn!("Sub element not found for selector '{}'", self.source);
                    return String::new();
                }
            },
            None => node,
        };

        match self.raw_value(element) {
            Some(raw) => self.finish(raw),
            None => {
                tracing::warn!(
                    "Attribute {:?} not found on element for selector '{}'",
                    self.mode,
                    self.source
                );
                String::new()
            }
        }
    }

    /// Extracts values from every matching node of a document
    ///
    /// No match yields an empty text, one match a text, more than one a list.
    /// Nodes missing the configured attribute are skipped.
    pub fn extract_from_document(&self, document: &Html) -> FieldValue {
        let elements: Vec<ElementRef<'_>> = match &self.selector {
            Some(selector) => document.select(selector).collect(),
            None => vec![document.root_element()],
        };

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            match self.raw_value(element) {
                Some(raw) => values.push(self.finish(raw)),
                None => tracing::warn!(
                    "Attribute {:?} not found in document for selector '{}'",
                    self.mode,
                    self.source
                ),
            }
        }

        match values.len() {
            0 => FieldValue::Text(String::new()),
            1 => FieldValue::Text(values.remove(0)),
            _ => FieldValue::List(values),
        }
    }

    fn raw_value(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.mode {
            ExtractMode::Text => Some(element.text().collect()),
            ExtractMode::Html => Some(element.inner_html()),
            ExtractMode::OuterHtml => Some(element.html()),
            ExtractMode::Attr(name) => element.value().attr(name).map(str::to_string),
        }
    }

    fn finish(&self, raw: String) -> String {
        let refined = match &self.regex {
            Some(regex) => match regex.captures(&raw).and_then(|caps| caps.get(1)) {
                Some(m) => m.as_str().to_string(),
                None => {
                    tracing::debug!("Regex did not match, keeping raw text: {}", raw);
                    raw
                }
            },
            None => raw,
        };

        if self.mode.is_markup() {
            refined
        } else {
            escape_markup(&refined)
        }
    }
}

/// Parses a CSS selector, mapping the error into a configuration error
pub fn parse_css(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(selector: &str, attr: &str, regex: &str) -> FieldSelector {
        FieldSelector::compile(&SelectorConfig {
            selector: selector.to_string(),
            attr: attr.to_string(),
            regex: regex.to_string(),
        })
        .unwrap()
    }

    fn first_node<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    const LISTING: &str = r#"
        <ul>
            <li class="item">
                <a class="title" href="/post/1?x=1&amp;y=2">First &amp; best</a>
                <span class="meta">posted 2021-11-01 04:20 by admin</span>
                <div class="body"><p>Hello <b>world</b></p></div>
            </li>
        </ul>
    "#;

    #[test]
    fn test_text_mode_is_default() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(compile("a.title", "", "").extract_from(node), "First &amp; best");
        assert_eq!(compile("a.title", "text", "").extract_from(node), "First &amp; best");
    }

    #[test]
    fn test_attr_mode_escapes_value() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(
            compile("a.title", "href", "").extract_from(node),
            "/post/1?x=1&amp;y=2"
        );
    }

    #[test]
    fn test_html_mode_passes_markup_through() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(
            compile("div.body", "html", "").extract_from(node),
            "<p>Hello <b>world</b></p>"
        );
    }

    #[test]
    fn test_outer_html_mode() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(
            compile("b", "outer_html", "").extract_from(node),
            "<b>world</b>"
        );
    }

    #[test]
    fn test_regex_keeps_first_capture_group() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        let selector = compile("span.meta", "", r"(\d{4}-\d+-\d+ \d+:\d+)");
        assert_eq!(selector.extract_from(node), "2021-11-01 04:20");
    }

    #[test]
    fn test_regex_miss_keeps_raw_text() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        let selector = compile("span.meta", "", r"(\d{6})");
        assert_eq!(selector.extract_from(node), "posted 2021-11-01 04:20 by admin");
    }

    #[test]
    fn test_missing_sub_element_yields_empty() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(compile("span.absent", "", "").extract_from(node), "");
    }

    #[test]
    fn test_missing_attribute_yields_empty() {
        let doc = Html::parse_document(LISTING);
        let node = first_node(&doc, "li.item");
        assert_eq!(compile("span.meta", "data-id", "").extract_from(node), "");
    }

    #[test]
    fn test_empty_selector_uses_node_itself() {
        let doc = Html::parse_document(r#"<a class="x" href="/self">t</a>"#);
        let node = first_node(&doc, "a.x");
        assert_eq!(compile("", "href", "").extract_from(node), "/self");
    }

    #[test]
    fn test_document_scope_cardinality() {
        let doc = Html::parse_document(
            r#"<div><img src="/a.png"><img src="/b.png"><p>only</p></div>"#,
        );
        assert_eq!(
            compile("img", "src", "").extract_from_document(&doc),
            FieldValue::List(vec!["/a.png".to_string(), "/b.png".to_string()])
        );
        assert_eq!(
            compile("p", "", "").extract_from_document(&doc),
            FieldValue::Text("only".to_string())
        );
        assert_eq!(
            compile("table", "", "").extract_from_document(&doc),
            FieldValue::Text(String::new())
        );
    }

    #[test]
    fn test_document_scope_skips_nodes_without_attr() {
        let doc = Html::parse_document(r#"<a href="/1">a</a><a>b</a>"#);
        assert_eq!(
            compile("a", "href", "").extract_from_document(&doc),
            FieldValue::Text("/1".to_string())
        );
    }

    #[test]
    fn test_invalid_css_is_config_error() {
        let result = FieldSelector::compile(&SelectorConfig {
            selector: "li[".to_string(),
            attr: String::new(),
            regex: String::new(),
        });
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let result = FieldSelector::compile(&SelectorConfig {
            selector: "a".to_string(),
            attr: String::new(),
            regex: "(unclosed".to_string(),
        });
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }
}
