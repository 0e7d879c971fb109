//! Read-only view over a rendered page.
//!
//! Extraction code only needs "find the nodes matching this selector and give me
//! their text", so that is all [`Document`] exposes. [`HtmlDocument`] satisfies it
//! from static markup; a headless-browser backend can satisfy it from a live DOM
//! using [`CssSelector::as_str`].

use crate::error::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// A CSS selector validated at configuration time.
#[derive(Clone)]
pub struct CssSelector {
    expr: String,
    compiled: Selector,
}

impl CssSelector {
    pub fn parse(field: &str, expr: &str) -> Result<Self, ConfigError> {
        let compiled = Selector::parse(expr).map_err(|e| ConfigError::InvalidSelector {
            field: field.to_string(),
            expr: expr.to_string(),
            reason: format!("{e:?}"),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    pub(crate) fn compiled(&self) -> &Selector {
        &self.compiled
    }
}

impl fmt::Debug for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CssSelector").field(&self.expr).finish()
    }
}

/// Ordered selector candidates for one field; the first one that matches wins.
#[derive(Debug, Clone)]
pub struct SelectorCandidateList {
    field: String,
    candidates: Vec<CssSelector>,
}

impl SelectorCandidateList {
    /// Compiles every candidate. A malformed expression or an empty list is fatal.
    pub fn parse<S: AsRef<str>>(field: &str, exprs: &[S]) -> Result<Self, ConfigError> {
        if exprs.is_empty() {
            return Err(ConfigError::EmptyCandidates {
                field: field.to_string(),
            });
        }
        let candidates = exprs
            .iter()
            .map(|expr| CssSelector::parse(field, expr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            field: field.to_string(),
            candidates,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn iter(&self) -> impl Iterator<Item = &CssSelector> {
        self.candidates.iter()
    }
}

/// Capability the extractor depends on. Implementations must not mutate the page.
pub trait Document {
    /// Text of the first node matching `selector`, in document order.
    fn first_text(&self, selector: &CssSelector) -> Option<String>;

    /// Text of every node matching `selector`, in document order.
    fn all_texts(&self, selector: &CssSelector) -> Vec<String>;

    /// Value of `attr` on every matching node that carries it.
    fn all_attrs(&self, selector: &CssSelector, attr: &str) -> Vec<String>;
}

/// Static HTML parsed with `scraper`.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }
}

fn node_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl Document for HtmlDocument {
    fn first_text(&self, selector: &CssSelector) -> Option<String> {
        self.html.select(selector.compiled()).next().map(node_text)
    }

    fn all_texts(&self, selector: &CssSelector) -> Vec<String> {
        self.html.select(selector.compiled()).map(node_text).collect()
    }

    fn all_attrs(&self, selector: &CssSelector, attr: &str) -> Vec<String> {
        self.html
            .select(selector.compiled())
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_selector() {
        let err = SelectorCandidateList::parse("title", &["h2", "div[[bad"]).unwrap_err();
        match err {
            ConfigError::InvalidSelector { field, expr, .. } => {
                assert_eq!(field, "title");
                assert_eq!(expr, "div[[bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_candidate_list() {
        let exprs: [&str; 0] = [];
        assert!(matches!(
            SelectorCandidateList::parse("prices", &exprs),
            Err(ConfigError::EmptyCandidates { .. })
        ));
    }

    #[test]
    fn node_text_concatenates_and_trims() {
        let doc = HtmlDocument::parse("<div class='t'>\n  <b>Jazz</b> night \n</div>");
        let sel = CssSelector::parse("t", ".t").unwrap();
        assert_eq!(doc.first_text(&sel).as_deref(), Some("Jazz night"));
    }

    #[test]
    fn collects_attributes_in_document_order() {
        let doc = HtmlDocument::parse(
            r#"<h2><a href="/a">A</a></h2><h2><a>no link</a></h2><h2><a href=" /b ">B</a></h2>"#,
        );
        let sel = CssSelector::parse("links", "h2 > a").unwrap();
        assert_eq!(doc.all_attrs(&sel, "href"), vec!["/a", "/b"]);
    }
}
