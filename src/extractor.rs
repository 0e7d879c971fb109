use crate::config::SelectorConfig;
use crate::document::{Document, SelectorCandidateList};
use crate::error::ConfigError;
use reqwest::Url;
use std::collections::HashSet;
use tracing::debug;

/// Text of the first candidate that matches at least one node.
///
/// Candidates are tried in list order, not document order. `None` means no
/// candidate matched, which is a normal outcome for optional fields.
pub fn extract_field<D: Document + ?Sized>(
    document: &D,
    candidates: &SelectorCandidateList,
) -> Option<String> {
    for selector in candidates.iter() {
        if let Some(text) = document.first_text(selector) {
            debug!(field = candidates.field(), selector = selector.as_str(), "Selector matched");
            return Some(text);
        }
    }
    None
}

/// Every node text for the first candidate that matches anything.
pub fn extract_all<D: Document + ?Sized>(
    document: &D,
    candidates: &SelectorCandidateList,
) -> Vec<String> {
    candidates
        .iter()
        .map(|selector| document.all_texts(selector))
        .find(|texts| !texts.is_empty())
        .unwrap_or_default()
}

/// Absolute event links found on a listing page, deduplicated, in page order.
pub fn extract_links<D: Document + ?Sized>(
    document: &D,
    candidates: &SelectorCandidateList,
    base: &Url,
) -> Vec<Url> {
    let hrefs = candidates
        .iter()
        .map(|selector| document.all_attrs(selector, "href"))
        .find(|hrefs| !hrefs.is_empty())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for href in hrefs {
        match base.join(&href) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
            Err(e) => debug!("Skipping unusable link '{}': {}", href, e),
        }
    }
    links
}

/// Compiled candidate lists for every field of an event page, plus the listing links.
#[derive(Debug, Clone)]
pub struct EventSelectors {
    pub listing_links: SelectorCandidateList,
    pub title: SelectorCandidateList,
    pub description: SelectorCandidateList,
    pub date: SelectorCandidateList,
    pub prices: SelectorCandidateList,
    pub schedule: SelectorCandidateList,
    pub location: SelectorCandidateList,
    pub address: SelectorCandidateList,
}

impl EventSelectors {
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            listing_links: SelectorCandidateList::parse("listing_links", &config.listing_links)?,
            title: SelectorCandidateList::parse("title", &config.title)?,
            description: SelectorCandidateList::parse("description", &config.description)?,
            date: SelectorCandidateList::parse("date", &config.date)?,
            prices: SelectorCandidateList::parse("prices", &config.prices)?,
            schedule: SelectorCandidateList::parse("schedule", &config.schedule)?,
            location: SelectorCandidateList::parse("location", &config.location)?,
            address: SelectorCandidateList::parse("address", &config.address)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HtmlDocument;

    fn list(field: &str, exprs: &[&str]) -> SelectorCandidateList {
        SelectorCandidateList::parse(field, exprs).unwrap()
    }

    #[test]
    fn falls_back_to_later_candidate() {
        let doc = HtmlDocument::parse("<html><body><h2>Concert</h2></body></html>");
        let title = extract_field(&doc, &list("title", &[".missing", "h2"]));
        assert_eq!(title.as_deref(), Some("Concert"));
    }

    #[test]
    fn list_order_beats_document_order() {
        let doc = HtmlDocument::parse("<p class='a'>first in page</p><p class='b'>second in page</p>");
        let got = extract_field(&doc, &list("x", &[".b", ".a"]));
        assert_eq!(got.as_deref(), Some("second in page"));
    }

    #[test]
    fn absent_when_nothing_matches() {
        let doc = HtmlDocument::parse("<div>nothing here</div>");
        assert_eq!(extract_field(&doc, &list("schedule", &["ul.evt_time", "#evt_time"])), None);
        assert!(extract_all(&doc, &list("prices", &["ul.evt_ticket > li"])).is_empty());
    }

    #[test]
    fn present_but_empty_is_not_absent() {
        let doc = HtmlDocument::parse("<div id='evt_time'>   </div>");
        assert_eq!(extract_field(&doc, &list("schedule", &["#evt_time"])).as_deref(), Some(""));
    }

    #[test]
    fn extract_all_keeps_every_node_of_first_matching_candidate() {
        let doc = HtmlDocument::parse(
            "<ul class='evt_ticket'><li> Intero 20 € </li><li>Ridotto 15 €</li></ul>\
             <div id='prztime'><li>ignored</li></div>",
        );
        let prices = extract_all(&doc, &list("prices", &[".none li", "ul.evt_ticket > li", "#prztime li"]));
        assert_eq!(prices, vec!["Intero 20 €", "Ridotto 15 €"]);
    }

    #[test]
    fn resolves_relative_links_and_drops_duplicates() {
        let doc = HtmlDocument::parse(
            r#"<h2><a itemprop="url" href="/italia/siena/eventi/a">A</a></h2>
               <h2><a itemprop="url" href="https://www.virgilio.it/italia/siena/eventi/b">B</a></h2>
               <h2><a itemprop="url" href="/italia/siena/eventi/a">A again</a></h2>"#,
        );
        let base = Url::parse("https://www.virgilio.it/italia/siena/eventi/concerti").unwrap();
        let links = extract_links(&doc, &list("listing_links", &["h2 > a[itemprop=\"url\"]"]), &base);
        let links: Vec<String> = links.into_iter().map(String::from).collect();
        assert_eq!(
            links,
            vec![
                "https://www.virgilio.it/italia/siena/eventi/a",
                "https://www.virgilio.it/italia/siena/eventi/b",
            ]
        );
    }

    #[test]
    fn default_selectors_compile() {
        assert!(EventSelectors::from_config(&SelectorConfig::default()).is_ok());
    }
}
