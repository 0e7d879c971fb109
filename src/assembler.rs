use crate::constants::UNKNOWN;
use crate::date_normalizer::DateNormalizer;
use crate::document::{Document, HtmlDocument};
use crate::error::AssemblyError;
use crate::extractor::{extract_all, extract_field, EventSelectors};
use crate::types::EventRecord;
use tracing::{debug, instrument};

/// Turns one event page into an [`EventRecord`].
///
/// Holds no mutable state, so one instance can be shared by every worker.
#[derive(Debug, Clone)]
pub struct EventAssembler {
    selectors: EventSelectors,
    normalizer: DateNormalizer,
}

impl EventAssembler {
    pub fn new(selectors: EventSelectors, normalizer: DateNormalizer) -> Self {
        Self {
            selectors,
            normalizer,
        }
    }

    pub fn selectors(&self) -> &EventSelectors {
        &self.selectors
    }

    #[instrument(skip_all, fields(link = %link))]
    pub fn assemble<D: Document + ?Sized>(
        &self,
        document: &D,
        link: &str,
    ) -> Result<EventRecord, AssemblyError> {
        let s = &self.selectors;

        let title = extract_field(document, &s.title)
            .ok_or(AssemblyError::MissingIdentityField { field: "title" })?;
        let location = extract_field(document, &s.location)
            .ok_or(AssemblyError::MissingIdentityField { field: "location" })?;

        let date = match extract_field(document, &s.date) {
            Some(raw) => self.normalizer.normalize(&raw)?,
            None => UNKNOWN.to_string(),
        };

        let or_unknown = |value: Option<String>| value.unwrap_or_else(|| UNKNOWN.to_string());

        let record = EventRecord {
            title,
            description_source: or_unknown(extract_field(document, &s.description)),
            description_generated: None,
            date,
            schedule: or_unknown(extract_field(document, &s.schedule)),
            location,
            address: or_unknown(extract_field(document, &s.address)),
            prices: extract_all(document, &s.prices),
        };

        debug!("Assembled event: {}", record.title);
        Ok(record)
    }

    /// Parses `markup` and assembles it in one synchronous step.
    pub fn assemble_html(&self, markup: &str, link: &str) -> Result<EventRecord, AssemblyError> {
        let document = HtmlDocument::parse(markup);
        self.assemble(&document, link)
    }
}
