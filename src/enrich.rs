use crate::app::ports::{DescriptionGeneratorPort, DescriptionRequest};
use crate::error::CollaboratorError;
use crate::types::EventRecord;
use std::sync::Arc;
use tracing::{instrument, warn};

impl From<&EventRecord> for DescriptionRequest {
    fn from(record: &EventRecord) -> Self {
        Self {
            title: record.title.clone(),
            date: record.date.clone(),
            location: record.location.clone(),
            prices: record.prices.clone(),
            description_source: record.description_source.clone(),
        }
    }
}

/// Optional step that fills `description_generated` after assembly.
#[derive(Clone)]
pub struct DescriptionEnricher {
    generator: Arc<dyn DescriptionGeneratorPort>,
}

impl DescriptionEnricher {
    pub fn new(generator: Arc<dyn DescriptionGeneratorPort>) -> Self {
        Self { generator }
    }

    /// On failure the record is left untouched and still fit to persist.
    #[instrument(skip_all, fields(title = %record.title))]
    pub async fn enrich(&self, record: &mut EventRecord) -> Result<(), CollaboratorError> {
        let request = DescriptionRequest::from(&*record);
        match self.generator.generate(&request).await {
            Ok(text) => {
                record.description_generated = Some(text);
                Ok(())
            }
            Err(e) => {
                warn!("Description generation failed: {}", e);
                Err(e)
            }
        }
    }
}
