use crate::constants::UNKNOWN;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const TITLE_KEY: &str = "Titolo evento";
pub const DATE_KEY: &str = "Data";
pub const LOCATION_KEY: &str = "Luogo";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Older collection files stored the price block as a single string.
fn prices_from_either<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Prices {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Prices>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Prices::One(s)) if s == UNKNOWN || s.trim().is_empty() => Vec::new(),
        Some(Prices::One(s)) => vec![s],
        Some(Prices::Many(v)) => v,
    })
}

/// One event as persisted in the collection file.
///
/// Field names on the wire match the historical collection files so identity keys
/// computed over old entries stay comparable with fresh ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Titolo evento", default = "unknown")]
    pub title: String,

    #[serde(rename = "Descrizione di Virgilio.it", default = "unknown")]
    pub description_source: String,

    #[serde(rename = "Descrizione Groq", default)]
    pub description_generated: Option<String>,

    /// Always in canonical form, or the raw text when the normalizer did not recognize it.
    #[serde(rename = "Data", default = "unknown")]
    pub date: String,

    #[serde(rename = "Orario", default = "unknown")]
    pub schedule: String,

    #[serde(rename = "Luogo", default = "unknown")]
    pub location: String,

    #[serde(rename = "Indirizzo", default = "unknown")]
    pub address: String,

    #[serde(rename = "Prezzo", default, deserialize_with = "prices_from_either")]
    pub prices: Vec<String>,
}

impl EventRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            title: self.title.clone(),
            date: self.date.clone(),
            location: self.location.clone(),
        }
    }
}

/// Anything that can be compared by identity key, typed record or raw stored entry.
pub trait HasIdentity {
    fn identity_key(&self) -> IdentityKey;
}

impl HasIdentity for EventRecord {
    fn identity_key(&self) -> IdentityKey {
        EventRecord::identity_key(self)
    }
}

/// Stored entries are read as raw JSON; missing or non-string key fields count as the sentinel.
impl HasIdentity for Value {
    fn identity_key(&self) -> IdentityKey {
        let field = |name: &str| {
            self.get(name)
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN)
                .to_string()
        };
        IdentityKey {
            title: field(TITLE_KEY),
            date: field(DATE_KEY),
            location: field(LOCATION_KEY),
        }
    }
}

/// `(title, date, location)` exactly as stored. Two records with equal keys are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub title: String,
    pub date: String,
    pub location: String,
}

/// Counts reported at the end of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub assembled: usize,
    pub added: usize,
    pub failed: usize,
    pub enrichment_failed: usize,
    /// Size of the persisted collection after the merge
    pub total: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub errors: Vec<String>,
}
