use std::path::PathBuf;
use thiserror::Error;

/// Startup-only failures. Nothing in a run is attempted once one of these is raised.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid selector for field '{field}': '{expr}' ({reason})")]
    InvalidSelector {
        field: String,
        expr: String,
        reason: String,
    },

    #[error("No selector candidates configured for field '{field}'")]
    EmptyCandidates { field: String },

    #[error("Month table does not cover month(s): {missing:?}")]
    IncompleteMonthTable { missing: Vec<u32> },

    #[error("Month abbreviation '{abbreviation}' is listed more than once")]
    DuplicateMonth { abbreviation: String },

    #[error("Month abbreviation '{abbreviation}' maps to invalid month number {number}")]
    InvalidMonthNumber { abbreviation: String, number: u32 },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Description generation is enabled but no API key was found in '{env_var}'")]
    MissingApiKey { env_var: String },

    #[error("HTTP client could not be built: {0}")]
    Http(String),

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Unknown month abbreviation '{abbreviation}' in date '{raw}'")]
    UnknownMonth { abbreviation: String, raw: String },
}

/// Per-record failure. Skips exactly one link; the run goes on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Missing required field: {field}")]
    MissingIdentityField { field: &'static str },

    #[error("Date normalization failed: {0}")]
    Date(#[from] DateError),
}

/// Failure of an external collaborator: the page source or the description generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Fetching '{url}' failed: {message}")]
    Fetch { url: String, message: String },

    #[error("Fetching '{url}' returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Fetching '{url}' timed out")]
    Timeout { url: String },

    #[error("Description generation failed: {0}")]
    Generation(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read collection '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Collection '{path}' is not a valid event array: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode collection: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to write collection '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Listing page could not be obtained: {0}")]
    Listing(CollaboratorError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
