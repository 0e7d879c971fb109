pub mod assembler;
pub mod config;
pub mod constants;
pub mod date_normalizer;
pub mod document;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod types;

// Ports and their adapters
pub mod app;
pub mod infra;
