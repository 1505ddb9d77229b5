//! Catalog Export Library
//!
//! Bulk-exports a user's private media catalog from a paginated,
//! bearer-authenticated API: discovers how many pages exist, fetches them
//! over a bounded worker pool, deduplicates records by identity, then
//! downloads each item with collision-safe naming and optional cover art.
//!
//! # Architecture
//!
//! - [`catalog`] - Page fetching, discovery, parallel collection, credential recovery
//! - [`download`] - HTTP client pool, retry discipline, streaming downloads
//! - [`tagging`] - ID3 cover/title/artist embedding
//! - [`credential`] - Bearer credential and replacement providers
//! - [`config`] - Run configuration
//! - [`pipeline`] - End-to-end run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod credential;
pub mod download;
pub mod pipeline;
pub mod tagging;
mod user_agent;

// Re-export commonly used types
pub use catalog::{
    CatalogClient, CatalogIndex, CatalogItem, ExtractError, ExtractOptions, Extraction,
    PageSource, extract_catalog,
};
pub use config::{ExportConfig, parse_proxy_list};
pub use credential::{Credential, CredentialProvider, NoReplacement, StdinPrompt};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, EngineError, ExportEngine, ExportStats, FailureType,
    HttpClient, RetryDecision, RetryPolicy, classify_error,
};
pub use pipeline::{RunError, RunReport, run};
