//! Catalog extraction: page fetching, page-count discovery, bounded parallel
//! collection, and credential recovery.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use catalog_export::catalog::{CatalogClient, DEFAULT_API_URL, ExtractOptions, extract_catalog};
//! use catalog_export::credential::{Credential, StdinPrompt};
//! use catalog_export::download::{HttpClient, RetryPolicy};
//! use catalog_export::download::constants::API_TIMEOUT;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = HttpClient::new(API_TIMEOUT)?;
//! let source = Arc::new(CatalogClient::new(http, DEFAULT_API_URL, RetryPolicy::default())?);
//! let credential = Credential::new("token").ok_or("empty token")?;
//! let extraction =
//!     extract_catalog(source, credential, &StdinPrompt, &ExtractOptions::default()).await?;
//! println!("{} items over {} pages", extraction.items.len(), extraction.total_pages);
//! # Ok(())
//! # }
//! ```

mod collector;
mod error;
mod extract;
mod item;
mod page;
mod pagination;

pub use collector::{DEFAULT_PAGE_WORKERS, collect_pages};
pub use error::ExtractError;
pub use extract::{ExtractOptions, Extraction, extract_catalog};
pub use item::{CatalogIndex, CatalogItem, RawRecord, parse_page_body};
pub use page::{CatalogClient, FetchOutcome, PageSource};
pub use pagination::{
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_DELAY, Discovery, PaginationOptions, discover_page_count,
};

/// Default list endpoint.
pub const DEFAULT_API_URL: &str = "https://studio-api.prod.suno.com/api/feed/v2?hide_disliked=true&hide_gen_stems=true&hide_studio_clips=true";
