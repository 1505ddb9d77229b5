//! HTTP plumbing and the per-item download engine.
//!
//! # Features
//!
//! - Proxy pool with a random client per request
//! - Fixed-backoff retry loop shared by every network operation
//! - 401/403 surfaced as a distinct error so callers can recover credentials
//! - Streaming downloads through a hidden partial file, renamed on success
//! - Collision-safe output names (` v2`, ` v3`, ...)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use catalog_export::download::{HttpClient, RetryPolicy, download_with_retry};
//! use catalog_export::download::constants::FILE_TIMEOUT;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(FILE_TIMEOUT)?;
//! let outcome = download_with_retry(
//!     &client,
//!     "https://cdn.example.com/clip.mp3",
//!     Path::new("./exports/Night Drive.mp3"),
//!     None,
//!     &RetryPolicy::default(),
//! )
//! .await?;
//! println!("saved {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
pub mod filename;
mod retry;

pub use client::{FetchedBody, HttpClient, TransferResult};
pub use engine::{DownloadOutcome, EngineError, ExportEngine, ExportStats, download_with_retry};
pub use error::DownloadError;
pub use retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error, retry_with_policy,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
