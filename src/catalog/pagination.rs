//! Page-count discovery by sequential probing.

use std::time::Duration;

use tracing::{debug, info, instrument};

use super::error::ExtractError;
use super::page::{FetchOutcome, PageSource};
use crate::credential::Credential;

/// Default pause between two discovery requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling on discovered pages.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Discovery tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOptions {
    /// Pause after every non-empty page before probing the next one.
    pub page_delay: Duration,
    /// Highest page count accepted before giving up.
    pub max_pages: u32,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Result of a discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Number of non-empty pages before the first empty one.
    Pages(u32),
    /// The credential was rejected while probing.
    AuthFailure,
}

/// Requests pages 1, 2, ... until the first empty page and returns the number
/// of pages before it.
///
/// An auth failure stops probing at once and is returned as
/// [`Discovery::AuthFailure`].
///
/// # Errors
///
/// - [`ExtractError::PageFailed`] when a discovery request exhausts its retries
/// - [`ExtractError::PaginationDidNotTerminate`] when page `max_pages + 1`
///   is still non-empty
#[instrument(skip(source, credential, options), fields(max_pages = options.max_pages))]
pub async fn discover_page_count(
    source: &dyn PageSource,
    credential: &Credential,
    options: &PaginationOptions,
) -> Result<Discovery, ExtractError> {
    info!("determining total number of pages");
    let mut page = 1u32;

    loop {
        let outcome = source
            .fetch_page(page, credential)
            .await
            .map_err(|source| ExtractError::PageFailed { page, source })?;

        match outcome {
            FetchOutcome::AuthFailure => return Ok(Discovery::AuthFailure),
            FetchOutcome::EmptyEnd => {
                let total = page - 1;
                info!(total_pages = total, "found end of catalog");
                return Ok(Discovery::Pages(total));
            }
            FetchOutcome::Items(records) => {
                debug!(page, records = records.len(), "page has records");
                if page > options.max_pages {
                    return Err(ExtractError::PaginationDidNotTerminate {
                        max_pages: options.max_pages,
                    });
                }
                page += 1;
                if !options.page_delay.is_zero() {
                    tokio::time::sleep(options.page_delay).await;
                }
            }
        }
    }
}
