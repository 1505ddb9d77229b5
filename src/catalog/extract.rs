//! Auth-recovering extraction: discovery, optional credential replacement,
//! then parallel collection.
//!
//! ```text
//! Discovering{1} --auth failure--> AwaitingCredential --replacement--> Discovering{2}
//!       |                                 |                                |
//!       +--pages--> Collecting            +--none--> CredentialRejected    +--auth failure--> CredentialRejected
//! ```
//!
//! A rejection during collection is never re-prompted: the credential was
//! just accepted by discovery, so it surfaces as
//! [`ExtractError::CredentialExpiredDuringCollection`].

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::collector::{DEFAULT_PAGE_WORKERS, collect_pages};
use super::error::ExtractError;
use super::item::CatalogIndex;
use super::page::PageSource;
use super::pagination::{Discovery, PaginationOptions, discover_page_count};
use crate::credential::{Credential, CredentialProvider};

/// Tuning for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Concurrent page requests during collection.
    pub workers: usize,
    /// Discovery page delay and ceiling.
    pub pagination: PaginationOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_PAGE_WORKERS,
            pagination: PaginationOptions::default(),
        }
    }
}

/// A complete catalog snapshot.
#[derive(Debug)]
pub struct Extraction {
    /// Unique items in first-seen order.
    pub items: CatalogIndex,
    /// The credential that was accepted; use it for downloads.
    pub credential: Credential,
    /// Pages discovered.
    pub total_pages: u32,
}

enum State {
    Discovering { attempt: u32, credential: Credential },
    AwaitingCredential,
    Collecting { credential: Credential, total_pages: u32 },
}

/// Runs the whole extraction.
///
/// # Errors
///
/// - [`ExtractError::CredentialRejected`] when discovery is rejected and no
///   replacement is given, or the replacement is rejected too
/// - [`ExtractError::CredentialExpiredDuringCollection`] on a rejection while
///   collecting
/// - [`ExtractError::NoPages`] when page 1 is empty
/// - [`ExtractError::NoItems`] when no record is usable
/// - any discovery or collection failure
#[instrument(skip_all, fields(workers = options.workers))]
pub async fn extract_catalog(
    source: Arc<dyn PageSource>,
    credential: Credential,
    provider: &dyn CredentialProvider,
    options: &ExtractOptions,
) -> Result<Extraction, ExtractError> {
    let mut state = State::Discovering {
        attempt: 1,
        credential,
    };

    loop {
        state = match state {
            State::Discovering {
                attempt,
                credential,
            } => match discover_page_count(source.as_ref(), &credential, &options.pagination)
                .await?
            {
                Discovery::Pages(0) => {
                    warn!("no pages found");
                    return Err(ExtractError::NoPages);
                }
                Discovery::Pages(total_pages) => State::Collecting {
                    credential,
                    total_pages,
                },
                Discovery::AuthFailure if attempt == 1 => State::AwaitingCredential,
                Discovery::AuthFailure => {
                    error!("replacement credential was rejected too");
                    return Err(ExtractError::CredentialRejected { replaced: true });
                }
            },

            State::AwaitingCredential => match provider.replacement().await {
                Some(credential) => {
                    info!("retrying with the new token");
                    State::Discovering {
                        attempt: 2,
                        credential,
                    }
                }
                None => {
                    error!("no replacement token supplied");
                    return Err(ExtractError::CredentialRejected { replaced: false });
                }
            },

            State::Collecting {
                credential,
                total_pages,
            } => {
                let items =
                    collect_pages(Arc::clone(&source), &credential, total_pages, options.workers)
                        .await?;
                if items.is_empty() {
                    warn!(total_pages, "no downloadable items found");
                    return Err(ExtractError::NoItems { pages: total_pages });
                }
                return Ok(Extraction {
                    items,
                    credential,
                    total_pages,
                });
            }
        };
    }
}
