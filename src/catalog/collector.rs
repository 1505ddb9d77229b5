//! Parallel page collection over a bounded worker pool.
//!
//! One task per page is submitted up front; a semaphore caps how many run
//! at once. The first failed page raises an abort flag: tasks still waiting
//! for a permit skip their request, tasks already in flight run to
//! completion, and every result is discarded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::error::ExtractError;
use super::item::{CatalogIndex, RawRecord};
use super::page::{FetchOutcome, PageSource};
use crate::credential::Credential;
use crate::download::DownloadError;

/// Default number of concurrent page requests.
pub const DEFAULT_PAGE_WORKERS: usize = 5;

/// What a single page task produced.
enum PageTask {
    Fetched(Result<FetchOutcome, DownloadError>),
    Skipped,
}

/// Fetches pages `1..=total_pages` with at most `workers` requests in flight
/// and merges them into a deduplicated index.
///
/// Pages are merged in ascending page order regardless of completion order,
/// so the first record seen for an identity is the one from the lowest page.
///
/// # Errors
///
/// - [`ExtractError::CredentialExpiredDuringCollection`] when any page is
///   rejected with 401/403
/// - [`ExtractError::PageFailed`] when any page exhausts its retries
/// - [`ExtractError::Worker`] when a page task panics
///
/// No partial index is returned on error.
#[instrument(skip(source, credential))]
pub async fn collect_pages(
    source: Arc<dyn PageSource>,
    credential: &Credential,
    total_pages: u32,
    workers: usize,
) -> Result<CatalogIndex, ExtractError> {
    let workers = workers.max(1);
    info!(total_pages, workers, "fetching all pages");

    let semaphore = Arc::new(Semaphore::new(workers));
    let aborted = Arc::new(AtomicBool::new(false));
    let mut tasks = JoinSet::new();

    for page in 1..=total_pages {
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let aborted = Arc::clone(&aborted);
        let credential = credential.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (page, PageTask::Skipped);
            };
            if aborted.load(Ordering::SeqCst) {
                return (page, PageTask::Skipped);
            }
            (
                page,
                PageTask::Fetched(source.fetch_page(page, &credential).await),
            )
        });
    }

    let mut pages: BTreeMap<u32, Vec<RawRecord>> = BTreeMap::new();
    let mut first_failure: Option<ExtractError> = None;
    let mut skipped = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok((_, PageTask::Skipped)) => {
                skipped += 1;
                None
            }
            Ok((page, PageTask::Fetched(Ok(FetchOutcome::Items(records))))) => {
                debug!(page, records = records.len(), "page fetched");
                pages.insert(page, records);
                None
            }
            Ok((page, PageTask::Fetched(Ok(FetchOutcome::EmptyEnd)))) => {
                debug!(page, "page came back empty");
                pages.insert(page, Vec::new());
                None
            }
            Ok((page, PageTask::Fetched(Ok(FetchOutcome::AuthFailure)))) => {
                Some(ExtractError::CredentialExpiredDuringCollection { page })
            }
            Ok((page, PageTask::Fetched(Err(source)))) => {
                Some(ExtractError::PageFailed { page, source })
            }
            Err(join_error) => Some(ExtractError::Worker(join_error)),
        };

        if let Some(failure) = failure {
            if first_failure.is_none() {
                error!(error = %failure, "aborting page collection");
                aborted.store(true, Ordering::SeqCst);
                first_failure = Some(failure);
            } else {
                warn!(error = %failure, "additional page failure after abort");
            }
        }
    }

    if let Some(failure) = first_failure {
        debug!(
            fetched = pages.len(),
            skipped, "discarding partial page results"
        );
        return Err(failure);
    }

    let index = CatalogIndex::from_pages(pages);
    info!(items = index.len(), "collected unique items");
    Ok(index)
}
