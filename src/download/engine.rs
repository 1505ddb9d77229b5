//! Per-item export engine: download each catalog item, then embed its cover.
//!
//! Items are processed one after another. A failed item is logged and
//! counted; it never stops the run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use catalog_export::catalog::CatalogIndex;
//! use catalog_export::credential::Credential;
//! use catalog_export::download::{ExportEngine, HttpClient, RetryPolicy};
//! use catalog_export::download::constants::FILE_TIMEOUT;
//!
//! # async fn example(index: CatalogIndex, credential: Credential) -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(FILE_TIMEOUT)?;
//! let engine = ExportEngine::new(client, RetryPolicy::default(), true);
//! let stats = engine.export(&index, &credential, Path::new("./exports")).await?;
//! println!("downloaded {}, failed {}", stats.downloaded(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, instrument, warn};

use super::filename::{filename_for_item, resolve_versioned_path};
use super::retry::{RetryPolicy, retry_with_policy};
use super::{DownloadError, HttpClient};
use crate::catalog::{CatalogIndex, CatalogItem};
use crate::credential::Credential;
use crate::tagging::{TrackTags, embed_metadata};

/// Error type for export engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Statistics from one export run.
#[derive(Debug, Default)]
pub struct ExportStats {
    downloaded: AtomicUsize,
    renamed: AtomicUsize,
    embedded: AtomicUsize,
    embed_failed: AtomicUsize,
    failed: AtomicUsize,
}

impl ExportStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items whose audio file was written.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Downloaded items saved under a ` vN` name because the title was taken.
    #[must_use]
    pub fn renamed(&self) -> usize {
        self.renamed.load(Ordering::SeqCst)
    }

    /// Items whose cover art was embedded.
    #[must_use]
    pub fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    /// Downloaded items whose cover embedding failed.
    #[must_use]
    pub fn embed_failed(&self) -> usize {
        self.embed_failed.load(Ordering::SeqCst)
    }

    /// Items whose download failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Items processed (downloaded + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded() + self.failed()
    }

    fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outcome of a successful item download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Path the file was written to.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// True when `path` differs from the desired path (version collision).
    pub renamed: bool,
}

/// Sequential export engine.
#[derive(Debug, Clone)]
pub struct ExportEngine {
    client: HttpClient,
    retry_policy: RetryPolicy,
    embed_covers: bool,
}

impl ExportEngine {
    /// Creates an engine over a file-profile client.
    ///
    /// When `embed_covers` is set, items with a cover URL get their cover,
    /// title, and artist embedded after download.
    #[must_use]
    pub fn new(client: HttpClient, retry_policy: RetryPolicy, embed_covers: bool) -> Self {
        Self {
            client,
            retry_policy,
            embed_covers,
        }
    }

    /// Downloads every item in `index` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the directory cannot be created.
    /// Individual item failures do NOT cause this method to error; they are
    /// logged and counted in the returned stats.
    #[instrument(skip(self, index, credential), fields(output_dir = %output_dir.display(), items = index.len()))]
    pub async fn export(
        &self,
        index: &CatalogIndex,
        credential: &Credential,
        output_dir: &Path,
    ) -> Result<ExportStats, EngineError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| EngineError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let stats = ExportStats::new();
        info!(items = index.len(), "starting download process");

        for item in index.iter() {
            self.export_item(item, credential, output_dir, &stats).await;
        }

        info!(
            downloaded = stats.downloaded(),
            renamed = stats.renamed(),
            embedded = stats.embedded(),
            embed_failed = stats.embed_failed(),
            failed = stats.failed(),
            output_dir = %output_dir.display(),
            "download process complete"
        );
        Ok(stats)
    }

    async fn export_item(
        &self,
        item: &CatalogItem,
        credential: &Credential,
        output_dir: &Path,
        stats: &ExportStats,
    ) {
        info!(title = %item.title, id = %item.id, "processing");
        let desired = output_dir.join(filename_for_item(&item.title, &item.id));

        let outcome = match download_with_retry(
            &self.client,
            &item.audio_url,
            &desired,
            Some(credential),
            &self.retry_policy,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(title = %item.title, id = %item.id, error = %e, "failed on item");
                ExportStats::increment(&stats.failed);
                return;
            }
        };

        ExportStats::increment(&stats.downloaded);
        if outcome.renamed {
            ExportStats::increment(&stats.renamed);
            info!(
                path = %outcome.path.display(),
                "saved as new version"
            );
        }

        if self.embed_covers
            && let Some(cover_url) = item.cover_url.as_deref()
        {
            let tags = TrackTags {
                title: Some(item.title.clone()),
                artist: item.display_name.clone(),
            };
            match embed_metadata(
                &self.client,
                &outcome.path,
                cover_url,
                tags,
                Some(credential),
                &self.retry_policy,
            )
            .await
            {
                Ok(()) => ExportStats::increment(&stats.embedded),
                Err(e) => {
                    warn!(title = %item.title, id = %item.id, error = %e, "failed to embed cover");
                    ExportStats::increment(&stats.embed_failed);
                }
            }
        }
    }
}

/// Downloads `url` to a collision-safe variant of `desired`, retrying the
/// whole transfer on transient failure.
///
/// The versioned path is resolved once, before the first request. Every
/// attempt restarts from byte zero; failed attempts leave nothing on disk.
///
/// # Errors
///
/// Returns the error of the final attempt once the retry budget is spent, or
/// immediately for non-retryable failures (rejected credential, local IO).
#[instrument(skip(client, credential, policy), fields(url = %url, desired = %desired.display()))]
pub async fn download_with_retry(
    client: &HttpClient,
    url: &str,
    desired: &Path,
    credential: Option<&Credential>,
    policy: &RetryPolicy,
) -> Result<DownloadOutcome, DownloadError> {
    let target = resolve_versioned_path(desired)
        .await
        .map_err(|e| DownloadError::io(desired, e))?;

    let transfer = retry_with_policy(policy, "download", |_| {
        client.download_to_path(url, &target, credential)
    })
    .await?;

    Ok(DownloadOutcome {
        renamed: transfer.path != desired,
        path: transfer.path,
        bytes: transfer.bytes,
    })
}
