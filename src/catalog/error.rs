//! Error types for catalog extraction.

use thiserror::Error;

use crate::download::DownloadError;

/// Reasons an extraction ends without a usable catalog.
///
/// Every variant means "no items": the caller must not treat a partial
/// result as the full catalog.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The credential was rejected and no working replacement was supplied.
    #[error("credential rejected (replacement tried: {replaced})")]
    CredentialRejected {
        /// True when a replacement credential was tried and also rejected.
        replaced: bool,
    },

    /// The credential passed discovery but was rejected while collecting pages.
    #[error("credential rejected while fetching page {page}; restart with a valid token")]
    CredentialExpiredDuringCollection {
        /// The page whose request was rejected.
        page: u32,
    },

    /// A page request failed after exhausting its retries.
    #[error("failed to fetch page {page}: {source}")]
    PageFailed {
        /// The page that failed.
        page: u32,
        /// The terminal request error.
        #[source]
        source: DownloadError,
    },

    /// Discovery kept finding non-empty pages past the configured ceiling.
    #[error("pagination did not terminate within {max_pages} pages")]
    PaginationDidNotTerminate {
        /// The configured ceiling.
        max_pages: u32,
    },

    /// The very first page was already empty.
    #[error("no pages found")]
    NoPages,

    /// Pages were fetched but no record was complete enough to download.
    #[error("no downloadable items found across {pages} pages")]
    NoItems {
        /// Pages fetched.
        pages: u32,
    },

    /// A page worker panicked or was cancelled.
    #[error("page worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
