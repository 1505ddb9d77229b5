//! End-to-end run: extract the catalog, then export every item.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::{CatalogClient, ExtractError, extract_catalog};
use crate::config::ExportConfig;
use crate::credential::{Credential, CredentialProvider};
use crate::download::{DownloadError, EngineError, ExportEngine, ExportStats, HttpClient};

/// Why a run produced no export.
#[derive(Debug, Error)]
pub enum RunError {
    /// An HTTP client could not be configured (bad proxy, bad endpoint).
    #[error("cannot set up HTTP client: {0}")]
    Client(#[source] DownloadError),

    /// Extraction yielded no items.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The output directory could not be prepared.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// Pages discovered.
    pub total_pages: u32,
    /// Unique items extracted.
    pub items: usize,
    /// Per-item results.
    pub stats: ExportStats,
}

/// Extracts the catalog behind `config.api_url` and downloads every item
/// into `config.output_dir`.
///
/// Per-item failures are counted in [`RunReport::stats`] and never fail
/// the run.
///
/// # Errors
///
/// Returns [`RunError`] when clients cannot be built, when extraction yields
/// no items, or when the output directory cannot be created.
#[instrument(skip_all, fields(api_url = %config.api_url, output_dir = %config.output_dir.display()))]
pub async fn run(
    config: &ExportConfig,
    credential: Credential,
    provider: &dyn CredentialProvider,
) -> Result<RunReport, RunError> {
    let api_client =
        HttpClient::with_proxies(config.api_timeout, &config.proxies).map_err(RunError::Client)?;
    let file_client =
        HttpClient::with_proxies(config.file_timeout, &config.proxies).map_err(RunError::Client)?;
    if !config.proxies.is_empty() {
        info!(proxies = api_client.pool_size(), "using proxy pool");
    }

    let source = CatalogClient::new(api_client, &config.api_url, config.retry_policy.clone())
        .map_err(RunError::Client)?;
    let extraction = extract_catalog(
        Arc::new(source),
        credential,
        provider,
        &config.extract_options(),
    )
    .await?;
    info!(
        items = extraction.items.len(),
        pages = extraction.total_pages,
        "extracted catalog"
    );

    let engine = ExportEngine::new(
        file_client,
        config.retry_policy.clone(),
        config.with_thumbnail,
    );
    let stats = engine
        .export(&extraction.items, &extraction.credential, &config.output_dir)
        .await?;

    Ok(RunReport {
        total_pages: extraction.total_pages,
        items: extraction.items.len(),
        stats,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credential::NoReplacement;

    #[tokio::test]
    async fn test_invalid_proxy_fails_before_any_request() {
        let config = ExportConfig {
            proxies: vec!["http://[::1".to_string()],
            ..ExportConfig::default()
        };
        let result = run(&config, Credential::new("tok").unwrap(), &NoReplacement).await;
        assert!(matches!(result, Err(RunError::Client(_))));
    }

    #[tokio::test]
    async fn test_invalid_api_url_is_a_client_error() {
        let config = ExportConfig {
            api_url: "not a url".to_string(),
            ..ExportConfig::default()
        };
        let result = run(&config, Credential::new("tok").unwrap(), &NoReplacement).await;
        assert!(matches!(
            result,
            Err(RunError::Client(DownloadError::InvalidUrl { .. }))
        ));
    }

    #[test]
    fn test_extract_error_display_passes_through() {
        let error = RunError::from(ExtractError::NoPages);
        assert_eq!(error.to_string(), "no pages found");
    }
}
