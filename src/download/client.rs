//! HTTP client wrapper for catalog requests and file transfers.
//!
//! This module provides the `HttpClient` struct which owns one reqwest client
//! per configured proxy endpoint, picks one at random per request, attaches
//! the bearer credential, and turns response statuses into [`DownloadError`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Proxy};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, WRITE_BUFFER_BYTES};
use super::error::DownloadError;
use super::filename::{partial_path_for, resolve_versioned_path};
use crate::credential::Credential;
use crate::user_agent;

/// HTTP client with an optional proxy pool.
///
/// Created once per timeout profile and cloned freely; clones share the
/// underlying connection pools.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use catalog_export::download::HttpClient;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let proxies = vec!["http://10.0.0.2:3128".to_string()];
/// let client = HttpClient::with_proxies(Duration::from_secs(30), &proxies)?;
/// assert_eq!(client.pool_size(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    clients: Arc<[Client]>,
}

/// A fully buffered response body with its declared content type.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Response bytes.
    pub bytes: Vec<u8>,
    /// Raw `Content-Type` header, when present and readable.
    pub content_type: Option<String>,
}

/// Result of one successful streamed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Path the payload was renamed onto.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

impl HttpClient {
    /// Creates a direct (proxy-less) client with the given total timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest cannot build the client.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        Self::with_proxies(timeout, &[])
    }

    /// Creates a client pool with one client per proxy endpoint.
    ///
    /// Each proxy is applied to both HTTP and HTTPS traffic. An empty list
    /// yields a single direct client.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`] for an unparseable endpoint and
    /// [`DownloadError::ClientBuild`] if reqwest cannot build a client.
    #[instrument(level = "debug", skip(proxies), fields(proxy_count = proxies.len()))]
    pub fn with_proxies(timeout: Duration, proxies: &[String]) -> Result<Self, DownloadError> {
        let clients = if proxies.is_empty() {
            vec![build_client(timeout, None)?]
        } else {
            proxies
                .iter()
                .map(|endpoint| {
                    let proxy = Proxy::all(endpoint).map_err(|source| {
                        DownloadError::InvalidProxy {
                            proxy: endpoint.clone(),
                            source,
                        }
                    })?;
                    build_client(timeout, Some(proxy))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients: clients.into(),
        })
    }

    /// Number of clients in the pool (one per proxy, or one direct client).
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.clients.len()
    }

    fn pick_client(&self) -> &Client {
        let index = if self.clients.len() > 1 {
            rand::thread_rng().gen_range(0..self.clients.len())
        } else {
            0
        };
        &self.clients[index]
    }

    /// Sends one GET request and validates the response status.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::Timeout`] / [`DownloadError::Network`] on transport failure
    /// - [`DownloadError::AuthRequired`] for 401 and 403
    /// - [`DownloadError::HttpStatus`] for any other non-success status
    #[instrument(level = "debug", skip(self, credential), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self.pick_client().get(parsed);
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential.bearer_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        debug!(status = status_code, "request rejected");
        if matches!(status_code, 401 | 403) {
            return Err(DownloadError::auth_required(url, status_code));
        }
        Err(DownloadError::http_status(url, status_code))
    }

    /// Fetches a whole response body into memory.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`get`](Self::get), plus
    /// [`DownloadError::Network`] if the body stream breaks.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<FetchedBody, DownloadError> {
        let response = self.get(url, credential).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        Ok(FetchedBody {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Streams one response body to `target` through a hidden partial file.
    ///
    /// The body is written to `.<name>.part` next to `target` and renamed onto
    /// `target` only after the stream completes. On any failure the partial
    /// file is removed, so no truncated payload is ever left behind. If
    /// `target` appeared while the transfer ran, the next free ` vN` variant
    /// is used instead of overwriting it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), [`DownloadError::Network`]
    /// for a broken body stream, and [`DownloadError::Io`] for local writes.
    #[instrument(skip(self, credential), fields(url = %url, target = %target.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        target: &Path,
        credential: Option<&Credential>,
    ) -> Result<TransferResult, DownloadError> {
        let response = self.get(url, credential).await?;

        let partial = partial_path_for(target);
        let result = stream_and_commit(response, url, &partial, target).await;

        if result.is_err() {
            debug!(path = %partial.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&partial).await;
        }

        let transfer = result?;
        info!(
            path = %transfer.path.display(),
            bytes = transfer.bytes,
            "transfer complete"
        );
        Ok(transfer)
    }
}

async fn stream_and_commit(
    response: reqwest::Response,
    url: &str,
    partial: &Path,
    target: &Path,
) -> Result<TransferResult, DownloadError> {
    let mut file = File::create(partial)
        .await
        .map_err(|e| DownloadError::io(partial, e))?;
    let bytes = stream_to_file(&mut file, response, url, partial).await?;
    drop(file);

    let final_path = resolve_versioned_path(target)
        .await
        .map_err(|e| DownloadError::io(target, e))?;

    tokio::fs::rename(partial, &final_path)
        .await
        .map_err(|e| DownloadError::io(final_path.clone(), e))?;

    Ok(TransferResult {
        path: final_path,
        bytes,
    })
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

fn build_client(timeout: Duration, proxy: Option<Proxy>) -> Result<Client, DownloadError> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent());
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|source| DownloadError::ClientBuild { source })
}
