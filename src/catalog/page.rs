//! Single-page fetching against the catalog API.

use async_trait::async_trait;
use tracing::{error, instrument};
use url::Url;

use super::item::{RawRecord, parse_page_body};
use crate::credential::Credential;
use crate::download::{DownloadError, HttpClient, RetryPolicy, retry_with_policy};

/// Result of fetching one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A non-empty page of records.
    Items(Vec<RawRecord>),
    /// The page had no records: the request went past the end of the catalog.
    EmptyEnd,
    /// The credential was rejected (401/403).
    AuthFailure,
}

impl FetchOutcome {
    /// Classifies a decoded record list.
    #[must_use]
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        if records.is_empty() {
            Self::EmptyEnd
        } else {
            Self::Items(records)
        }
    }
}

/// Anything that can serve numbered catalog pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches page `page` (1-based) using `credential`.
    ///
    /// A rejected credential is reported as [`FetchOutcome::AuthFailure`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`DownloadError`] once retries are exhausted.
    async fn fetch_page(
        &self,
        page: u32,
        credential: &Credential,
    ) -> Result<FetchOutcome, DownloadError>;
}

/// HTTP-backed page source.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: HttpClient,
    base_url: Url,
    retry_policy: RetryPolicy,
}

impl CatalogClient {
    /// Creates a page source for the list endpoint at `base_url`.
    ///
    /// Existing query parameters on `base_url` are kept; `page=<n>` is
    /// appended per request.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] when `base_url` does not parse.
    pub fn new(
        http: HttpClient,
        base_url: &str,
        retry_policy: RetryPolicy,
    ) -> Result<Self, DownloadError> {
        let base_url = Url::parse(base_url).map_err(|_| DownloadError::invalid_url(base_url))?;
        Ok(Self {
            http,
            base_url,
            retry_policy,
        })
    }

    /// URL of page `page`.
    #[must_use]
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }
}

#[async_trait]
impl PageSource for CatalogClient {
    #[instrument(skip(self, credential))]
    async fn fetch_page(
        &self,
        page: u32,
        credential: &Credential,
    ) -> Result<FetchOutcome, DownloadError> {
        let url = self.page_url(page).to_string();
        let label = format!("page {page} fetch");
        let http = &self.http;

        let result = retry_with_policy(&self.retry_policy, &label, |_| {
            let url = url.as_str();
            async move {
                let response = http.get(url, Some(credential)).await?;
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| DownloadError::network(url, e))?;
                parse_page_body(&body).map_err(|e| DownloadError::decode(url, e))
            }
        })
        .await;

        match result {
            Ok(records) => Ok(FetchOutcome::from_records(records)),
            Err(DownloadError::AuthRequired { status, .. }) => {
                error!(
                    page,
                    status, "authorization failed; the token is likely expired or incorrect"
                );
                Ok(FetchOutcome::AuthFailure)
            }
            Err(e) => {
                error!(
                    page,
                    attempts = self.retry_policy.max_attempts(),
                    error = %e,
                    "failed to fetch page"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog(base: &str, policy: RetryPolicy) -> CatalogClient {
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        CatalogClient::new(http, base, policy).unwrap()
    }

    fn credential() -> Credential {
        Credential::new("tok").unwrap()
    }

    #[test]
    fn test_page_url_keeps_existing_query() {
        let client = catalog(
            "https://api.example.com/feed/v2?hide_disliked=true",
            RetryPolicy::default(),
        );
        assert_eq!(
            client.page_url(3).as_str(),
            "https://api.example.com/feed/v2?hide_disliked=true&page=3"
        );
    }

    #[test]
    fn test_page_url_without_query() {
        let client = catalog("https://api.example.com/feed", RetryPolicy::default());
        assert_eq!(
            client.page_url(1).as_str(),
            "https://api.example.com/feed?page=1"
        );
    }

    #[test]
    fn test_new_rejects_invalid_base() {
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            CatalogClient::new(http, "::nope::", RetryPolicy::default()),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_items_and_empty_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"clips":[{"id":"a","title":"A","audio_url":"https://x/a.mp3"}]}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = catalog(&format!("{}/feed", server.uri()), RetryPolicy::default());
        let first = client.fetch_page(1, &credential()).await.unwrap();
        assert!(matches!(first, FetchOutcome::Items(ref records) if records.len() == 1));
        let second = client.fetch_page(2, &credential()).await.unwrap();
        assert_eq!(second, FetchOutcome::EmptyEnd);
    }

    #[tokio::test]
    async fn test_fetch_page_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(path("/feed"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = catalog(
            &format!("{}/feed", server.uri()),
            RetryPolicy::new(5, Duration::ZERO),
        );
        let outcome = client.fetch_page(1, &credential()).await.unwrap();
        assert_eq!(outcome, FetchOutcome::AuthFailure);
    }

    #[tokio::test]
    async fn test_fetch_page_exhausts_retries_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(path("/feed"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = catalog(
            &format!("{}/feed", server.uri()),
            RetryPolicy::new(3, Duration::ZERO),
        );
        let result = client.fetch_page(1, &credential()).await;
        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_retries_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let client = catalog(
            &format!("{}/feed", server.uri()),
            RetryPolicy::new(2, Duration::ZERO),
        );
        let result = client.fetch_page(1, &credential()).await;
        assert!(matches!(result, Err(DownloadError::Decode { .. })));
    }
}
