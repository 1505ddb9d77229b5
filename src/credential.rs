//! Bearer credential handling and replacement-credential providers.
//!
//! A [`Credential`] is cheap to clone and is handed by value to every worker,
//! so a replacement never races with requests already in flight. Replacement
//! credentials come from a [`CredentialProvider`]: the binary prompts on
//! stdin, tests script the answers.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Bearer token authorizing catalog and download requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Creates a credential from a raw token, trimming surrounding whitespace.
    ///
    /// Returns `None` when the token is blank.
    #[must_use]
    pub fn new(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        (!trimmed.is_empty()).then(|| Self(Arc::from(trimmed)))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for this credential.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of a replacement credential after the current one is rejected.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Asks for a replacement credential. `None` means the operator declined.
    async fn replacement(&self) -> Option<Credential>;
}

/// Prompts the operator on stderr and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl CredentialProvider for StdinPrompt {
    async fn replacement(&self) -> Option<Credential> {
        let read = tokio::task::spawn_blocking(|| {
            let mut stderr = io::stderr();
            let _ = write!(stderr, "Please enter a new token: ");
            let _ = stderr.flush();

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match read {
            Ok(Ok(line)) => Credential::new(&line),
            Ok(Err(error)) => {
                warn!(error = %error, "could not read replacement token");
                None
            }
            Err(error) => {
                debug!(error = %error, "credential prompt task failed");
                None
            }
        }
    }
}

/// Never supplies a replacement; used for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReplacement;

#[async_trait]
impl CredentialProvider for NoReplacement {
    async fn replacement(&self) -> Option<Credential> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_trims_token() {
        let credential = Credential::new("  abc.def \n").unwrap();
        assert_eq!(credential.expose(), "abc.def");
        assert_eq!(credential.bearer_header(), "Bearer abc.def");
    }

    #[test]
    fn test_credential_blank_is_none() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new(" \t\n").is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret").unwrap();
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_no_replacement_declines() {
        assert!(NoReplacement.replacement().await.is_none());
    }
}
