//! Cover-art and text-field embedding into exported audio files.
//!
//! The cover is downloaded under its own retry budget, then written into the
//! file's ID3v2 container together with optional title and artist fields.
//! Any previously embedded pictures are removed first, so embedding the same
//! file twice never accumulates duplicate covers.

use std::path::{Path, PathBuf};

use id3::frame::{Picture, PictureType};
use id3::{ErrorKind, Tag, TagLike, Version};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::credential::Credential;
use crate::download::constants::DEFAULT_COVER_MIME;
use crate::download::{DownloadError, HttpClient, RetryPolicy, retry_with_policy};

/// Description stored on the embedded cover frame.
const COVER_DESCRIPTION: &str = "Cover";

/// Errors raised while embedding metadata into one file.
#[derive(Debug, Error)]
pub enum TagError {
    /// The cover image could not be downloaded.
    #[error("failed to fetch cover art: {0}")]
    Fetch(#[from] DownloadError),

    /// The existing tag container could not be read.
    #[error("failed to read tags from {path}: {source}")]
    Read {
        /// File whose tags were read.
        path: PathBuf,
        /// Underlying tag error.
        #[source]
        source: id3::Error,
    },

    /// The updated tag container could not be written.
    #[error("failed to write tags to {path}: {source}")]
    Write {
        /// File whose tags were written.
        path: PathBuf,
        /// Underlying tag error.
        #[source]
        source: id3::Error,
    },

    /// The blocking tag writer task panicked or was cancelled.
    #[error("tag writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Downloaded cover image plus its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type recorded in the picture frame.
    pub mime_type: String,
}

/// Text fields written alongside the cover. `None` or empty leaves the field as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    /// Track title (TIT2).
    pub title: Option<String>,
    /// Lead artist / attribution (TPE1).
    pub artist: Option<String>,
}

/// Downloads the cover image at `url`.
///
/// # Errors
///
/// Returns the final [`DownloadError`] once the retry budget is spent. A
/// rejected credential fails immediately.
pub async fn fetch_cover(
    client: &HttpClient,
    url: &str,
    credential: Option<&Credential>,
    policy: &RetryPolicy,
) -> Result<CoverArt, DownloadError> {
    let body = retry_with_policy(policy, "cover download", |_| {
        client.fetch_bytes(url, credential)
    })
    .await?;

    Ok(CoverArt {
        mime_type: cover_mime(body.content_type.as_deref()),
        data: body.bytes,
    })
}

/// Fetches the cover at `cover_url` and embeds it with `tags` into `path`.
///
/// # Errors
///
/// Returns [`TagError::Fetch`] if the cover cannot be downloaded, or a
/// read/write error if the tag container cannot be updated.
#[instrument(skip(client, tags, credential, policy), fields(path = %path.display()))]
pub async fn embed_metadata(
    client: &HttpClient,
    path: &Path,
    cover_url: &str,
    tags: TrackTags,
    credential: Option<&Credential>,
    policy: &RetryPolicy,
) -> Result<(), TagError> {
    let cover = fetch_cover(client, cover_url, credential, policy).await?;
    debug!(mime = %cover.mime_type, bytes = cover.data.len(), "cover fetched");

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_tags(&path, &tags, &cover)).await?
}

/// Writes `tags` and `cover` into the ID3v2 container of `path`.
///
/// Creates the container when the file has none, replaces every existing
/// picture with `cover` as the front cover, and saves as ID3v2.3.
///
/// # Errors
///
/// Returns [`TagError::Read`] for a corrupt existing tag and
/// [`TagError::Write`] when saving fails.
pub fn write_tags(path: &Path, tags: &TrackTags, cover: &CoverArt) -> Result<(), TagError> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(error) if matches!(error.kind, ErrorKind::NoTag) => Tag::new(),
        Err(source) => {
            return Err(TagError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if let Some(title) = tags.title.as_deref().filter(|t| !t.is_empty()) {
        tag.set_title(title);
    }
    if let Some(artist) = tags.artist.as_deref().filter(|a| !a.is_empty()) {
        tag.set_artist(artist);
    }

    tag.remove_all_pictures();
    tag.add_frame(Picture {
        mime_type: cover.mime_type.clone(),
        picture_type: PictureType::CoverFront,
        description: COVER_DESCRIPTION.to_string(),
        data: cover.data.clone(),
    });

    tag.write_to_path(path, Version::Id3v23)
        .map_err(|source| TagError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// MIME type from a `Content-Type` header, parameters stripped.
pub(crate) fn cover_mime(content_type: Option<&str>) -> String {
    content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_COVER_MIME)
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUDIO: &[u8] = b"\xff\xfb\x90\x64 not really audio but good enough";

    fn cover(bytes: &[u8]) -> CoverArt {
        CoverArt {
            data: bytes.to_vec(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_cover_mime_strips_parameters() {
        assert_eq!(cover_mime(Some("image/webp; q=0.9")), "image/webp");
    }

    #[test]
    fn test_cover_mime_defaults_to_jpeg() {
        assert_eq!(cover_mime(None), "image/jpeg");
        assert_eq!(cover_mime(Some("  ;x=y")), "image/jpeg");
    }

    #[test]
    fn test_write_tags_creates_container_when_absent() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("track.mp3");
        std::fs::write(&file, AUDIO).unwrap();

        let tags = TrackTags {
            title: Some("Night Drive".to_string()),
            artist: Some("nova".to_string()),
        };
        write_tags(&file, &tags, &cover(b"png-bytes")).unwrap();

        let tag = Tag::read_from_path(&file).unwrap();
        assert_eq!(tag.version(), Version::Id3v23);
        assert_eq!(tag.title(), Some("Night Drive"));
        assert_eq!(tag.artist(), Some("nova"));
        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].picture_type, PictureType::CoverFront);
        assert_eq!(pictures[0].mime_type, "image/png");
        assert_eq!(pictures[0].data, b"png-bytes");

        let written = std::fs::read(&file).unwrap();
        assert!(written.ends_with(AUDIO), "audio payload must survive tagging");
    }

    #[test]
    fn test_write_tags_twice_keeps_single_picture() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("track.mp3");
        std::fs::write(&file, AUDIO).unwrap();

        write_tags(&file, &TrackTags::default(), &cover(b"first")).unwrap();
        write_tags(&file, &TrackTags::default(), &cover(b"second")).unwrap();

        let tag = Tag::read_from_path(&file).unwrap();
        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].data, b"second");
    }

    #[test]
    fn test_write_tags_keeps_existing_title_when_none_given() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("track.mp3");
        std::fs::write(&file, AUDIO).unwrap();

        let first = TrackTags {
            title: Some("Original".to_string()),
            artist: None,
        };
        write_tags(&file, &first, &cover(b"a")).unwrap();
        write_tags(&file, &TrackTags::default(), &cover(b"b")).unwrap();

        let tag = Tag::read_from_path(&file).unwrap();
        assert_eq!(tag.title(), Some("Original"));
    }

    #[tokio::test]
    async fn test_embed_metadata_rejected_cover_leaves_file_untouched() {
        let server = MockServer::start().await;
        Mock::given(path("/cover.jpg"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("track.mp3");
        std::fs::write(&file, AUDIO).unwrap();

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = embed_metadata(
            &client,
            &file,
            &format!("{}/cover.jpg", server.uri()),
            TrackTags::default(),
            None,
            &policy,
        )
        .await;

        assert!(matches!(result, Err(TagError::Fetch(_))));
        assert_eq!(std::fs::read(&file).unwrap(), AUDIO);
    }
}
