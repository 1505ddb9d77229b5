//! Constants for the download module (timeouts, buffering, cover defaults).

use std::time::Duration;

/// Connect timeout shared by every client profile (10 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total per-request timeout for catalog API calls (15 seconds).
pub const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Total per-request timeout for audio and cover downloads (30 seconds).
pub const FILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Write buffer size used when streaming a payload to disk.
pub const WRITE_BUFFER_BYTES: usize = 8192;

/// MIME type declared for embedded cover art when the server does not say.
pub const DEFAULT_COVER_MIME: &str = "image/jpeg";

/// Extension given to every exported audio file.
pub const AUDIO_EXTENSION: &str = ".mp3";

/// Upper bound on a sanitized filename stem, in UTF-8 bytes.
///
/// Leaves room under [`MAX_NAME_BYTES`] for a ` vN` suffix, the audio
/// extension, and the `.` / `.part` affixes of the partial file.
pub const MAX_STEM_BYTES: usize = 200;

/// Longest single path component most filesystems accept, in bytes.
pub const MAX_NAME_BYTES: usize = 255;
