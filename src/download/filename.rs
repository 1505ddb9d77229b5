//! Filename sanitization and collision-safe path resolution for exports.
//!
//! Exported files are named from the item title. When the preferred name is
//! already taken the exporter never overwrites it; it picks the first free
//! ` v2`, ` v3`, ... variant instead.

use std::io;
use std::path::{Component, Path, PathBuf};

use super::constants::{AUDIO_EXTENSION, MAX_NAME_BYTES, MAX_STEM_BYTES};

const PARTIAL_PREFIX: &str = ".";
const PARTIAL_SUFFIX: &str = ".part";

/// Sanitizes a display title for use as a filename stem.
///
/// Replaces `< > : " / \ | ? *` and control characters with `_`, strips
/// leading and trailing spaces and dots, and truncates to at most
/// `max_bytes` UTF-8 bytes without splitting a character.
#[must_use]
pub fn sanitize_filename(name: &str, max_bytes: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    truncate_at_char_boundary(replaced.trim_matches(|c| c == ' ' || c == '.'), max_bytes)
        .to_string()
}

/// Builds the output filename for a catalog item: sanitized title plus the
/// audio extension, falling back to the item id when the title sanitizes away.
#[must_use]
pub fn filename_for_item(title: &str, id: &str) -> String {
    let stem = sanitize_filename(title, MAX_STEM_BYTES);
    let stem = if is_safe_filename_segment(&stem) {
        stem
    } else {
        let fallback = sanitize_filename(id, MAX_STEM_BYTES);
        if is_safe_filename_segment(&fallback) {
            fallback
        } else {
            "untitled".to_string()
        }
    };
    format!("{stem}{AUDIO_EXTENSION}")
}

/// Resolves a path that does not collide with an existing file.
///
/// Returns `desired` when it does not exist; otherwise inserts ` v2`, ` v3`,
/// ... before the extension and returns the first unused candidate.
///
/// Example: `song.mp3`, then `song v2.mp3`, `song v3.mp3`, ...
///
/// # Errors
///
/// Returns the IO error when existence of a candidate cannot be checked.
pub async fn resolve_versioned_path(desired: &Path) -> io::Result<PathBuf> {
    if !tokio::fs::try_exists(desired).await? {
        return Ok(desired.to_path_buf());
    }

    let dir = desired.parent().unwrap_or_else(|| Path::new(""));
    let filename = desired
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&filename);

    let mut version = 2u32;
    loop {
        let candidate = dir.join(format!("{stem} v{version}{ext}"));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        version += 1;
    }
}

/// Hidden sibling path a transfer streams into before being renamed into place.
///
/// The name is `.<name>.part`, with `<name>` shortened on a character
/// boundary when the result would exceed [`MAX_NAME_BYTES`].
#[must_use]
pub fn partial_path_for(target: &Path) -> PathBuf {
    let dir = target.parent().unwrap_or_else(|| Path::new(""));
    let filename = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let budget = MAX_NAME_BYTES - PARTIAL_PREFIX.len() - PARTIAL_SUFFIX.len();
    let name = truncate_at_char_boundary(&filename, budget);
    dir.join(format!("{PARTIAL_PREFIX}{name}{PARTIAL_SUFFIX}"))
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !name.is_empty()
        && !Path::new(name).components().any(|component| {
            matches!(
                component,
                Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}
