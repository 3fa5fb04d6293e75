use std::path::Path;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    LocalUri,
    HttpUrl,
}

/// A playable source. Identity is the normalized URI string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub original: String,
    pub normalized: String,
    pub kind: SourceType,
    pub display_name: Option<String>,
}

impl SourceDescriptor {
    pub fn from_path(path: &Path) -> Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let display_name = absolute.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(Self {
            original: path.display().to_string(),
            normalized: format!("file://{}", absolute.display()),
            kind: SourceType::LocalUri,
            display_name,
        })
    }

    pub fn from_uri(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (scheme, _) = trimmed
            .split_once("://")
            .ok_or_else(|| anyhow!("not a URI: {}", trimmed))?;
        let kind = match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => SourceType::HttpUrl,
            "file" | "content" => SourceType::LocalUri,
            other => return Err(anyhow!("unsupported URI scheme: {}", other)),
        };
        let display_name = trimmed
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
        Ok(Self {
            original: raw.to_string(),
            normalized: trimmed.to_string(),
            kind,
            display_name,
        })
    }
}

/// Whether a player launch must reload its source instead of reattaching to the running session.
///
/// Recreation after a configuration change never resets; otherwise only a resume request for the
/// source that is already loaded keeps the session.
pub fn should_force_source_reset(
    has_saved_state: bool,
    resume_existing: bool,
    current_source_normalized: Option<&str>,
    requested_source_normalized: &str,
) -> bool {
    !has_saved_state && !(resume_existing && current_source_normalized == Some(requested_source_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "https://example.com/a.mp4";
    const B: &str = "https://example.com/b.mp4";

    #[test]
    fn test_forces_reset_when_not_resuming() {
        assert!(should_force_source_reset(false, false, Some(A), A));
    }

    #[test]
    fn test_keeps_session_when_resuming_same_source() {
        assert!(!should_force_source_reset(false, true, Some(A), A));
    }

    #[test]
    fn test_resets_when_resuming_different_source() {
        assert!(should_force_source_reset(false, true, Some(A), B));
        assert!(should_force_source_reset(false, true, None, B));
    }

    #[test]
    fn test_no_reset_during_recreation() {
        assert!(!should_force_source_reset(true, false, Some(A), B));
    }

    #[test]
    fn test_uri_kinds() {
        let http = SourceDescriptor::from_uri(" https://example.com/videos/clip.mp4 ").unwrap();
        assert_eq!(http.kind, SourceType::HttpUrl);
        assert_eq!(http.normalized, "https://example.com/videos/clip.mp4");
        assert_eq!(http.display_name.as_deref(), Some("clip.mp4"));

        let local = SourceDescriptor::from_uri("file:///sdcard/movie.mkv").unwrap();
        assert_eq!(local.kind, SourceType::LocalUri);

        assert!(SourceDescriptor::from_uri("ftp://host/file").is_err());
        assert!(SourceDescriptor::from_uri("plain text").is_err());
    }
}
