use std::path::Path;

use super::decode::{decode_bytes, AudioBuffer};
use crate::error::LoadError;

/// Fetches and decodes a track. Runs on a worker thread, so implementations
/// must be shareable across threads.
pub trait Loader: Send + Sync {
    fn load(&self, url: &str) -> Result<AudioBuffer, LoadError>;
}

/// Default loader: `http(s)://` through a blocking reqwest client, anything
/// else (including `file://`) from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpLoader;

impl HttpLoader {
    pub fn new() -> Self {
        Self
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let fetch_err = |reason: String| LoadError::Fetch {
            url: url.to_string(),
            reason,
        };

        if is_remote(url) {
            log::info!("Fetching {}", url);
            let response = reqwest::blocking::get(url)
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_err(e.to_string()))?;
            let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            std::fs::read(path).map_err(|e| fetch_err(e.to_string()))
        }
    }
}

impl Loader for HttpLoader {
    fn load(&self, url: &str) -> Result<AudioBuffer, LoadError> {
        let bytes = self.fetch(url)?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);

        decode_bytes(bytes, extension_hint(url).as_deref()).map_err(|e| LoadError::Decode {
            url: url.to_string(),
            reason: format!("{:#}", e),
        })
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// File extension of the last path segment, ignoring any query or fragment.
fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_hint_ignores_query() {
        assert_eq!(
            extension_hint("https://example.com/track.MP3?token=abc").as_deref(),
            Some("mp3")
        );
        assert_eq!(extension_hint("/music/song.flac").as_deref(), Some("flac"));
        assert_eq!(extension_hint("https://example.com/stream"), None);
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("http://host/a.ogg"));
        assert!(is_remote("https://host/a.ogg"));
        assert!(!is_remote("file:///tmp/a.ogg"));
        assert!(!is_remote("a.ogg"));
    }

    #[test]
    fn missing_file_is_fetch_error() {
        let err = HttpLoader::new()
            .load("/nonexistent/threeband/track.wav")
            .unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }

    #[test]
    fn undecodable_file_is_decode_error() {
        let path = std::env::temp_dir().join(format!("threeband-garbage-{}.wav", std::process::id()));
        std::fs::write(&path, b"not a riff header at all").unwrap();

        let err = HttpLoader::new().load(path.to_str().unwrap()).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, LoadError::Decode { .. }));
    }
}
