// Opens the byte stream behind a media source descriptor

use crate::http::HttpRangeSource;
use reel_core::{Error, MediaSource, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::io::MediaSource as ByteSource;
use symphonia::core::probe::Hint;

pub fn is_remote(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Filesystem path for a local URI
pub fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

/// File extension of a URI path, ignoring query and fragment
pub fn extension(uri: &str) -> Option<&str> {
    let path = uri.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    Path::new(name).extension().and_then(|e| e.to_str())
}

pub fn hint_for(uri: &str) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = extension(uri) {
        hint.with_extension(ext);
    }
    hint
}

/// Open the leaf of `source` for demuxing. Adaptive sources are rejected;
/// this engine only plays progressive media.
pub fn open(source: &MediaSource) -> Result<(Box<dyn ByteSource>, Hint)> {
    match source.base() {
        MediaSource::Progressive { uri, data_source } => {
            let hint = hint_for(uri);
            if is_remote(uri) {
                let http = HttpRangeSource::open(uri, data_source)?;
                Ok((Box::new(http), hint))
            } else {
                let path = local_path(uri);
                let file = File::open(path)
                    .map_err(|e| Error::Io(format!("cannot open {}: {}", path, e)))?;
                log::info!("Opened local media {}", path);
                Ok((Box::new(file), hint))
            }
        }
        MediaSource::Dash { uri, .. } => Err(Error::UnsupportedSource(format!(
            "DASH manifests are not supported by this engine: {}",
            uri
        ))),
        // base() never returns a wrapper
        other => Err(Error::InvalidSource(format!("not a leaf source: {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::DataSourceFactory;

    #[test]
    fn test_remote_detection() {
        assert!(is_remote("https://example.com/a.mp3"));
        assert!(is_remote("HTTP://example.com/a.mp3"));
        assert!(!is_remote("file:///sdcard/a.mp3"));
        assert!(!is_remote("media/sample.mp4"));
    }

    #[test]
    fn test_extension_ignores_query() {
        assert_eq!(extension("https://example.com/clip.mp4?token=abc"), Some("mp4"));
        assert_eq!(extension("https://example.com/v1.2/stream#t=10"), None);
        assert_eq!(extension("file:///sdcard/song.flac"), Some("flac"));
        assert_eq!(local_path("file:///sdcard/song.flac"), "/sdcard/song.flac");
    }

    #[test]
    fn test_dash_is_unsupported() {
        let ua = DataSourceFactory::new("ua");
        let dash = MediaSource::dash("https://example.com/manifest.mpd", ua.clone(), ua);
        match open(&dash) {
            Err(Error::UnsupportedSource(msg)) => assert!(msg.contains("manifest.mpd")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("dash should not open"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = MediaSource::progressive(
            "file:///nonexistent/reel/missing.mp3",
            DataSourceFactory::new("ua"),
        );
        let clipped = MediaSource::clipped(source, 0, 1_000_000).unwrap();
        assert!(matches!(open(&clipped), Err(Error::Io(_))));
    }
}
