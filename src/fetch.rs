//! Where backing tracks come from.
//!
//! `play()` accepts a [`TrackSource`]. Raw bytes are decoded directly;
//! URLs are resolved by the engine's [`TrackFetcher`] on the decode worker.

use crate::{Error, Result};
use std::path::Path;

/// A track handed to `play()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// An encoded audio file already in memory.
    Bytes(Vec<u8>),
    /// `data:`, `file://`, `http(s)://` or a bare filesystem path.
    /// `http(s)://` needs the `http` feature (on by default).
    Url(String),
}

impl From<Vec<u8>> for TrackSource {
    fn from(bytes: Vec<u8>) -> Self {
        TrackSource::Bytes(bytes)
    }
}

impl From<String> for TrackSource {
    fn from(url: String) -> Self {
        TrackSource::Url(url)
    }
}

impl From<&str> for TrackSource {
    fn from(url: &str) -> Self {
        TrackSource::Url(url.to_string())
    }
}

/// Bytes of a fetched track plus a format hint for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTrack {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `"mp3"`.
    pub extension: Option<String>,
}

/// Resolves track URLs to bytes. Called from a worker thread, so blocking is fine.
pub trait TrackFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedTrack>;
}

/// Default body size limit for remote tracks.
pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Handles `data:` URLs, local files and, with the `http` feature, `http(s)://`.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    max_bytes: u64,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse tracks larger than `max_bytes`.
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn read_file(&self, path: &Path) -> Result<FetchedTrack> {
        let len = std::fs::metadata(path)?.len();
        if len > self.max_bytes {
            return Err(Error::Fetch(format!(
                "{} is {} bytes (limit {})",
                path.display(),
                len,
                self.max_bytes
            )));
        }
        Ok(FetchedTrack {
            bytes: std::fs::read(path)?,
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
        })
    }

    #[cfg(feature = "http")]
    fn fetch_http(&self, url: &str) -> Result<FetchedTrack> {
        use std::io::Read;

        tracing::debug!(url, "Fetching track");
        let response = ureq::get(url)
            .call()
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let extension = extension_for_mime(response.content_type())
            .map(str::to_string)
            .or_else(|| extension_of_url(url));

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::Fetch(format!(
                "{} exceeds {} bytes",
                url, self.max_bytes
            )));
        }
        Ok(FetchedTrack { bytes, extension })
    }

    #[cfg(not(feature = "http"))]
    fn fetch_http(&self, url: &str) -> Result<FetchedTrack> {
        Err(Error::Fetch(format!(
            "{}: http support not enabled (feature \"http\")",
            url
        )))
    }
}

impl TrackFetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedTrack> {
        if url.starts_with("data:") {
            let parsed = encore_export::parse_data_url(url)?;
            return Ok(FetchedTrack {
                extension: extension_for_mime(&parsed.mime_type).map(str::to_string),
                bytes: parsed.data,
            });
        }
        if let Some(path) = url.strip_prefix("file://") {
            return self.read_file(Path::new(path));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url);
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(Error::Fetch(format!("unsupported scheme '{}'", scheme)));
        }
        self.read_file(Path::new(url))
    }
}

/// Decoder hint for a mime type, ignoring parameters.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" | "audio/vorbis" | "application/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn extension_of_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}
