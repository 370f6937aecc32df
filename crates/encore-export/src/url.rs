//! `data:` URLs for handing in-memory clips to players.

use crate::error::{ExportError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// A parsed `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Build a base64 `data:` URL for `bytes`.
pub fn data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Parse a `data:` URL. Accepts base64 payloads and plain percent-free text.
pub fn parse_data_url(url: &str) -> Result<DataUrl> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ExportError::InvalidUrl("missing data: scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ExportError::InvalidUrl("missing ',' separator".into()))?;

    let mut params = header.split(';');
    let mime_type = match params.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let data = if is_base64 {
        STANDARD.decode(payload.trim())?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(DataUrl { mime_type, data })
}
