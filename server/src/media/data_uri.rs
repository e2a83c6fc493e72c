//! Decoding of `data:image/<ext>;base64,<payload>` strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Extension claimed by the client, e.g. `png`. Informational only.
    pub ext: String,
    pub bytes: Vec<u8>,
}

pub fn is_data_uri(value: &str) -> bool {
    value.starts_with("data:image")
}

pub fn decode(value: &str) -> Result<DataUri, String> {
    let rest = value
        .strip_prefix("data:image/")
        .ok_or_else(|| "Expected a data:image/<ext>;base64,<payload> URI".to_string())?;

    let (ext, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| "Image data must be base64 encoded".to_string())?;

    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
        return Err(format!("Invalid image type: {ext:?}"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Invalid base64 payload: {e}"))?;

    if bytes.is_empty() {
        return Err("Image payload is empty".to_string());
    }

    Ok(DataUri {
        ext: ext.to_ascii_lowercase(),
        bytes,
    })
}
