//! Reading bearer tokens of the form `header.payload.signature`.

use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

// Token segments are url-safe base64; some issuers keep the padding.
const SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("no token")]
    Missing,
    #[error("malformed token: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenPayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Splits a token into its three segments.
pub fn segments(token: &str) -> Result<(&str, &str, &str), DecodeError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) if !payload.is_empty() => {
            Ok((header, payload, signature))
        }
        _ => Err(DecodeError::Malformed("expected three segments".to_string())),
    }
}

pub fn decode_segment(segment: &str) -> Result<Vec<u8>, DecodeError> {
    SEGMENT
        .decode(segment)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

pub fn encode_segment(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Reads the payload segment. The signature is not checked.
pub fn decode_payload(token: &str) -> Result<TokenPayload, DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::Missing);
    }
    let (_, payload, _) = segments(token)?;
    let bytes = decode_segment(payload)?;
    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Malformed(e.to_string()))
}
