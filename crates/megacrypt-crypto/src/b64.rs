//! URL-safe base64 as used for keys and handles in node metadata
//!
//! Encoding uses `-` and `_`, never pads. Decoding tolerates missing or
//! present padding and strips `,` separators that appear in some key lists.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::{CryptoError, CryptoResult};

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded URL-safe base64.
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(data)
}

/// Decode URL-safe base64, with or without padding.
pub fn decode(data: &str) -> CryptoResult<Vec<u8>> {
    let cleaned: String = data.chars().filter(|&c| c != ',').collect();
    URL_SAFE_LENIENT
        .decode(cleaned.trim())
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("invalid base64: {e}")))
}

/// Decode into a fixed-size array, failing on any other length.
pub fn decode_array<const N: usize>(data: &str) -> CryptoResult<[u8; N]> {
    let bytes = decode(data)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        CryptoError::InvalidKeyMaterial(format!(
            "expected {N} bytes after base64 decoding, got {}",
            bytes.len()
        ))
    })
}
