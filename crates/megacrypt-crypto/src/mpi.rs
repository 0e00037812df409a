//! Length-prefixed big integers (MPI-style)
//!
//! Encoding: `[2 bytes: bit length, big-endian][ceil(bits / 8) bytes: magnitude, big-endian]`

use ::rsa::BigUint;

use crate::error::{CryptoError, CryptoResult};

/// Size of the bit-length header
pub const HEADER_SIZE: usize = 2;

/// Total encoded size (header + magnitude) announced by the header at the
/// front of `buf`.
pub fn encoded_len(buf: &[u8]) -> CryptoResult<usize> {
    let header = buf.get(..HEADER_SIZE).ok_or(CryptoError::TruncatedInput {
        needed: HEADER_SIZE,
        available: buf.len(),
    })?;
    let bits = u16::from_be_bytes([header[0], header[1]]) as usize;
    Ok(HEADER_SIZE + bits.div_ceil(8))
}

/// Decode one integer from the front of `buf`.
///
/// Returns the value and the byte length of its magnitude (excluding the
/// header). Bytes after the encoded integer are ignored.
pub fn decode_length_prefixed(buf: &[u8]) -> CryptoResult<(BigUint, usize)> {
    let total = encoded_len(buf)?;
    let magnitude = buf
        .get(HEADER_SIZE..total)
        .ok_or(CryptoError::TruncatedInput {
            needed: total,
            available: buf.len(),
        })?;
    Ok((BigUint::from_bytes_be(magnitude), magnitude.len()))
}

/// Encode `value` with its minimal big-endian magnitude.
///
/// Zero encodes as a bare `00 00` header.
pub fn encode_length_prefixed(value: &BigUint) -> CryptoResult<Vec<u8>> {
    let bits = value.bits();
    let header = u16::try_from(bits).map_err(|_| {
        CryptoError::InvalidKeyMaterial(format!("{bits}-bit integer exceeds the 16-bit length header"))
    })?;

    let mut out = Vec::with_capacity(HEADER_SIZE + bits.div_ceil(8));
    out.extend_from_slice(&header.to_be_bytes());
    if bits > 0 {
        out.extend_from_slice(&value.to_bytes_be());
    }
    Ok(out)
}
