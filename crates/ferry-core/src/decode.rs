//! Block decoder. Base64 transport text into a caller-owned buffer.
//!
//! The exact decoded length is computed from the text before anything is
//! written, so an oversized block is rejected with the buffer untouched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::StreamError;

/// Exact number of bytes `encoded` decodes to (padded standard alphabet).
pub fn decoded_len(encoded: &str) -> Result<usize, StreamError> {
    let bytes = encoded.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(StreamError::InvalidEncoding(format!(
            "length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let padding = bytes.iter().rev().take(2).take_while(|&&b| b == b'=').count();
    Ok(bytes.len() / 4 * 3 - padding)
}

/// Decode `encoded` into `buffer[offset..]`, writing at most `max_bytes`.
///
/// Returns the number of bytes written. Fails with `DecodeOverflow` when the
/// block is larger than `max_bytes` or than the space left after `offset`.
pub fn decode_block(
    encoded: &str,
    buffer: &mut [u8],
    offset: usize,
    max_bytes: usize,
) -> Result<usize, StreamError> {
    let actual = decoded_len(encoded)?;
    let space = buffer.len().saturating_sub(offset);
    let max = space.min(max_bytes);
    if offset > buffer.len() || actual > max {
        return Err(StreamError::DecodeOverflow { max, actual });
    }

    // Only `actual` bytes are written, but the engine may ask for room for
    // the padding as well.
    let room = encoded.len() / 4 * 3;
    if space >= room {
        return STANDARD
            .decode_slice(encoded, &mut buffer[offset..offset + room])
            .map_err(|e| StreamError::InvalidEncoding(e.to_string()));
    }
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| StreamError::InvalidEncoding(e.to_string()))?;
    buffer[offset..offset + decoded.len()].copy_from_slice(&decoded);
    Ok(decoded.len())
}
