//! Final-block padding: a `0x80` marker followed by zeros.

use thiserror::Error;
use tracing::debug;

/// Marker byte that starts the padding trailer.
const MARKER: u8 = 0x80;

/// Errors raised while stripping padding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    /// The buffer is empty or holds only zero bytes.
    #[error("padding marker not found")]
    MissingMarker,

    /// The last non-zero byte is not the marker.
    #[error("invalid padding byte {value:#04x} at offset {position}")]
    InvalidMarker {
        /// Offset of the offending byte.
        position: usize,
        /// Its value.
        value: u8,
    },
}

/// Reversible scheme that extends the last block to a full block.
pub trait Padding {
    /// Bytes to append after a final chunk of `remaining` bytes (`remaining < block_len`).
    fn pad_for(&self, remaining: usize, block_len: usize) -> Vec<u8>;

    /// Length of the data in `data` once the trailer is stripped.
    fn unpadded_len(&self, data: &[u8]) -> Result<usize, PaddingError>;
}

/// ISO/IEC 7816-4 style padding.
///
/// Block-aligned input still gets a whole block of padding, so the trailer is
/// always present and decoding is unambiguous.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitPadding;

impl Padding for BitPadding {
    fn pad_for(&self, remaining: usize, block_len: usize) -> Vec<u8> {
        debug_assert!(remaining < block_len);
        let zeros = if remaining == 0 {
            block_len - 1
        } else {
            block_len.saturating_sub(remaining + 1)
        };
        let mut out = Vec::with_capacity(zeros + 1);
        out.push(MARKER);
        out.resize(zeros + 1, 0);
        out
    }

    fn unpadded_len(&self, data: &[u8]) -> Result<usize, PaddingError> {
        let position = data
            .iter()
            .rposition(|&b| b != 0)
            .ok_or(PaddingError::MissingMarker)?;
        match data[position] {
            MARKER => Ok(position),
            value => {
                debug!(position, value, "rejecting malformed padding");
                Err(PaddingError::InvalidMarker { position, value })
            }
        }
    }
}
