//! Error types for encryption contexts.

use magma_kit::{BuildError, KeyError, ModeError, PaddingError};
use thiserror::Error;

/// Errors from creating or driving an [`EncryptionContext`](crate::EncryptionContext).
#[derive(Debug, Error)]
pub enum ContextError {
    /// Source and target buffers differ in length.
    #[error("source and target must have equal size: {src} != {dst}")]
    LengthMismatch {
        /// Source length.
        src: usize,
        /// Target length.
        dst: usize,
    },

    /// Ciphertext handed to `decrypt_last` is empty or not block-aligned.
    #[error("ciphertext length {len} is not a positive multiple of {block_len}")]
    Unaligned {
        /// Buffer length.
        len: usize,
        /// Required alignment.
        block_len: usize,
    },

    /// IV material could not be built.
    #[error("iv: {0}")]
    Iv(#[from] BuildError),

    /// The chaining mode rejected its seed.
    #[error("mode: {0}")]
    Mode(#[from] ModeError),

    /// The final block carried a malformed trailer.
    #[error("padding: {0}")]
    Padding(#[from] PaddingError),

    /// Key checkout failed.
    #[error("key: {0}")]
    Key(#[from] KeyError),
}

impl ContextError {
    /// Returns true for errors caused by bad settings rather than by data.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Iv(_) | Self::Mode(_) => true,
            Self::Key(KeyError::Build(_)) => true,
            Self::Key(KeyError::UnknownKey(_)) => false,
            Self::LengthMismatch { .. } | Self::Unaligned { .. } | Self::Padding(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_error_is_configuration() {
        let err = ContextError::from(ModeError::RegisterTooShort {
            block_len: 8,
            actual: 4,
        });
        assert!(err.is_configuration());
    }

    #[test]
    fn padding_error_is_not_configuration() {
        let err = ContextError::from(PaddingError::MissingMarker);
        assert!(!err.is_configuration());
    }

    #[test]
    fn error_display() {
        let err = ContextError::LengthMismatch { src: 16, dst: 8 };
        assert_eq!(err.to_string(), "source and target must have equal size: 16 != 8");
    }
}
