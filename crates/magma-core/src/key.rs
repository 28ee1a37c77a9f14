//! Key type for Magma.

use core::fmt;

use thiserror::Error;
use zeroize::Zeroize;

/// Error returned when key material has the wrong length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("key must be {} bytes, got {actual}", Key::LEN)]
pub struct KeyLengthError {
    /// Length that was supplied.
    pub actual: usize,
}

/// 256-bit Magma key, viewable as eight little-endian 32-bit words.
///
/// The storage is zeroed when the key is dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Key([u8; Key::LEN]);

impl Key {
    /// Key length in bytes.
    pub const LEN: usize = 32;
    /// Number of 32-bit words in a key.
    pub const WORDS: usize = 8;

    /// Creates a zeroed key.
    pub const fn new() -> Self {
        Self([0u8; Self::LEN])
    }

    /// Copies `bytes` into the key. `bytes` must be exactly [`Key::LEN`] long.
    pub fn fill_from(&mut self, bytes: &[u8]) -> Result<(), KeyLengthError> {
        if bytes.len() != Self::LEN {
            return Err(KeyLengthError {
                actual: bytes.len(),
            });
        }
        self.0.copy_from_slice(bytes);
        Ok(())
    }

    /// Returns word `i` (0..8).
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        let offset = i * 4;
        u32::from_le_bytes([
            self.0[offset],
            self.0[offset + 1],
            self.0[offset + 2],
            self.0[offset + 3],
        ])
    }

    /// Overwrites byte `i`.
    #[inline]
    pub fn set(&mut self, i: usize, value: u8) {
        self.0[i] = value;
    }

    /// Byte view of the key.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Zeroes the key material.
    pub fn clear(&mut self) {
        self.0.zeroize();
    }

    /// Returns true when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = KeyLengthError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let mut key = Self::new();
        key.fill_from(value)?;
        Ok(key)
    }
}

impl From<[u8; Key::LEN]> for Key {
    fn from(value: [u8; Key::LEN]) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.clear();
    }
}
