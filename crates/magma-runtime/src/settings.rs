//! Context configuration.

use magma_kit::KeySource;

/// Block cipher used by a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CipherKind {
    /// GOST R 34.12-2015 64-bit cipher.
    #[default]
    Magma,
}

/// Chaining mode used by a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeKind {
    /// Block chaining over a feedback register sized by the IV.
    #[default]
    Cbc,
}

/// Padding scheme used by a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaddingKind {
    /// `0x80` marker followed by zeros.
    #[default]
    Bit,
}

/// Everything needed to build an [`EncryptionContext`](crate::EncryptionContext).
#[derive(Clone, Debug)]
pub struct ContextSettings {
    /// Source of key material when a new key must be minted.
    pub key: KeySource,
    /// Source of the IV that seeds the feedback register.
    pub iv: KeySource,
    /// IV length in bytes; also the feedback register length.
    pub iv_len: usize,
    /// Cipher selection.
    pub cipher: CipherKind,
    /// Mode selection.
    pub mode: ModeKind,
    /// Padding selection.
    pub padding: PaddingKind,
}

impl ContextSettings {
    /// Settings with the default cipher, mode and padding.
    pub fn new(key: KeySource, iv: KeySource, iv_len: usize) -> Self {
        Self {
            key,
            iv,
            iv_len,
            cipher: CipherKind::default(),
            mode: ModeKind::default(),
            padding: PaddingKind::default(),
        }
    }
}
