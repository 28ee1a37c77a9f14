//! Streaming encryption contexts over the Magma cipher.
//!
//! A [`ContextManager`] owns the shared key table and hands out
//! [`EncryptionContext`]s. Each context composes the cipher, a chaining mode,
//! a padding scheme and a checked-out key into an encrypt/decrypt API over
//! byte buffers of any length. Streaming calls take whole blocks; the `*_last`
//! calls handle the padded final block.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod context;
mod error;
mod manager;
mod settings;

pub use context::EncryptionContext;
pub use error::ContextError;
pub use manager::ContextManager;
pub use settings::{CipherKind, ContextSettings, ModeKind, PaddingKind};
