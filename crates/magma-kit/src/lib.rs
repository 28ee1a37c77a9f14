//! Stream-level building blocks around the Magma block cipher.
//!
//! This crate composes the stateless cipher from `magma-core` into the pieces
//! a streaming session needs:
//! - [`CbcMode`], a block-chaining mode over a ring-shaped feedback register
//!   that may span several blocks (one independent chain per lane).
//! - [`BitPadding`], the `0x80 00..` trailer that extends the final block.
//! - [`KeySource`], the tagged description of where key and IV bytes come from.
//! - [`KeyManager`], which lets concurrent sessions share a key for a bounded
//!   time and zeroes it once the last holder releases it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod build;
mod keys;
mod mode;
mod padding;

pub use build::{hex_big_endian, hex_little_endian, BuildError, Kdf, KdfParams, KeySource};
pub use keys::{KeyError, KeyId, KeyLease, KeyManager, ManagedKey, ReleaseError};
pub use mode::{BlockMode, CbcMode, ModeError};
pub use padding::{BitPadding, Padding, PaddingError};
