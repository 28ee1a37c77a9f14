//! Reference GOST R 34.12-2015 64-bit block cipher ("Magma").
//!
//! This crate provides:
//! - Block and key representations with byte and 32-bit word views.
//! - The fixed substitution table and the Feistel round function.
//! - Single-block encryption and decryption behind the [`BlockCipher`] trait.
//!
//! All data is kept in little-endian byte order: word `i` of a block or key is
//! the four bytes starting at `4 * i`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod block;
mod cipher;
mod key;
mod round;
mod sbox;

pub use crate::block::{xor_in_place, Block};
pub use crate::cipher::{decrypt_block, encrypt_block, BlockCipher, Magma};
pub use crate::key::{Key, KeyLengthError};
pub use crate::round::KeySchedule;
