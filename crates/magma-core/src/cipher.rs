//! Magma block encryption/decryption.

use crate::block::Block;
use crate::key::Key;
use crate::round::{g, KeySchedule};

/// Stateless 64-bit block transform under a 256-bit key.
///
/// Implementations must be pure: the same key and input always produce the
/// same output and no state is retained between calls.
pub trait BlockCipher {
    /// Encrypts `block` in place.
    fn encrypt_in_place(&self, key: &Key, block: &mut Block);

    /// Decrypts `block` in place.
    fn decrypt_in_place(&self, key: &Key, block: &mut Block);

    /// Encrypts `src` into `dst`.
    fn encrypt(&self, key: &Key, src: &Block, dst: &mut Block) {
        *dst = *src;
        self.encrypt_in_place(key, dst);
    }

    /// Decrypts `src` into `dst`.
    fn decrypt(&self, key: &Key, src: &Block, dst: &mut Block) {
        *dst = *src;
        self.decrypt_in_place(key, dst);
    }

    /// Creates a zeroed block of the cipher's size.
    fn new_block(&self) -> Block {
        Block::new()
    }

    /// Creates a zeroed key of the cipher's size.
    fn new_key(&self) -> Key {
        Key::new()
    }

    /// Block length in bytes.
    fn block_len(&self) -> usize {
        Block::LEN
    }

    /// Key length in bytes.
    fn key_len(&self) -> usize {
        Key::LEN
    }
}

/// GOST R 34.12-2015 64-bit cipher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Magma;

impl Magma {
    /// Creates the cipher.
    pub const fn new() -> Self {
        Self
    }
}

impl BlockCipher for Magma {
    fn encrypt_in_place(&self, key: &Key, block: &mut Block) {
        crypt(key, KeySchedule::Encrypt, block);
    }

    fn decrypt_in_place(&self, key: &Key, block: &mut Block) {
        crypt(key, KeySchedule::Decrypt, block);
    }
}

fn crypt(key: &Key, schedule: KeySchedule, block: &mut Block) {
    let mut left = block.word(1);
    let mut right = block.word(0);
    for &idx in schedule.order() {
        let next = g(right, key.word(idx)) ^ left;
        left = right;
        right = next;
    }
    // The last swap is undone by writing the halves back crosswise.
    block.set_word(0, left);
    block.set_word(1, right);
}

/// Encrypts a single block, returning the ciphertext.
pub fn encrypt_block(block: &Block, key: &Key) -> Block {
    let mut out = *block;
    crypt(key, KeySchedule::Encrypt, &mut out);
    out
}

/// Decrypts a single block, returning the plaintext.
pub fn decrypt_block(block: &Block, key: &Key) -> Block {
    let mut out = *block;
    crypt(key, KeySchedule::Decrypt, &mut out);
    out
}
