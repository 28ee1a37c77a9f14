//! Block chaining over a ring-shaped feedback register.

use magma_core::{xor_in_place, Block, BlockCipher, Key};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors raised when constructing a chaining mode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    /// The seed cannot hold a single block.
    #[error("feedback register must be at least {block_len} bytes, got {actual}")]
    RegisterTooShort {
        /// Cipher block length.
        block_len: usize,
        /// Supplied seed length.
        actual: usize,
    },
}

/// Stateful stream mode processing one block per call.
pub trait BlockMode {
    /// Encrypts `block` in place and advances the mode state.
    fn encrypt_in_place(&mut self, cipher: &dyn BlockCipher, key: &Key, block: &mut Block);

    /// Decrypts `block` in place and advances the mode state.
    fn decrypt_in_place(&mut self, cipher: &dyn BlockCipher, key: &Key, block: &mut Block);

    /// Encrypts `src` into `dst`.
    fn encrypt(&mut self, cipher: &dyn BlockCipher, key: &Key, src: &Block, dst: &mut Block) {
        *dst = *src;
        self.encrypt_in_place(cipher, key, dst);
    }

    /// Decrypts `src` into `dst`.
    fn decrypt(&mut self, cipher: &dyn BlockCipher, key: &Key, src: &Block, dst: &mut Block) {
        *dst = *src;
        self.decrypt_in_place(cipher, key, dst);
    }
}

/// Cipher block chaining with a feedback register of `R >= B` bytes.
///
/// The register is a ring. Each call reads and then overwrites the `B`-byte
/// window at `cursor` (wrapping) and moves the cursor back by `B`. With
/// `R = n * B` the window returns to the same place every `n` calls, so the
/// register carries `n` interleaved chains. `R = B` is plain CBC.
pub struct CbcMode {
    register: Vec<u8>,
    cursor: usize,
    feedback: Block,
}

impl CbcMode {
    /// Creates the mode from seed material (the IV), which must be at least one block.
    pub fn new(seed: &[u8]) -> Result<Self, ModeError> {
        if seed.len() < Block::LEN {
            return Err(ModeError::RegisterTooShort {
                block_len: Block::LEN,
                actual: seed.len(),
            });
        }
        Ok(Self {
            register: seed.to_vec(),
            cursor: seed.len() - Block::LEN,
            feedback: Block::new(),
        })
    }

    /// Register length in bytes.
    pub fn register_len(&self) -> usize {
        self.register.len()
    }

    /// Number of full blocks the register holds.
    pub fn lanes(&self) -> usize {
        self.register.len() / Block::LEN
    }

    fn load_feedback(&mut self) {
        let len = self.register.len();
        for (i, byte) in self.feedback.as_bytes_mut().iter_mut().enumerate() {
            *byte = self.register[(self.cursor + i) % len];
        }
    }

    fn store_and_advance(&mut self, block: &[u8; Block::LEN]) {
        let len = self.register.len();
        for (i, &byte) in block.iter().enumerate() {
            self.register[(self.cursor + i) % len] = byte;
        }
        self.cursor = (self.cursor + len - Block::LEN) % len;
    }
}

impl BlockMode for CbcMode {
    fn encrypt_in_place(&mut self, cipher: &dyn BlockCipher, key: &Key, block: &mut Block) {
        self.load_feedback();
        xor_in_place(block.as_bytes_mut(), self.feedback.as_bytes());
        cipher.encrypt_in_place(key, block);
        self.store_and_advance(block.as_bytes());
    }

    fn decrypt_in_place(&mut self, cipher: &dyn BlockCipher, key: &Key, block: &mut Block) {
        let consumed = *block.as_bytes();
        self.load_feedback();
        cipher.decrypt_in_place(key, block);
        xor_in_place(block.as_bytes_mut(), self.feedback.as_bytes());
        self.store_and_advance(&consumed);
    }
}

impl Drop for CbcMode {
    fn drop(&mut self) {
        self.register.zeroize();
        self.feedback.clear();
    }
}
