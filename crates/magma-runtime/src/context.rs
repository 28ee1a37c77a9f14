//! Streaming encrypt/decrypt over a cipher, a chaining mode and a padding scheme.

use std::fmt;

use magma_core::{Block, BlockCipher, Key};
use magma_kit::{BlockMode, KeyId, KeyLease, Padding};
use tracing::warn;

use crate::error::ContextError;

/// One encryption session.
///
/// A context owns its chaining state and scratch block, so it must not be
/// shared between callers. Obtain one from
/// [`ContextManager::new_context`](crate::ContextManager::new_context). Its key
/// goes back to the manager when the context is dropped or passed to
/// [`ContextManager::free_context`](crate::ContextManager::free_context).
pub struct EncryptionContext {
    cipher: Box<dyn BlockCipher + Send>,
    mode: Box<dyn BlockMode + Send>,
    padding: Box<dyn Padding + Send>,
    block: Block,
    key: KeyLease,
    iv: Vec<u8>,
}

impl EncryptionContext {
    pub(crate) fn new(
        cipher: Box<dyn BlockCipher + Send>,
        mode: Box<dyn BlockMode + Send>,
        padding: Box<dyn Padding + Send>,
        key: KeyLease,
        iv: Vec<u8>,
    ) -> Self {
        let block = cipher.new_block();
        Self {
            cipher,
            mode,
            padding,
            block,
            key,
            iv,
        }
    }

    /// Alignment required by [`encrypt`](Self::encrypt) and [`decrypt`](Self::decrypt).
    pub fn data_alignment(&self) -> usize {
        self.cipher.block_len()
    }

    /// IV the chaining register was seeded with.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Key in use.
    pub fn key(&self) -> &Key {
        self.key.key()
    }

    /// Identifier of the key in use.
    pub fn key_id(&self) -> KeyId {
        self.key.id()
    }

    /// Encrypts the whole blocks of `src` into `dst`.
    ///
    /// Trailing bytes that do not fill a block are copied unchanged. Returns
    /// the number of bytes encrypted.
    pub fn encrypt(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, ContextError> {
        check_lengths(src, dst)?;
        dst.copy_from_slice(src);
        Ok(self.encrypt_in_place(dst))
    }

    /// Encrypts the whole blocks of `buf` in place, returning the bytes processed.
    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) -> usize {
        let block_len = self.data_alignment();
        let mut processed = 0;
        for chunk in buf.chunks_exact_mut(block_len) {
            self.block.as_bytes_mut().copy_from_slice(chunk);
            self.mode
                .encrypt_in_place(&*self.cipher, self.key.key(), &mut self.block);
            chunk.copy_from_slice(self.block.as_bytes());
            processed += block_len;
        }
        self.block.clear();
        processed
    }

    /// Decrypts the whole blocks of `src` into `dst`.
    pub fn decrypt(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, ContextError> {
        check_lengths(src, dst)?;
        dst.copy_from_slice(src);
        Ok(self.decrypt_in_place(dst))
    }

    /// Decrypts the whole blocks of `buf` in place, returning the bytes processed.
    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) -> usize {
        let block_len = self.data_alignment();
        let mut processed = 0;
        for chunk in buf.chunks_exact_mut(block_len) {
            self.block.as_bytes_mut().copy_from_slice(chunk);
            self.mode
                .decrypt_in_place(&*self.cipher, self.key.key(), &mut self.block);
            chunk.copy_from_slice(self.block.as_bytes());
            processed += block_len;
        }
        self.block.clear();
        processed
    }

    /// Encrypts `src` as the end of the stream, writing the padded ciphertext to `dst`.
    ///
    /// `dst` is overwritten. Returns the ciphertext length, which is always a
    /// positive multiple of the block length.
    pub fn encrypt_last(&mut self, src: &[u8], dst: &mut Vec<u8>) -> usize {
        dst.clear();
        dst.extend_from_slice(src);
        self.encrypt_last_in_place(dst)
    }

    /// In-place form of [`encrypt_last`](Self::encrypt_last).
    pub fn encrypt_last_in_place(&mut self, buf: &mut Vec<u8>) -> usize {
        let block_len = self.data_alignment();
        let done = self.encrypt_in_place(buf);
        let trailer = self.padding.pad_for(buf.len() - done, block_len);
        buf.extend_from_slice(&trailer);
        self.encrypt_in_place(&mut buf[done..]);
        buf.len()
    }

    /// Decrypts `src` as the end of the stream, writing the unpadded plaintext to `dst`.
    ///
    /// `dst` is overwritten. Returns the plaintext length.
    pub fn decrypt_last(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize, ContextError> {
        dst.clear();
        dst.extend_from_slice(src);
        self.decrypt_last_in_place(dst)
    }

    /// In-place form of [`decrypt_last`](Self::decrypt_last).
    ///
    /// On a padding error the buffer holds the decrypted but untruncated data.
    pub fn decrypt_last_in_place(&mut self, buf: &mut Vec<u8>) -> Result<usize, ContextError> {
        let block_len = self.data_alignment();
        if buf.is_empty() || buf.len() % block_len != 0 {
            return Err(ContextError::Unaligned {
                len: buf.len(),
                block_len,
            });
        }

        self.decrypt_in_place(buf);
        let last = buf.len() - block_len;
        let kept = match self.padding.unpadded_len(&buf[last..]) {
            Ok(kept) => kept,
            Err(err) => {
                warn!(key = %self.key.id(), error = %err, "final block has malformed padding");
                return Err(err.into());
            }
        };
        buf.truncate(last + kept);
        Ok(buf.len())
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("key", &self.key.id())
            .field("iv_len", &self.iv.len())
            .field("block_len", &self.data_alignment())
            .finish_non_exhaustive()
    }
}

fn check_lengths(src: &[u8], dst: &[u8]) -> Result<(), ContextError> {
    if src.len() != dst.len() {
        return Err(ContextError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    Ok(())
}
