//! Issues and frees encryption contexts.

use std::sync::Arc;
use std::time::Duration;

use magma_core::{BlockCipher, Magma};
use magma_kit::{BitPadding, BlockMode, CbcMode, KeyManager, Padding};
use rand::{CryptoRng, RngCore};
use tracing::{error, info};

use crate::context::EncryptionContext;
use crate::error::ContextError;
use crate::settings::{CipherKind, ContextSettings, ModeKind, PaddingKind};

/// Hands out [`EncryptionContext`]s that draw keys from a shared [`KeyManager`].
///
/// Cloning is cheap; clones share the key table.
#[derive(Clone, Debug)]
pub struct ContextManager {
    keys: Arc<KeyManager>,
}

impl ContextManager {
    /// Creates a manager whose keys may be reused for `key_time_life`.
    pub fn new(key_time_life: Duration) -> Self {
        Self::with_key_manager(Arc::new(KeyManager::new(key_time_life)))
    }

    /// Creates a manager over an existing key table.
    pub fn with_key_manager(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// The shared key table.
    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Checks out a key and builds a context from `settings`.
    ///
    /// `rng` backs any [`KeySource::Random`](magma_kit::KeySource::Random) in
    /// the settings.
    pub fn new_context<R>(
        &self,
        settings: &ContextSettings,
        rng: &mut R,
    ) -> Result<EncryptionContext, ContextError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let cipher: Box<dyn BlockCipher + Send> = match settings.cipher {
            CipherKind::Magma => Box::new(Magma::new()),
        };

        let key = self
            .keys
            .checkout(&*cipher, &settings.key, rng)
            .map_err(|err| {
                error!(error = %err, "key checkout failed");
                err
            })?;

        match build_parts(settings, rng) {
            Ok((mode, padding, iv)) => {
                info!(key = %key.id(), iv_len = iv.len(), "crypto context created");
                Ok(EncryptionContext::new(cipher, mode, padding, key, iv))
            }
            Err(err) => {
                // Dropping the lease hands the key back.
                error!(key = %key.id(), error = %err, "crypto context setup failed");
                Err(err)
            }
        }
    }

    /// Ends the context and releases its key.
    ///
    /// Dropping the context has the same effect; this form logs the release.
    pub fn free_context(&self, ctx: EncryptionContext) {
        let id = ctx.key_id();
        drop(ctx);
        info!(key = %id, tracked = self.keys.keys_count(), "crypto context freed");
    }
}

type Parts = (Box<dyn BlockMode + Send>, Box<dyn Padding + Send>, Vec<u8>);

fn build_parts<R>(settings: &ContextSettings, rng: &mut R) -> Result<Parts, ContextError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let iv = settings.iv.build(settings.iv_len, rng)?;
    let mode: Box<dyn BlockMode + Send> = match settings.mode {
        ModeKind::Cbc => Box::new(CbcMode::new(&iv)?),
    };
    let padding: Box<dyn Padding + Send> = match settings.padding {
        PaddingKind::Bit => Box::new(BitPadding),
    };
    Ok((mode, padding, iv))
}
