//! Key lifecycle management shared across sessions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use magma_core::{BlockCipher, Key};
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::build::{BuildError, KeySource};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an issued key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(u64);

impl KeyId {
    fn mint() -> Self {
        Self(NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors from the key manager.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key is not tracked by this manager.
    #[error("key {0} is not tracked")]
    UnknownKey(KeyId),

    /// Building fresh key material failed.
    #[error("key build failed: {0}")]
    Build(#[from] BuildError),
}

/// Returned by [`KeyManager::release`] when the key belongs to another manager.
///
/// The handle is not consumed; recover it with [`into_key`](Self::into_key)
/// and release it where it was issued.
#[derive(Debug, Error)]
#[error("key {id} is not tracked")]
pub struct ReleaseError {
    id: KeyId,
    key: ManagedKey,
}

impl ReleaseError {
    /// Identifier of the rejected key.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Hands the rejected handle back to the caller.
    pub fn into_key(self) -> ManagedKey {
        self.key
    }
}

/// A key checked out from a [`KeyManager`].
///
/// Each `ManagedKey` accounts for one reference; hand it back with
/// [`KeyManager::release`].
pub struct ManagedKey {
    id: KeyId,
    key: Arc<Key>,
}

impl ManagedKey {
    /// Identifier assigned when the key was minted.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// The key material.
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl fmt::Debug for ManagedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedKey").field("id", &self.id).finish()
    }
}

/// A checked-out key that releases itself when dropped.
///
/// Obtained from [`KeyManager::checkout`]. The lease keeps its manager alive,
/// so it cannot outlive the table it must be returned to.
pub struct KeyLease {
    manager: Arc<KeyManager>,
    id: KeyId,
    key: Arc<Key>,
}

impl KeyLease {
    /// Identifier assigned when the key was minted.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// The key material.
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut table = self.manager.table();
        unref(&mut table, self.id);
    }
}

impl fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLease").field("id", &self.id).finish()
    }
}

struct KeyInfo {
    key: Arc<Key>,
    count: usize,
    created_at: Instant,
}

/// Tracks outstanding keys so sessions can reuse a recent key for a bounded time.
///
/// A zero time-life disables reuse: every request mints a new key.
pub struct KeyManager {
    time_life: Duration,
    keys: Mutex<BTreeMap<KeyId, KeyInfo>>,
}

impl KeyManager {
    /// Creates a manager that reuses a key for at most `time_life`.
    pub fn new(time_life: Duration) -> Self {
        Self {
            time_life,
            keys: Mutex::new(BTreeMap::new()),
        }
    }

    /// Configured reuse window.
    pub fn time_life(&self) -> Duration {
        self.time_life
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<KeyId, KeyInfo>> {
        // Table updates cannot panic halfway, so a poisoned table is still consistent.
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, info: &KeyInfo) -> bool {
        !self.time_life.is_zero() && info.created_at.elapsed() < self.time_life
    }

    /// Returns the most recent key if it is still fresh, otherwise builds a new one.
    pub fn next_key<R>(
        &self,
        cipher: &dyn BlockCipher,
        source: &KeySource,
        rng: &mut R,
    ) -> Result<ManagedKey, KeyError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut table = self.table();

        if let Some(mut entry) = table.last_entry() {
            if self.is_fresh(entry.get()) {
                let id = *entry.key();
                let info = entry.get_mut();
                info.count += 1;
                debug!(key = %id, refs = info.count, "reusing key");
                return Ok(ManagedKey {
                    id,
                    key: Arc::clone(&info.key),
                });
            }
        }

        let mut key = cipher.new_key();
        source.build_key(&mut key, rng)?;
        let id = KeyId::mint();
        let key = Arc::new(key);
        table.insert(
            id,
            KeyInfo {
                key: Arc::clone(&key),
                count: 1,
                created_at: Instant::now(),
            },
        );
        info!(key = %id, tracked = table.len(), "new key created");
        Ok(ManagedKey { id, key })
    }

    /// Like [`next_key`](Self::next_key), but the key is released when the
    /// returned lease is dropped.
    pub fn checkout<R>(
        self: &Arc<Self>,
        cipher: &dyn BlockCipher,
        source: &KeySource,
        rng: &mut R,
    ) -> Result<KeyLease, KeyError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let ManagedKey { id, key } = self.next_key(cipher, source, rng)?;
        Ok(KeyLease {
            manager: Arc::clone(self),
            id,
            key,
        })
    }

    /// Drops one reference to `key`; the last release zeroes and forgets it.
    ///
    /// A key this manager does not track is handed back inside the error.
    pub fn release(&self, key: ManagedKey) -> Result<(), ReleaseError> {
        let mut table = self.table();
        if !table.contains_key(&key.id) {
            return Err(ReleaseError { id: key.id, key });
        }

        let ManagedKey { id, key } = key;
        drop(key);
        unref(&mut table, id);
        Ok(())
    }

    /// Reports whether a tracked key is still within its reuse window.
    pub fn is_available(&self, key: &ManagedKey) -> Result<bool, KeyError> {
        let table = self.table();
        let info = table.get(&key.id).ok_or(KeyError::UnknownKey(key.id))?;
        Ok(self.is_fresh(info))
    }

    /// Number of keys currently tracked.
    pub fn keys_count(&self) -> usize {
        self.table().len()
    }
}

fn unref(table: &mut BTreeMap<KeyId, KeyInfo>, id: KeyId) {
    let Some(info) = table.get_mut(&id) else {
        warn!(key = %id, "released key is not tracked");
        return;
    };
    info.count -= 1;
    if info.count > 0 {
        debug!(key = %id, refs = info.count, "key released");
        return;
    }

    // A lease still holds its own Arc here; `Key`'s drop zeroes that copy.
    if let Some(info) = table.remove(&id) {
        if let Some(mut key) = Arc::into_inner(info.key) {
            key.clear();
        }
    }
    info!(key = %id, tracked = table.len(), "key deleted");
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("time_life", &self.time_life)
            .field("tracked", &self.keys_count())
            .finish()
    }
}
