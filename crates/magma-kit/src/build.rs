//! Key and IV material sources.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use magma_core::{Key, KeyLengthError};
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors produced while building key or IV material.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Hex input could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Material had the wrong number of bytes.
    #[error("{source_kind} material must be {expected} bytes, got {actual}")]
    WrongLength {
        /// Which source produced the material.
        source_kind: &'static str,
        /// Requested length.
        expected: usize,
        /// Produced length.
        actual: usize,
    },

    /// Reading a key file failed.
    #[error("read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The random source failed to fill the buffer.
    #[error("random source failed: {0}")]
    Random(#[from] rand::Error),

    /// Requested more bytes than the derivation function can produce.
    #[error("requested {requested} derived bytes, at most {max} supported")]
    DerivationTooLong {
        /// Requested length.
        requested: usize,
        /// Maximum output length of the function.
        max: usize,
    },

    /// The derivation function reported an error.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// A textual source specification was not recognised.
    #[error("unknown key source `{0}` (expected be:HEX, le:HEX, file:PATH or random)")]
    UnknownSource(String),
}

impl From<KeyLengthError> for BuildError {
    fn from(err: KeyLengthError) -> Self {
        Self::WrongLength {
            source_kind: "key",
            expected: Key::LEN,
            actual: err.actual,
        }
    }
}

/// Key-derivation function used by [`KeySource::Derived`].
pub trait Kdf: Send + Sync {
    /// Derives bytes from `key`, `label` and `seed`.
    fn derive(&self, key: &[u8], label: &[u8], seed: &[u8]) -> Result<Vec<u8>, BuildError>;

    /// Maximum number of bytes a single derivation produces.
    fn max_len(&self) -> usize;
}

/// Inputs for a derived fill.
#[derive(Clone)]
pub struct KdfParams {
    /// Derivation function.
    pub kdf: Arc<dyn Kdf>,
    /// Input keying material.
    pub key: Vec<u8>,
    /// Context label.
    pub label: Vec<u8>,
    /// Per-derivation seed.
    pub seed: Vec<u8>,
}

impl fmt::Debug for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdfParams")
            .field("label", &hex::encode(&self.label))
            .field("seed", &hex::encode(&self.seed))
            .finish_non_exhaustive()
    }
}

/// Where key or IV bytes come from.
///
/// Every variant carries exactly the payload it needs.
#[derive(Clone, Debug)]
pub enum KeySource {
    /// Hex string in big-endian order; bytes are reversed into little-endian.
    HexBigEndian(String),
    /// Hex string already in little-endian order.
    HexLittleEndian(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Contents of a file.
    File(PathBuf),
    /// Fill from the random source passed to [`KeySource::build`].
    Random,
    /// Fill from a key-derivation function.
    Derived(KdfParams),
}

impl KeySource {
    fn kind(&self) -> &'static str {
        match self {
            Self::HexBigEndian(_) => "big-endian hex",
            Self::HexLittleEndian(_) => "little-endian hex",
            Self::Bytes(_) => "byte",
            Self::File(_) => "file",
            Self::Random => "random",
            Self::Derived(_) => "derived",
        }
    }

    /// Produces exactly `len` bytes of material.
    ///
    /// `rng` is only consulted by [`KeySource::Random`].
    pub fn build<R>(&self, len: usize, rng: &mut R) -> Result<Vec<u8>, BuildError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut bytes = match self {
            Self::HexBigEndian(s) => hex_big_endian(s)?,
            Self::HexLittleEndian(s) => hex_little_endian(s)?,
            Self::Bytes(b) => b.clone(),
            Self::File(path) => fs::read(path).map_err(|source| BuildError::Io {
                path: path.clone(),
                source,
            })?,
            Self::Random => {
                let mut buf = vec![0u8; len];
                rng.try_fill_bytes(&mut buf)?;
                buf
            }
            Self::Derived(params) => {
                let max = params.kdf.max_len();
                if len > max {
                    return Err(BuildError::DerivationTooLong {
                        requested: len,
                        max,
                    });
                }
                params
                    .kdf
                    .derive(&params.key, &params.label, &params.seed)?
            }
        };
        if bytes.len() != len {
            let actual = bytes.len();
            bytes.zeroize();
            return Err(BuildError::WrongLength {
                source_kind: self.kind(),
                expected: len,
                actual,
            });
        }
        Ok(bytes)
    }

    /// Fills `key` with freshly built material.
    pub fn build_key<R>(&self, key: &mut Key, rng: &mut R) -> Result<(), BuildError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut bytes = self.build(Key::LEN, rng)?;
        let filled = key.fill_from(&bytes);
        bytes.zeroize();
        filled.map_err(BuildError::from)
    }
}

impl FromStr for KeySource {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "random" {
            return Ok(Self::Random);
        }
        match s.split_once(':') {
            Some(("be", value)) => Ok(Self::HexBigEndian(value.to_owned())),
            Some(("le", value)) => Ok(Self::HexLittleEndian(value.to_owned())),
            Some(("file", value)) => Ok(Self::File(PathBuf::from(value))),
            _ => Err(BuildError::UnknownSource(s.to_owned())),
        }
    }
}

/// Decodes big-endian hex into little-endian bytes.
pub fn hex_big_endian(s: &str) -> Result<Vec<u8>, BuildError> {
    let mut bytes = hex::decode(s.trim())?;
    bytes.reverse();
    Ok(bytes)
}

/// Decodes hex that is already little-endian.
pub fn hex_little_endian(s: &str) -> Result<Vec<u8>, BuildError> {
    Ok(hex::decode(s.trim())?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::rngs::OsRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    struct FixedKdf(Vec<u8>);

    impl Kdf for FixedKdf {
        fn derive(&self, _key: &[u8], _label: &[u8], _seed: &[u8]) -> Result<Vec<u8>, BuildError> {
            Ok(self.0.clone())
        }

        fn max_len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn big_endian_hex_is_reversed() {
        let bytes = KeySource::HexBigEndian("0201".into())
            .build(2, &mut OsRng)
            .expect("build");
        assert_eq!(bytes, vec![1, 2]);
    }

    #[test]
    fn little_endian_hex_is_kept() {
        let bytes = KeySource::HexLittleEndian("0201".into())
            .build(2, &mut OsRng)
            .expect("build");
        assert_eq!(bytes, vec![2, 1]);
    }

    #[test]
    fn raw_bytes_are_kept() {
        let bytes = KeySource::Bytes(vec![2, 1])
            .build(2, &mut OsRng)
            .expect("build");
        assert_eq!(bytes, vec![2, 1]);
    }

    #[test]
    fn file_contents_are_read() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&[2, 1]).expect("write");
        let bytes = KeySource::File(file.path().to_path_buf())
            .build(2, &mut OsRng)
            .expect("build");
        assert_eq!(bytes, vec![2, 1]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = KeySource::File(dir.path().join("absent.key"))
            .build(2, &mut OsRng)
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn random_fill_uses_injected_rng() {
        let a = KeySource::Random
            .build(32, &mut ChaCha20Rng::from_seed([7u8; 32]))
            .expect("build");
        let b = KeySource::Random
            .build(32, &mut ChaCha20Rng::from_seed([7u8; 32]))
            .expect("build");
        assert_eq!(a, b);
        assert!(a.iter().any(|&x| x != 0));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = KeySource::HexLittleEndian("0201".into())
            .build(3, &mut OsRng)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::WrongLength {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let err = KeySource::HexBigEndian("zz".into())
            .build(1, &mut OsRng)
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidHex(_)));
    }

    #[test]
    fn derived_fill_respects_max_len() {
        let params = KdfParams {
            kdf: Arc::new(FixedKdf(vec![9u8; 32])),
            key: vec![1; 32],
            label: b"label".to_vec(),
            seed: b"seed".to_vec(),
        };
        let source = KeySource::Derived(params);
        assert_eq!(source.build(32, &mut OsRng).expect("build"), vec![9u8; 32]);
        assert!(matches!(
            source.build(64, &mut OsRng).unwrap_err(),
            BuildError::DerivationTooLong {
                requested: 64,
                max: 32
            }
        ));
    }

    #[test]
    fn build_key_fills_words() {
        let mut key = Key::new();
        KeySource::HexBigEndian(
            "ffeeddccbbaa99887766554433221100f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff".into(),
        )
        .build_key(&mut key, &mut OsRng)
        .expect("build");
        assert_eq!(key.word(7), 0xffee_ddcc);
        assert_eq!(key.word(0), 0xfcfd_feff);
    }

    #[test]
    fn parses_textual_sources() {
        assert!(matches!("random".parse::<KeySource>(), Ok(KeySource::Random)));
        assert!(matches!(
            "be:0102".parse::<KeySource>(),
            Ok(KeySource::HexBigEndian(s)) if s == "0102"
        ));
        assert!(matches!(
            "le:0102".parse::<KeySource>(),
            Ok(KeySource::HexLittleEndian(s)) if s == "0102"
        ));
        assert!(matches!(
            "file:/tmp/k.bin".parse::<KeySource>(),
            Ok(KeySource::File(p)) if p == PathBuf::from("/tmp/k.bin")
        ));
        assert!(matches!(
            "bogus".parse::<KeySource>(),
            Err(BuildError::UnknownSource(_))
        ));
    }
}
