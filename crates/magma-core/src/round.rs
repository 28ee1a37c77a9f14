//! Feistel round function and round-key ordering.

use crate::sbox::substitute;

/// Number of Feistel rounds.
pub const ROUNDS: usize = 32;

/// Key word index used at each encryption round.
const ENCRYPT_ORDER: [usize; ROUNDS] = [
    7, 6, 5, 4, 3, 2, 1, 0, //
    7, 6, 5, 4, 3, 2, 1, 0, //
    7, 6, 5, 4, 3, 2, 1, 0, //
    0, 1, 2, 3, 4, 5, 6, 7,
];

/// Key word index used at each decryption round.
const DECRYPT_ORDER: [usize; ROUNDS] = [
    7, 6, 5, 4, 3, 2, 1, 0, //
    0, 1, 2, 3, 4, 5, 6, 7, //
    0, 1, 2, 3, 4, 5, 6, 7, //
    0, 1, 2, 3, 4, 5, 6, 7,
];

/// Selects which round-key ordering a pass uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySchedule {
    /// Forward order: words 7..0 three times, then 0..7.
    Encrypt,
    /// Mirror order: words 7..0, then 0..7 three times.
    Decrypt,
}

impl KeySchedule {
    /// Full sequence of key word indices for this schedule.
    pub fn order(self) -> &'static [usize; ROUNDS] {
        match self {
            Self::Encrypt => &ENCRYPT_ORDER,
            Self::Decrypt => &DECRYPT_ORDER,
        }
    }

    /// Key word index used at `round` (0..32).
    #[inline]
    pub fn word_index(self, round: usize) -> usize {
        self.order()[round]
    }
}

/// Round function `g[k](a) = (S(a + k)) <<< 11`.
#[inline]
pub fn g(a: u32, k: u32) -> u32 {
    substitute(a.wrapping_add(k)).rotate_left(11)
}
