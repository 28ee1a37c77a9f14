//! Block representation helpers.

/// Magma block of 8 bytes, viewable as two little-endian 32-bit words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block([u8; Block::LEN]);

impl Block {
    /// Block length in bytes.
    pub const LEN: usize = 8;
    /// Number of 32-bit words in a block.
    pub const WORDS: usize = 2;

    /// Creates a zeroed block.
    pub const fn new() -> Self {
        Self([0u8; Self::LEN])
    }

    /// Builds a block from its two words (word 0 first).
    pub fn from_words(w0: u32, w1: u32) -> Self {
        let mut block = Self::new();
        block.set_word(0, w0);
        block.set_word(1, w1);
        block
    }

    /// Returns word `i` (0 or 1).
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        let offset = i * 4;
        u32::from_le_bytes([
            self.0[offset],
            self.0[offset + 1],
            self.0[offset + 2],
            self.0[offset + 3],
        ])
    }

    /// Overwrites word `i` (0 or 1).
    #[inline]
    pub fn set_word(&mut self, i: usize, value: u32) {
        let offset = i * 4;
        self.0[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Returns byte `i`.
    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        self.0[i]
    }

    /// Overwrites byte `i`.
    #[inline]
    pub fn set(&mut self, i: usize, value: u8) {
        self.0[i] = value;
    }

    /// Byte view of the block.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Mutable byte view of the block.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8; Self::LEN] {
        &mut self.0
    }

    /// Zeroes the block.
    pub fn clear(&mut self) {
        self.0 = [0u8; Self::LEN];
    }
}

impl From<[u8; Block::LEN]> for Block {
    fn from(value: [u8; Block::LEN]) -> Self {
        Self(value)
    }
}

/// XORs `rhs` into `dst`.
#[inline]
pub fn xor_in_place(dst: &mut [u8], rhs: &[u8]) {
    for (d, r) in dst.iter_mut().zip(rhs.iter()) {
        *d ^= *r;
    }
}
