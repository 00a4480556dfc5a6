//! Row derivation: a key is hashed (keyed blake3 in XOF mode) into a band position and a band
//! pattern.
//!
//! The XOF stream is consumed in this order:
//!
//! 1. 16 bytes, read as a big-endian `u128`, reduced modulo $`r`$ and rounded down to a
//!    multiple of 8. This is `pos`.
//! 2. the band: `w / 8` bytes of bits for [BinaryRow], or `w` field elements (16 bytes each) for
//!    [SymbolRow].
//!
//! Bits inside a band are MSB-first: bit `j` of the band is bit `7 - j % 8` of byte `j / 8`, and it
//! stands for table column `pos + j`.

use crate::error::OkvsError;
use bitvec::prelude::*;
use rand::{CryptoRng, Rng};
use scuttlebutt::field::{F128b, FiniteField};

/// Band of a binary row. Index `j` is table column `pos + j`.
pub type Band = BitVec<u8, Msb0>;

/// Key of the row hash. Both parties must use the same seed to derive identical rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HashSeed(pub [u8; 32]);

impl HashSeed {
    /// Fresh seed, e.g. for retrying a failed encode.
    pub fn random<RNG: CryptoRng + Rng>(rng: &mut RNG) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self(seed)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for HashSeed {
    fn default() -> Self {
        Self([0u8; 32])
    }
}

/// Row of the GF(2) system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryRow {
    /// first column covered by the band, always a multiple of 8
    pub pos: usize,
    /// `pos / 8`
    pub bpos: usize,
    /// band pattern, exactly `w` bits
    pub bits: Band,
    /// right-hand side
    pub value: F128b,
}

/// Row of the GF(2^128) system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRow {
    /// first column covered by the band, always a multiple of 8
    pub pos: usize,
    /// band coefficients, exactly `w` of them
    pub coeffs: Vec<F128b>,
    /// right-hand side
    pub value: F128b,
}

/// Maps keys to rows. Pure: the same key, seed, `r` and `w` always give the same row.
#[derive(Clone, Copy, Debug)]
pub struct RowDeriver {
    seed: HashSeed,
    r: usize,
    w: usize,
}

impl RowDeriver {
    /// `r` is the hash range of band positions and `w` the band width in bits/symbols.
    pub fn new(seed: HashSeed, r: usize, w: usize) -> Result<Self, OkvsError> {
        if w == 0 || w % 8 != 0 {
            return Err(OkvsError::ConfigInvalid(format!(
                "band width w (={}) must be a positive multiple of 8",
                w
            )));
        }
        if r == 0 {
            return Err(OkvsError::ConfigInvalid("hash range r must be >= 1".to_string()));
        }
        if w > r {
            return Err(OkvsError::ConfigInvalid(format!(
                "band width w (={}) exceeds hash range r (={})",
                w, r
            )));
        }

        Ok(Self { seed, r, w })
    }

    /// Band width.
    pub fn w(&self) -> usize {
        self.w
    }

    /// Hash range of positions.
    pub fn r(&self) -> usize {
        self.r
    }

    fn xof(&self, key: u128) -> (usize, blake3::OutputReader) {
        let mut hasher = blake3::Hasher::new_keyed(self.seed.as_bytes());
        hasher.update(&key.to_le_bytes());
        let mut reader = hasher.finalize_xof();

        let mut head = [0u8; 16];
        reader.fill(&mut head);
        let pos = (u128::from_be_bytes(head) % self.r as u128) as usize;

        (pos / 8 * 8, reader)
    }

    /// Binary row of `key` carrying `value`.
    pub fn derive(&self, key: u128, value: F128b) -> BinaryRow {
        let (pos, mut reader) = self.xof(key);

        let mut raw = vec![0u8; self.w / 8];
        reader.fill(&mut raw);

        BinaryRow {
            pos,
            bpos: pos / 8,
            bits: Band::from_vec(raw),
            value,
        }
    }

    /// GF(2^128) row of `key` carrying `value`.
    pub fn derive_symbols(&self, key: u128, value: F128b) -> SymbolRow {
        let (pos, mut reader) = self.xof(key);

        let mut buf = [0u8; 16];
        let coeffs = (0..self.w)
            .map(|_| {
                reader.fill(&mut buf);
                F128b::from_uniform_bytes(&buf)
            })
            .collect();

        SymbolRow { pos, coeffs, value }
    }
}
