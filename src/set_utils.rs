//! Item conversions and set generators for the PSI protocols.
//!
//! Items are `u128`. They are hashed into rows as raw integers and enter the field as GF(2^128)
//! symbols through [FromU128].

use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};
use scuttlebutt::field::{F128b, FiniteField};
use scuttlebutt::serialization::CanonicalSerialize;
use std::collections::HashSet;

/// Trait for converting u128 to a type.
pub trait FromU128 {
    /// Convert u128 to a type.
    fn from_u128(x: u128) -> Self;
}

/// Trait for converting a type to u128.
pub trait ToU128 {
    /// Convert a type to u128.
    fn to_u128(&self) -> u128;
}

impl FromU128 for F128b {
    fn from_u128(x: u128) -> Self {
        F128b::from_uniform_bytes(&x.to_le_bytes())
    }
}

impl ToU128 for F128b {
    fn to_u128(&self) -> u128 {
        u128::from_le_bytes(self.to_bytes().into())
    }
}

/// The `i`-th item of the range generator: the first 16 bytes of `blake3(decimal(i))`, little
/// endian.
pub fn range_item(i: u64) -> u128 {
    let hash = blake3::hash(i.to_string().as_bytes());
    let mut b = [0u8; 16];
    b.copy_from_slice(&hash.as_bytes()[..16]);
    u128::from_le_bytes(b)
}

/// `[range_item(begin), ..., range_item(begin + size - 1)]`.
pub fn create_range_items(begin: u64, size: usize) -> Vec<u128> {
    (begin..begin + size as u64).map(range_item).collect()
}

/// Items as field symbols.
pub fn items_to_symbols(items: &[u128]) -> Vec<F128b> {
    items.iter().map(|&x| F128b::from_u128(x)).collect()
}

/// Create a sender set and a receiver set of `set_size` distinct random items that share exactly
/// `common_size` of them.
///
/// Returns `(common, sender_set, receiver_set)`; both sets are shuffled.
pub fn create_sets_with_common<RNG>(
    set_size: usize,
    common_size: usize,
    rng: &mut RNG,
) -> Result<(Vec<u128>, Vec<u128>, Vec<u128>)>
where
    RNG: CryptoRng + Rng,
{
    if set_size < common_size {
        bail!(
            "set_size (={}) < common_size (={}) @{}:{}",
            set_size,
            common_size,
            file!(),
            line!()
        );
    }

    let mut seen = HashSet::with_capacity(2 * set_size);
    let mut fresh = |rng: &mut RNG| loop {
        let x = rng.gen::<u128>();
        if seen.insert(x) {
            break x;
        }
    };

    let common = (0..common_size).map(|_| fresh(rng)).collect::<Vec<_>>();

    let mut sender_set = common.clone();
    while sender_set.len() < set_size {
        sender_set.push(fresh(rng));
    }
    let mut receiver_set = common.clone();
    while receiver_set.len() < set_size {
        receiver_set.push(fresh(rng));
    }

    sender_set.shuffle(rng);
    receiver_set.shuffle(rng);

    Ok((common, sender_set, receiver_set))
}
