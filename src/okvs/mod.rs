//! Banded OKVS (Oblivious Key-Value Store).
//!
//! Encoding $`n`$ key-value pairs produces a table $`\bm{P} \in \mathbb{F}^m`$ such that, for every
//! encoded key $`x`$ with row $`(pos, \bm{b})`$,
//!
//! ```math
//! \sum_{j < w} b_j \cdot P_{pos + j} = v
//! ```
//!
//! Decoding a key that was not encoded gives a pseudo-random value.
//!
//! Parameters: $`n`$ items, band width $`w`$ (bits or symbols), expansion $`e`$, table size
//! $`m = \lceil n e \rceil`$ and position range $`r = m - w`$.
//!
//! Two back-ends share this interface ([OkvsMode]): [OkvsMode::Binary] uses bit bands (XOR of table
//! entries), [OkvsMode::Gf128] uses bands of GF(2^128) coefficients. Both are linear over
//! GF(2^128), which is what the VOLE-masked protocols in [psi](crate::psi) rely on.
//!
//! See "Near-Optimal Oblivious Key-Value Stores for Efficient PSI, PSU and Volume-Hiding
//! Multi-Maps" @ <https://eprint.iacr.org/2023/903>

mod binary;
mod elimination;
mod gf128;
pub mod row;
pub mod transform;

pub use crate::error::OkvsError;
pub use row::{HashSeed, RowDeriver};

use crate::parallel::WorkerPool;
use elimination::BandRow;
use num_traits::Zero;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use scuttlebutt::field::F128b;
use scuttlebutt::{AesRng, Block};

/// Size parameters of an OKVS. Immutable once built; they fully determine the table size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OkvsParams {
    n: usize,
    w: usize,
    e: f64,
    m: usize,
    r: usize,
}

impl OkvsParams {
    /// Validate and derive `m` and `r`.
    pub fn new(n: usize, w: usize, e: f64) -> Result<Self, OkvsError> {
        if n == 0 {
            return Err(OkvsError::ConfigInvalid("item count n must be >= 1".to_string()));
        }
        if !(e.is_finite() && e > 1.0) {
            return Err(OkvsError::ConfigInvalid(format!(
                "expansion factor e (={}) must be a finite number > 1",
                e
            )));
        }
        if w == 0 || w % 8 != 0 {
            return Err(OkvsError::ConfigInvalid(format!(
                "band width w (={}) must be a positive multiple of 8",
                w
            )));
        }

        let m = (n as f64 * e).ceil() as usize;
        let r = m
            .checked_sub(w)
            .filter(|&r| r >= 1)
            .ok_or_else(|| {
                OkvsError::ConfigInvalid(format!(
                    "band width w (={}) leaves no room in m (={})",
                    w, m
                ))
            })?;
        if w > r {
            return Err(OkvsError::ConfigInvalid(format!(
                "band width w (={}) exceeds hash range r (={}); increase e",
                w, r
            )));
        }

        Ok(Self { n, w, e, m, r })
    }

    /// Like [OkvsParams::new], but raises `e` as far as needed for the band to fit (`m >= 2w`).
    /// Small item counts with a wide band would otherwise be rejected.
    pub fn fitted(n: usize, w: usize, e: f64) -> Result<Self, OkvsError> {
        if n == 0 {
            return Err(OkvsError::ConfigInvalid("item count n must be >= 1".to_string()));
        }
        let e_min = (2 * w) as f64 / n as f64;
        Self::new(n, w, e.max(e_min))
    }

    /// Number of items.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Band width.
    pub fn w(&self) -> usize {
        self.w
    }

    /// Expansion factor.
    pub fn e(&self) -> f64 {
        self.e
    }

    /// Table size.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Range of band positions.
    pub fn r(&self) -> usize {
        self.r
    }
}

/// Back-end selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OkvsMode {
    /// Bands of bits.
    Binary,
    /// Bands of GF(2^128) coefficients.
    Gf128,
}

impl OkvsMode {
    /// One-byte wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            OkvsMode::Binary => 0,
            OkvsMode::Gf128 => 1,
        }
    }

    /// Inverse of [OkvsMode::tag].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(OkvsMode::Binary),
            1 => Some(OkvsMode::Gf128),
            _ => None,
        }
    }
}

/// Owner of one OKVS table.
#[derive(Debug)]
pub struct OkvsSolver {
    params: OkvsParams,
    mode: OkvsMode,
    seed: HashSeed,
    deriver: RowDeriver,
    pool: WorkerPool,
    table: Vec<F128b>,
}

impl OkvsSolver {
    /// Solver with an all-zero table.
    pub fn new(
        params: OkvsParams,
        mode: OkvsMode,
        seed: HashSeed,
        pool: WorkerPool,
    ) -> Result<Self, OkvsError> {
        let table = vec![F128b::zero(); params.m()];
        Self::from_table(params, mode, seed, pool, table)
    }

    /// Wrap an existing table, e.g. one received from the peer.
    pub fn from_table(
        params: OkvsParams,
        mode: OkvsMode,
        seed: HashSeed,
        pool: WorkerPool,
        table: Vec<F128b>,
    ) -> Result<Self, OkvsError> {
        if table.len() != params.m() {
            return Err(OkvsError::LengthMismatch {
                expected: params.m(),
                actual: table.len(),
            });
        }
        let deriver = RowDeriver::new(seed, params.r(), params.w())?;

        Ok(Self {
            params,
            mode,
            seed,
            deriver,
            pool,
            table,
        })
    }

    /// Parameters.
    pub fn params(&self) -> &OkvsParams {
        &self.params
    }

    /// Back-end.
    pub fn mode(&self) -> OkvsMode {
        self.mode
    }

    /// Row hash key.
    pub fn seed(&self) -> HashSeed {
        self.seed
    }

    /// Worker pool used by this solver.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Current table.
    pub fn table(&self) -> &[F128b] {
        &self.table
    }

    /// Take the table.
    pub fn into_table(self) -> Vec<F128b> {
        self.table
    }

    // Non-pivot columns get pseudo-random content derived from the seed only, so encoding stays
    // deterministic.
    fn filler(&self) -> Vec<F128b> {
        let key = blake3::derive_key("banded_okvs_psi 2024 table filler", self.seed.as_bytes());
        let mut block = [0u8; 16];
        block.copy_from_slice(&key[..16]);
        let mut rng = AesRng::from_seed(Block::from(u128::from_le_bytes(block)));

        (0..self.params.m()).map(|_| rng.gen()).collect()
    }

    /// Encode `keys[i] -> values[i]`. Keys must be distinct and exactly `n` of them.
    ///
    /// On failure the previous table is left untouched.
    pub fn encode(&mut self, keys: &[u128], values: &[F128b]) -> Result<(), OkvsError> {
        if keys.len() != self.params.n() {
            return Err(OkvsError::LengthMismatch {
                expected: self.params.n(),
                actual: keys.len(),
            });
        }
        if values.len() != keys.len() {
            return Err(OkvsError::LengthMismatch {
                expected: keys.len(),
                actual: values.len(),
            });
        }

        log::debug!(
            "encoding {} keys into {} entries (w = {}, mode = {:?})",
            keys.len(),
            self.params.m(),
            self.params.w(),
            self.mode
        );

        let mut table = self.filler();
        let deriver = self.deriver;

        match self.mode {
            OkvsMode::Binary => {
                let rows = self.pool.install(|| {
                    keys.par_iter()
                        .zip(values.par_iter())
                        .map(|(&k, &v)| deriver.derive(k, v))
                        .collect::<Vec<_>>()
                });
                elimination::solve(&self.pool, rows, &mut table)?;
            }
            OkvsMode::Gf128 => {
                let rows = self.pool.install(|| {
                    keys.par_iter()
                        .zip(values.par_iter())
                        .map(|(&k, &v)| deriver.derive_symbols(k, v))
                        .collect::<Vec<_>>()
                });
                elimination::solve(&self.pool, rows, &mut table)?;
            }
        }

        self.table = table;
        Ok(())
    }

    fn decode_with(&self, key: u128, table: &[F128b]) -> F128b {
        match self.mode {
            OkvsMode::Binary => self.deriver.derive(key, F128b::zero()).fold(table, None),
            OkvsMode::Gf128 => self
                .deriver
                .derive_symbols(key, F128b::zero())
                .fold(table, None),
        }
    }

    /// Decode one key against the own table, on the calling thread.
    pub fn decode_single(&self, key: u128) -> F128b {
        self.decode_with(key, &self.table)
    }

    /// Decode `keys` against the own table.
    pub fn decode(&self, keys: &[u128]) -> Vec<F128b> {
        self.decode_table(keys, &self.table)
    }

    /// Decode `keys` against `table`, which has this solver's geometry but is owned elsewhere.
    pub fn decode_other_table(
        &self,
        keys: &[u128],
        table: &[F128b],
    ) -> Result<Vec<F128b>, OkvsError> {
        if table.len() != self.params.m() {
            return Err(OkvsError::LengthMismatch {
                expected: self.params.m(),
                actual: table.len(),
            });
        }

        Ok(self.decode_table(keys, table))
    }

    fn decode_table(&self, keys: &[u128], table: &[F128b]) -> Vec<F128b> {
        self.pool.install(|| {
            keys.par_iter()
                .map(|&k| self.decode_with(k, table))
                .collect()
        })
    }

    /// Multiply every table entry by `scalar`.
    pub fn mul(&mut self, scalar: F128b) {
        transform::mul_table(&self.pool, &mut self.table, scalar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ParallelConfig;
    use crate::set_utils::{create_range_items, FromU128, ToU128};
    use proptest::prelude::*;
    use scuttlebutt::AesRng;

    fn pool() -> WorkerPool {
        WorkerPool::new(&ParallelConfig::new(4)).unwrap()
    }

    fn random_values(n: usize, seed: u128) -> Vec<F128b> {
        let mut rng = AesRng::from_seed(Block::from(seed));
        (0..n).map(|_| rng.gen()).collect()
    }

    fn round_trip(n: usize, w: usize, e: f64, mode: OkvsMode) {
        let params = OkvsParams::new(n, w, e).unwrap();
        let mut solver = OkvsSolver::new(params, mode, HashSeed([7u8; 32]), pool()).unwrap();

        let keys = create_range_items(0, n);
        let values = random_values(n, 1);

        solver.encode(&keys, &values).unwrap();
        assert_eq!(solver.table().len(), params.m());

        let decoded = solver.decode(&keys);
        assert_eq!(decoded, values);

        for (k, v) in keys.iter().zip(values.iter()).take(10) {
            assert_eq!(solver.decode_single(*k), *v);
        }
    }

    #[test]
    fn test_params() {
        let p = OkvsParams::new(1 << 20, 512, 1.01).unwrap();
        assert_eq!(p.m(), 1059062);
        assert_eq!(p.r(), 1059062 - 512);

        assert!(matches!(
            OkvsParams::new(0, 8, 2.0),
            Err(OkvsError::ConfigInvalid(_))
        ));
        assert!(matches!(
            OkvsParams::new(100, 12, 2.0),
            Err(OkvsError::ConfigInvalid(_))
        ));
        assert!(matches!(
            OkvsParams::new(100, 128, 2.0),
            Err(OkvsError::ConfigInvalid(_))
        ));
        assert!(matches!(
            OkvsParams::new(100, 8, 0.5),
            Err(OkvsError::ConfigInvalid(_))
        ));
        assert!(matches!(
            OkvsParams::new(100, 8, f64::NAN),
            Err(OkvsError::ConfigInvalid(_))
        ));

        let p = OkvsParams::fitted(80, 128, 3.0).unwrap();
        assert!(p.w() <= p.r());
        assert_eq!(
            OkvsParams::fitted(1000, 128, 1.5).unwrap(),
            OkvsParams::new(1000, 128, 1.5).unwrap()
        );
    }

    #[test]
    fn test_round_trip_binary() {
        round_trip(1000, 128, 1.5, OkvsMode::Binary);
    }

    #[test]
    fn test_round_trip_binary_large() {
        round_trip(1 << 14, 256, 1.1, OkvsMode::Binary);
    }

    #[test]
    fn test_round_trip_gf128() {
        round_trip(500, 64, 1.5, OkvsMode::Gf128);
    }

    #[test]
    fn test_single_item() {
        round_trip(1, 64, 128.0, OkvsMode::Binary);
        round_trip(1, 8, 16.0, OkvsMode::Gf128);
    }

    #[test]
    fn test_deterministic() {
        let params = OkvsParams::new(300, 64, 1.5).unwrap();
        let keys = create_range_items(0, 300);
        let values = random_values(300, 2);

        for mode in [OkvsMode::Binary, OkvsMode::Gf128] {
            let mut a = OkvsSolver::new(params, mode, HashSeed([3u8; 32]), pool()).unwrap();
            let mut b = OkvsSolver::new(
                params,
                mode,
                HashSeed([3u8; 32]),
                WorkerPool::new(&ParallelConfig::single()).unwrap(),
            )
            .unwrap();

            a.encode(&keys, &values).unwrap();
            b.encode(&keys, &values).unwrap();

            assert_eq!(a.table(), b.table());
        }
    }

    #[test]
    fn test_homomorphism() {
        let mut rng = AesRng::new();
        let params = OkvsParams::new(400, 64, 1.5).unwrap();
        let keys = create_range_items(1000, 400);
        let values = random_values(400, 3);

        for mode in [OkvsMode::Binary, OkvsMode::Gf128] {
            let mut solver =
                OkvsSolver::new(params, mode, HashSeed::random(&mut rng), pool()).unwrap();
            solver.encode(&keys, &values).unwrap();

            let s: F128b = rng.gen();
            solver.mul(s);

            let decoded = solver.decode(&keys);
            for (d, v) in decoded.iter().zip(values.iter()) {
                assert_eq!(*d, s * *v);
            }
        }
    }

    #[test]
    fn test_decode_other_table() {
        let params = OkvsParams::new(200, 64, 1.5).unwrap();
        let keys = create_range_items(0, 200);
        let values = random_values(200, 4);

        let mut solver =
            OkvsSolver::new(params, OkvsMode::Binary, HashSeed([9u8; 32]), pool()).unwrap();
        solver.encode(&keys, &values).unwrap();

        let other = OkvsSolver::new(params, OkvsMode::Binary, HashSeed([9u8; 32]), pool()).unwrap();
        let decoded = other.decode_other_table(&keys, solver.table()).unwrap();
        assert_eq!(decoded, values);

        let short = &solver.table()[1..];
        assert!(matches!(
            other.decode_other_table(&keys, short),
            Err(OkvsError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_non_member_looks_uniform() {
        let params = OkvsParams::new(500, 128, 1.5).unwrap();
        let keys = create_range_items(0, 500);
        let values = random_values(500, 5);

        let mut solver =
            OkvsSolver::new(params, OkvsMode::Binary, HashSeed([5u8; 32]), pool()).unwrap();
        solver.encode(&keys, &values).unwrap();

        let others = create_range_items(100_000, 4096);
        let decoded = solver.decode(&others);

        let mut bins = [0usize; 16];
        for d in decoded.iter() {
            bins[(d.to_u128() & 0xf) as usize] += 1;
        }

        let expected = 4096.0 / 16.0;
        let chi2: f64 = bins
            .iter()
            .map(|&o| (o as f64 - expected).powi(2) / expected)
            .sum();

        // 15 degrees of freedom, P(chi2 > 60) < 1e-6
        assert!(chi2 < 60.0, "chi2 = {}, bins = {:?}", chi2, bins);
    }

    #[test]
    fn test_duplicate_keys_fail() {
        let params = OkvsParams::new(10, 64, 20.0).unwrap();
        let mut keys = create_range_items(0, 10);
        keys[9] = keys[0];
        let values = random_values(10, 6);

        let mut solver =
            OkvsSolver::new(params, OkvsMode::Binary, HashSeed([1u8; 32]), pool()).unwrap();
        let before = solver.table().to_vec();

        match solver.encode(&keys, &values) {
            Err(OkvsError::EncodeFailed(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(solver.table(), &before[..]);
    }

    #[test]
    fn test_length_checks() {
        let params = OkvsParams::new(10, 8, 4.0).unwrap();
        let mut solver =
            OkvsSolver::new(params, OkvsMode::Binary, HashSeed::default(), pool()).unwrap();

        let keys = create_range_items(0, 9);
        let values = vec![F128b::from_u128(1); 9];
        assert!(matches!(
            solver.encode(&keys, &values),
            Err(OkvsError::LengthMismatch {
                expected: 10,
                actual: 9
            })
        ));

        assert!(matches!(
            OkvsSolver::from_table(
                params,
                OkvsMode::Binary,
                HashSeed::default(),
                pool(),
                vec![F128b::zero(); 3]
            ),
            Err(OkvsError::LengthMismatch { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_encode_fails_or_round_trips(
            n in 1usize..200,
            w_bytes in 1usize..8,
            e in 1.2f64..3.0,
            seed in any::<[u8; 32]>(),
            binary in any::<bool>(),
        ) {
            let w = w_bytes * 8;
            let Ok(params) = OkvsParams::new(n, w, e) else {
                return Ok(());
            };
            let mode = if binary { OkvsMode::Binary } else { OkvsMode::Gf128 };
            let mut solver = OkvsSolver::new(params, mode, HashSeed(seed), pool()).unwrap();

            let keys = create_range_items(0, n);
            let values = random_values(n, 7);

            match solver.encode(&keys, &values) {
                Ok(()) => prop_assert_eq!(solver.decode(&keys), values),
                Err(OkvsError::EncodeFailed(_)) => {}
                Err(e) => return Err(TestCaseError::fail(format!("{}", e))),
            }
        }
    }
}
