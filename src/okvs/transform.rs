//! Element-wise table transforms over GF(2^128).
//!
//! Decoding is linear in the table, so for any table $`P`$, scalar $`s`$ and key $`x`$:
//!
//! ```math
//! \textsf{Decode}(x, s \cdot P) = s \cdot \textsf{Decode}(x, P)
//! ```
//!
//! This is what lets a table be rebased under the $`\Delta`$ of a VOLE correlation.

use crate::error::OkvsError;
use crate::parallel::WorkerPool;
use rayon::prelude::*;
use scuttlebutt::field::F128b;

/// `table[i] *= scalar` for every entry, in place.
pub fn mul_table(pool: &WorkerPool, table: &mut [F128b], scalar: F128b) {
    pool.install(|| {
        table.par_iter_mut().for_each(|x| *x *= scalar);
    });
}

/// `b[i] + scalar * a[i]`, the sender's view $`\bm{K} = \bm{B} + \Delta \bm{A'}`$.
pub fn scale_add(
    pool: &WorkerPool,
    b: &[F128b],
    scalar: F128b,
    a: &[F128b],
) -> Result<Vec<F128b>, OkvsError> {
    if a.len() != b.len() {
        return Err(OkvsError::LengthMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }

    Ok(pool.install(|| {
        b.par_iter()
            .zip(a.par_iter())
            .map(|(&b, &a)| b + scalar * a)
            .collect()
    }))
}

/// `a[i] + b[i]` (XOR of the two tables).
pub fn xor_tables(pool: &WorkerPool, a: &[F128b], b: &[F128b]) -> Result<Vec<F128b>, OkvsError> {
    if a.len() != b.len() {
        return Err(OkvsError::LengthMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(pool.install(|| a.par_iter().zip(b.par_iter()).map(|(&a, &b)| a + b).collect()))
}
