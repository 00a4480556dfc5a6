//! Banded Gaussian elimination shared by both back-ends.
//!
//! ```text
//!  sorted by pos          after forward elimination
//!
//!  ⎡▓▓▓▓░░░░░░░░| v_1 ⎤    ⎡1▓▓▓░░░░░░░░| v_1'⎤     piv_1 = 0
//!  ⎢▓▓▓▓░░░░░░░░| v_2 ⎥    ⎢0 1▓▓░░░░░░░| v_2'⎥     piv_2 = 1
//!  ⎢░░▓▓▓▓░░░░░░| v_3 ⎥ →  ⎢░░0 1▓▓░░░░░| v_3'⎥     piv_3 = 3
//!  ⎣░░░░░▓▓▓▓░░░| v_4 ⎦    ⎣░░░░░1▓▓▓░░░| v_4'⎦     piv_4 = 5
//! ```
//!
//! Every row only touches `w` consecutive columns starting at its `pos`. Once the rows are sorted
//! by `pos`, the rows that can still hold a nonzero entry in column `piv_i` are exactly the ones in
//! `(i, kk)` where `kk` is the first row with `pos > piv_i`. The pivot loop is sequential; the
//! update of `(i, kk)` fans out over the pool and each task owns one row.
//!
//! Back-substitution walks the rows in reverse. Row `i` only reads table entries that are either
//! not a pivot column (pre-filled) or the pivot of a later row, so every entry it needs is final
//! when it is read.

use super::OkvsError;
use crate::parallel::WorkerPool;
use rayon::prelude::*;
use scuttlebutt::field::F128b;

/// Below this many candidate rows the band update runs on the calling thread.
const PARALLEL_UPDATE_MIN_ROWS: usize = 64;

/// A row whose support is confined to a band of the table.
pub(crate) trait BandRow: Send + Sync {
    /// First column covered by the band.
    fn pos(&self) -> usize;

    /// Right-hand side.
    fn value(&self) -> F128b;

    /// Offset (inside the band) of the first nonzero entry, scaling the row so that this entry is
    /// one. `None` if the band is all zero.
    fn normalize_pivot(&mut self) -> Option<usize>;

    /// Clear global column `col` of `self` using `pivot_row`, whose pivot is `col`.
    ///
    /// `pivot_row.pos() <= self.pos() <= col` holds.
    fn eliminate(&mut self, pivot_row: &Self, col: usize) -> Result<(), OkvsError>;

    /// Sum of band entries times the table entries they cover, leaving out global column `skip`.
    fn fold(&self, table: &[F128b], skip: Option<usize>) -> F128b;
}

/// Solve `rows` into `table`. Entries of `table` that no row pivots on keep their current content.
pub(crate) fn solve<R: BandRow>(
    pool: &WorkerPool,
    mut rows: Vec<R>,
    table: &mut [F128b],
) -> Result<(), OkvsError> {
    let n = rows.len();

    pool.install(|| -> Result<(), OkvsError> {
        // stable, so equal positions keep key order and the result stays deterministic
        rows.par_sort_by_key(|row| row.pos());

        let mut piv = vec![0usize; n];

        for i in 0..n {
            let (head, tail) = rows.split_at_mut(i + 1);
            let pivot_row = &mut head[i];

            let Some(offset) = pivot_row.normalize_pivot() else {
                log::debug!("no pivot for row {} (pos = {})", i, pivot_row.pos());
                return Err(OkvsError::EncodeFailed(i));
            };
            let col = pivot_row.pos() + offset;
            piv[i] = col;

            let pivot_row = &*pivot_row;
            let kk = tail.partition_point(|row| row.pos() <= col);
            let candidates = &mut tail[..kk];

            if candidates.len() < PARALLEL_UPDATE_MIN_ROWS {
                candidates
                    .iter_mut()
                    .try_for_each(|row| row.eliminate(pivot_row, col))?;
            } else {
                candidates
                    .par_iter_mut()
                    .try_for_each(|row| row.eliminate(pivot_row, col))?;
            }
        }

        for i in (0..n).rev() {
            let row = &rows[i];
            let res = row.fold(table, Some(piv[i]));
            table[piv[i]] = row.value() - res;
        }

        Ok(())
    })
}
