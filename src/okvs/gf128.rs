//! GF(2^128) back-end: band entries are field elements and elimination is full field elimination.

use super::elimination::BandRow;
use super::row::SymbolRow;
use super::OkvsError;
use num_traits::Zero;
use scuttlebutt::field::{F128b, FiniteField};

impl BandRow for SymbolRow {
    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn value(&self) -> F128b {
        self.value
    }

    fn normalize_pivot(&mut self) -> Option<usize> {
        let j = self.coeffs.iter().position(|c| !c.is_zero())?;

        let inv = self.coeffs[j].inverse();
        // entries before j are zero already
        for c in self.coeffs[j..].iter_mut() {
            *c *= inv;
        }
        self.value *= inv;

        Some(j)
    }

    fn eliminate(&mut self, pivot_row: &Self, col: usize) -> Result<(), OkvsError> {
        let factor = self.coeffs[col - self.pos];
        if factor.is_zero() {
            return Ok(());
        }

        // entry `t` of this row is entry `t + shift` of the pivot row
        let shift = self.pos.checked_sub(pivot_row.pos).ok_or_else(|| {
            OkvsError::ConfigInvalid(format!(
                "rows out of order (pos {} before {})",
                pivot_row.pos, self.pos
            ))
        })?;
        let span = pivot_row.coeffs.len().checked_sub(shift).ok_or_else(|| {
            OkvsError::ConfigInvalid(format!(
                "band shift {} exceeds band width {}",
                shift,
                pivot_row.coeffs.len()
            ))
        })?;

        for (d, &s) in self.coeffs[..span]
            .iter_mut()
            .zip(&pivot_row.coeffs[shift..])
        {
            *d -= factor * s;
        }
        self.value -= factor * pivot_row.value;

        Ok(())
    }

    #[inline]
    fn fold(&self, table: &[F128b], skip: Option<usize>) -> F128b {
        self.coeffs
            .iter()
            .enumerate()
            .filter(|&(j, _)| Some(self.pos + j) != skip)
            .map(|(j, &c)| c * table[self.pos + j])
            .sum()
    }
}
