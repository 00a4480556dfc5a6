//! GF(2) back-end: band entries are bits, table entries are GF(2^128) symbols combined by XOR.

use super::elimination::BandRow;
use super::row::BinaryRow;
use super::OkvsError;
use scuttlebutt::field::F128b;

impl BandRow for BinaryRow {
    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn value(&self) -> F128b {
        self.value
    }

    #[inline]
    fn normalize_pivot(&mut self) -> Option<usize> {
        // a set bit is already one
        self.bits.first_one()
    }

    fn eliminate(&mut self, pivot_row: &Self, col: usize) -> Result<(), OkvsError> {
        if !self.bits[col - self.pos] {
            return Ok(());
        }

        // byte `t` of this row is byte `t + shift` of the pivot row
        let shift = self.bpos.checked_sub(pivot_row.bpos).ok_or_else(|| {
            OkvsError::ConfigInvalid(format!(
                "rows out of order (bpos {} before {})",
                pivot_row.bpos, self.bpos
            ))
        })?;
        let src = pivot_row.bits.as_raw_slice();
        let span = src.len().checked_sub(shift).ok_or_else(|| {
            OkvsError::ConfigInvalid(format!(
                "band shift {} exceeds band length {} bytes",
                shift,
                src.len()
            ))
        })?;

        let dst = self.bits.as_raw_mut_slice();
        for (d, s) in dst[..span].iter_mut().zip(&src[shift..]) {
            *d ^= *s;
        }
        self.value += pivot_row.value;

        Ok(())
    }

    #[inline]
    fn fold(&self, table: &[F128b], skip: Option<usize>) -> F128b {
        self.bits
            .iter_ones()
            .map(|j| self.pos + j)
            .filter(|&c| Some(c) != skip)
            .map(|c| table[c])
            .sum()
    }
}
