//! Two-party PSI from a banded OKVS masked by VOLE.
//!
//! ```text
//!  Receiver (items Y, |Y| = n)                      Sender (items X)
//!  ─────────────────────────────                    ────────────────
//!  header: m, n, w, e, mode, seed      ───────────▶ rebuild OkvsParams, check m
//!                                      ◀─────────── |X|
//!  P = Encode(Y -> Y)   ║ VOLE  (A, C) ◀═════════▶ VOLE  (Δ, B)
//!  A' = A + P                          ───────────▶ K = B + Δ A'
//!  masks_R = Decode(Y, C)                           masks_S = Decode(X, K) + Δ X
//!                                      ◀─────────── masks_S
//!  Y ∩ X = { y : masks_R(y) ∈ masks_S }
//! ```
//!
//! Since $`\bm{C} = \bm{A} \Delta + \bm{B}`$ we get $`\bm{K} = \bm{C} + \Delta \bm{P}`$, and by
//! linearity of decoding $`\textsf{Decode}(x, \bm{K}) + \Delta x = \textsf{Decode}(x, \bm{C})`$
//! whenever $`\textsf{Decode}(x, \bm{P}) = x`$, i.e. whenever $`x \in Y`$.
//!
//! Encoding runs on a scoped thread while the calling thread drives the VOLE receive. Both are
//! joined before $`\bm{A'}`$ is formed.
//!
//! - [Blazing Fast PSI from Improved OKVS and Subfield VOLE](https://eprint.iacr.org/2022/320)

use crate::channel_utils::{read_u128, recv_symbols, send_symbols, write_u128};
use crate::error::PsiError;
use crate::okvs::{transform, HashSeed, OkvsMode, OkvsParams, OkvsSolver};
use crate::parallel::WorkerPool;
use crate::set_utils::{items_to_symbols, FromU128};
use crate::vole::{VoleReceiver, VoleSender};
use anyhow::{anyhow, Context, Error};
use rand::{CryptoRng, Rng};
use rayon::prelude::*;
use scuttlebutt::field::F128b;
use scuttlebutt::AbstractChannel;
use std::collections::HashSet;

mod bin;
pub mod opprf;

pub use bin::run;

/// What the sender needs to derive the receiver's rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OkvsHeader {
    /// receiver's OKVS parameters
    pub params: OkvsParams,
    /// back-end
    pub mode: OkvsMode,
    /// row hash key
    pub seed: HashSeed,
}

impl OkvsHeader {
    /// `m` as u128, then `n`, `w`, the bits of `e`, the mode tag and the seed.
    pub fn write<C: AbstractChannel>(&self, channel: &mut C) -> Result<(), Error> {
        write_u128(channel, "okvs size", self.params.m() as u128)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        channel
            .write_u64(self.params.n() as u64)
            .and_then(|_| channel.write_u64(self.params.w() as u64))
            .and_then(|_| channel.write_u64(self.params.e().to_bits()))
            .and_then(|_| channel.write_u8(self.mode.tag()))
            .and_then(|_| channel.write_bytes(self.seed.as_bytes()))
            .and_then(|_| channel.flush())
            .map_err(|e| PsiError::from_io("okvs header", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(())
    }

    /// Read and validate a header.
    pub fn read<C: AbstractChannel>(channel: &mut C) -> Result<Self, Error> {
        let m = read_u128(channel, "okvs size")
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let mut seed = [0u8; 32];
        let (n, w, e_bits, tag) = (|| -> std::io::Result<_> {
            let n = channel.read_u64()?;
            let w = channel.read_u64()?;
            let e_bits = channel.read_u64()?;
            let tag = channel.read_u8()?;
            channel.read_bytes(&mut seed)?;
            Ok((n, w, e_bits, tag))
        })()
        .map_err(|e| PsiError::from_io("okvs header", e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let mode = OkvsMode::from_tag(tag)
            .ok_or_else(|| PsiError::HeaderMismatch(format!("unknown mode tag {}", tag)))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let params = OkvsParams::new(n as usize, w as usize, f64::from_bits(e_bits))
            .map_err(|e| PsiError::HeaderMismatch(e.to_string()))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if params.m() as u128 != m {
            return Err(PsiError::HeaderMismatch(format!(
                "announced m = {}, but (n, w, e) = ({}, {}, {}) gives m = {}",
                m,
                params.n(),
                params.w(),
                params.e(),
                params.m()
            )))
            .with_context(|| format!("@{}:{}", file!(), line!()));
        }

        Ok(Self {
            params,
            mode,
            seed: HashSeed(seed),
        })
    }
}

/// PSI receiver. Learns the intersection.
pub struct PsiReceiver<VR: VoleReceiver<F128b>> {
    solver: OkvsSolver,
    vole: VR,
}

impl<VR: VoleReceiver<F128b>> PsiReceiver<VR> {
    /// `params.n()` must be the number of items later passed to [PsiReceiver::receive].
    pub fn new(
        params: OkvsParams,
        mode: OkvsMode,
        seed: HashSeed,
        pool: WorkerPool,
        vole: VR,
    ) -> Result<Self, Error> {
        let solver = OkvsSolver::new(params, mode, seed, pool)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(Self { solver, vole })
    }

    /// OKVS header announced to the sender.
    pub fn header(&self) -> OkvsHeader {
        OkvsHeader {
            params: *self.solver.params(),
            mode: self.solver.mode(),
            seed: self.solver.seed(),
        }
    }

    /// Everything up to (not including) the sender's reply: returns the sender's item count and the
    /// receiver masks `Decode(items, C)`.
    pub(crate) fn exchange<C, RNG>(
        &mut self,
        channel: &mut C,
        items: &[u128],
        rng: &mut RNG,
    ) -> Result<(usize, Vec<F128b>), Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let header = self.header();
        let m = header.params.m();
        log::info!(
            "psi receiver: n = {}, w = {}, e = {}, m = {}, mode = {:?}",
            header.params.n(),
            header.params.w(),
            header.params.e(),
            m,
            header.mode
        );

        header
            .write(channel)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let sender_count = channel
            .read_u64()
            .map_err(|e| PsiError::from_io("sender count", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))? as usize;
        log::debug!("psi receiver: sender holds {} items", sender_count);

        let Self { solver, vole } = self;
        let symbols = items_to_symbols(items);

        let (vole_res, encode_res) = std::thread::scope(|s| {
            let handle = s.spawn(|| solver.encode(items, &symbols));
            let vole_res = vole.receive(channel, rng, m);
            (vole_res, handle.join())
        });

        encode_res
            .map_err(|_| anyhow!("encode thread panicked @{}:{}", file!(), line!()))?
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let (a, c) = vole_res.with_context(|| format!("@{}:{}", file!(), line!()))?;
        log::debug!("psi receiver: encode and vole done");

        let pool = solver.pool();
        let aprime = transform::xor_tables(pool, &a, solver.table())
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        send_symbols(channel, "aprime", &aprime)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let receiver_masks = solver
            .decode_other_table(items, &c)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok((sender_count, receiver_masks))
    }

    /// Run the protocol and return `(receiver_masks, sender_masks)`; `receiver_masks[i]` belongs to
    /// `items[i]`.
    pub fn receive_masks<C, RNG>(
        &mut self,
        channel: &mut C,
        items: &[u128],
        rng: &mut RNG,
    ) -> Result<(Vec<F128b>, Vec<F128b>), Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let (sender_count, receiver_masks) = self
            .exchange(channel, items, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let sender_masks = recv_symbols(channel, "sender masks", sender_count)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok((receiver_masks, sender_masks))
    }

    /// Run the protocol and return the items shared with the sender, in the order of `items`.
    pub fn receive<C, RNG>(
        &mut self,
        channel: &mut C,
        items: &[u128],
        rng: &mut RNG,
    ) -> Result<Vec<u128>, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let (receiver_masks, sender_masks) = self
            .receive_masks(channel, items, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let sender_masks: HashSet<F128b> = sender_masks.into_iter().collect();

        let res: Vec<u128> = self.solver.pool().install(|| {
            items
                .par_iter()
                .zip(receiver_masks.par_iter())
                .filter(|(_, mask)| sender_masks.contains(*mask))
                .map(|(&x, _)| x)
                .collect()
        });
        log::info!("psi receiver: intersection size {}", res.len());

        Ok(res)
    }
}

/// PSI sender. Learns nothing but the receiver's set size.
pub struct PsiSender<VS: VoleSender<F128b>> {
    pool: WorkerPool,
    vole: VS,
}

impl<VS: VoleSender<F128b>> PsiSender<VS> {
    #[allow(missing_docs)]
    pub fn new(pool: WorkerPool, vole: VS) -> Self {
        Self { pool, vole }
    }

    /// Everything up to (not including) sending the masks. Returns the receiver's header and
    /// `Decode(items, K) + Δ items`.
    pub(crate) fn masks<C, RNG>(
        &mut self,
        channel: &mut C,
        items: &[u128],
        rng: &mut RNG,
    ) -> Result<(OkvsHeader, Vec<F128b>), Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let header =
            OkvsHeader::read(channel).with_context(|| format!("@{}:{}", file!(), line!()))?;
        let m = header.params.m();
        log::info!(
            "psi sender: {} items, receiver m = {}, mode = {:?}",
            items.len(),
            m,
            header.mode
        );

        channel
            .write_u64(items.len() as u64)
            .and_then(|_| channel.flush())
            .map_err(|e| PsiError::from_io("sender count", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let (delta, b) = self
            .vole
            .send(channel, rng, m)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        log::debug!("psi sender: vole done");

        let aprime = recv_symbols(channel, "aprime", m)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let k = transform::scale_add(&self.pool, &b, delta, &aprime)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let decoder = OkvsSolver::from_table(
            header.params,
            header.mode,
            header.seed,
            self.pool.clone(),
            k,
        )
        .map_err(PsiError::from)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let raw = decoder.decode(items);
        let masks: Vec<F128b> = self.pool.install(|| {
            raw.par_iter()
                .zip(items.par_iter())
                .map(|(&d, &x)| d + delta * F128b::from_u128(x))
                .collect()
        });

        Ok((header, masks))
    }

    /// Run the protocol.
    pub fn send<C, RNG>(
        &mut self,
        channel: &mut C,
        items: &[u128],
        rng: &mut RNG,
    ) -> Result<(), Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let (_, masks) = self
            .masks(channel, items, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        send_symbols(channel, "sender masks", &masks)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        log::debug!("psi sender: masks sent");

        Ok(())
    }
}
