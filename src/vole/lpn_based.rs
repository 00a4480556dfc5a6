//! Silent VOLE from the LPN-based subfield VOLE of Weng, Yang, Katz and Wang
//! ([ocelot::svole::wykw]).
//!
//! `wykw` hands out subfield correlations $`w_i = u_i \Delta + v_i`$ with $`u_i \in \mathbb{F}_2`$.
//! Packing 128 of them along a GF(2) basis $`e_0, \dots, e_{127}`$ of GF(2^128) gives one
//! full-field correlation:
//!
//! ```math
//! \sum_i e_i w_i = \Delta \sum_i e_i u_i + \sum_i e_i v_i
//! ```
//!
//! so $`a = \sum_i e_i u_i`$ is uniform and $`c = a \Delta + b`$.
//!
//! - [Wolverine: Fast, Scalable, and Communication-Efficient Zero-Knowledge Proofs for Boolean and
//!   Arithmetic Circuits](https://eprint.iacr.org/2020/925)

use super::{ocelot_error, LpnParams, VoleReceiver, VoleSender};
use super::{LPN_EXTEND_MEDIUM, LPN_EXTEND_SMALL, LPN_SETUP_MEDIUM, LPN_SETUP_SMALL};
use crate::set_utils::FromU128;
use anyhow::{Context, Error};
use num_traits::Zero;
use ocelot::svole::wykw::{Receiver as WykwReceiver, Sender as WykwSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::field::{F128b, F2};

const F128_BITS: usize = 128;

/// Tables below this size use the small LPN parameters.
pub const LPN_MEDIUM_THRESHOLD: usize = 1 << 17;

/// Pick `(setup, extend)` LPN parameters for `m` correlations.
pub fn lpn_params_for(m: usize) -> (LpnParams, LpnParams) {
    if m < LPN_MEDIUM_THRESHOLD {
        (LPN_SETUP_SMALL, LPN_EXTEND_SMALL)
    } else {
        (LPN_SETUP_MEDIUM, LPN_EXTEND_MEDIUM)
    }
}

fn basis() -> Vec<F128b> {
    (0..F128_BITS)
        .map(|i| F128b::from_u128(1u128 << i))
        .collect()
}

/// VOLE sender backed by the `wykw` receiver (which holds $`\Delta`$).
#[derive(Clone, Copy)]
pub struct LpnVoleSender {
    setup_param: LpnParams,
    extend_param: LpnParams,
}

/// VOLE receiver backed by the `wykw` sender.
#[derive(Clone, Copy)]
pub struct LpnVoleReceiver {
    setup_param: LpnParams,
    extend_param: LpnParams,
}

impl LpnVoleSender {
    #[allow(missing_docs)]
    pub fn new(setup_param: LpnParams, extend_param: LpnParams) -> Self {
        Self {
            setup_param,
            extend_param,
        }
    }
}

impl Default for LpnVoleSender {
    fn default() -> Self {
        let (setup_param, extend_param) = lpn_params_for(0);
        Self::new(setup_param, extend_param)
    }
}

impl LpnVoleReceiver {
    #[allow(missing_docs)]
    pub fn new(setup_param: LpnParams, extend_param: LpnParams) -> Self {
        Self {
            setup_param,
            extend_param,
        }
    }
}

impl Default for LpnVoleReceiver {
    fn default() -> Self {
        let (setup_param, extend_param) = lpn_params_for(0);
        Self::new(setup_param, extend_param)
    }
}

impl VoleSender<F128b> for LpnVoleSender {
    fn send<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(F128b, Vec<F128b>), Error> {
        let needed = m * F128_BITS;

        let mut svole =
            WykwReceiver::<F128b>::init(channel, rng, self.setup_param, self.extend_param)
                .map_err(|e| ocelot_error("vole", e))
                .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let delta = svole.delta();

        let mut vs: Vec<F128b> = Vec::with_capacity(needed);
        let mut out = Vec::new();
        while vs.len() < needed {
            svole
                .receive(channel, rng, &mut out)
                .map_err(|e| ocelot_error("vole", e))
                .with_context(|| format!("@{}:{}", file!(), line!()))?;
            vs.extend(out.drain(..));
        }
        vs.truncate(needed);
        log::debug!("lpn vole send: {} correlations from {} subfield voles", m, needed);

        let basis = basis();
        let b_vec = vs
            .chunks_exact(F128_BITS)
            .map(|chunk| {
                chunk
                    .iter()
                    .zip(basis.iter())
                    .map(|(v, e)| *v * *e)
                    .sum::<F128b>()
            })
            .collect();

        Ok((delta, b_vec))
    }
}

impl VoleReceiver<F128b> for LpnVoleReceiver {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(Vec<F128b>, Vec<F128b>), Error> {
        let needed = m * F128_BITS;

        let mut svole = WykwSender::<F128b>::init(channel, rng, self.setup_param, self.extend_param)
            .map_err(|e| ocelot_error("vole", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let mut uws: Vec<(F2, F128b)> = Vec::with_capacity(needed);
        let mut out = Vec::new();
        while uws.len() < needed {
            svole
                .send(channel, rng, &mut out)
                .map_err(|e| ocelot_error("vole", e))
                .with_context(|| format!("@{}:{}", file!(), line!()))?;
            uws.extend(out.drain(..));
        }
        uws.truncate(needed);
        log::debug!("lpn vole receive: {} correlations from {} subfield voles", m, needed);

        let basis = basis();
        let (a_vec, c_vec) = uws
            .chunks_exact(F128_BITS)
            .map(|chunk| {
                chunk.iter().zip(basis.iter()).fold(
                    (F128b::zero(), F128b::zero()),
                    |(a, c), ((u, w), e)| {
                        let a = if u.is_zero() { a } else { a + *e };
                        (a, c + *w * *e)
                    },
                )
            })
            .unzip();

        Ok((a_vec, c_vec))
    }
}
