//! VOLE over GF(2^128) from 128 random OTs per correlation.
//!
//! For every correlation the sender draws $`\rho_0, \dots, \rho_{127}`$ and offers the pairs
//! $`(\rho_i, \rho_i + \Delta x^i)`$; the receiver selects with the bits of a random $`a`$. Summing
//! the selected messages gives $`c = \sum_i \rho_i + \Delta a = b + \Delta a`$.

use super::{ocelot_error, VoleReceiver, VoleSender};
use crate::set_utils::{FromU128, ToU128};
use anyhow::{ensure, Context, Error, Result};
use itertools::Itertools;
use num_traits::Zero;
use ocelot::ot::{
    AlszReceiver, AlszSender, KosReceiver, KosSender, Receiver as OtReceiver, Sender as OtSender,
};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::field::{F128b, FiniteField};
use scuttlebutt::Block;
use std::marker::PhantomData;

const F128_BITS: usize = 128;

/// VOLE sender on top of the OT sender `OT`.
pub struct OtVoleSender<OT: OtSender>(PhantomData<fn() -> OT>);

/// VOLE receiver on top of the OT receiver `OT`.
pub struct OtVoleReceiver<OT: OtReceiver>(PhantomData<fn() -> OT>);

/// ALSZ13 OT extension.
pub type AlszVoleSender = OtVoleSender<AlszSender>;
/// ALSZ13 OT extension.
pub type AlszVoleReceiver = OtVoleReceiver<AlszReceiver>;
/// KOS15 (malicious) OT extension.
pub type KosVoleSender = OtVoleSender<KosSender>;
/// KOS15 (malicious) OT extension.
pub type KosVoleReceiver = OtVoleReceiver<KosReceiver>;

impl<OT: OtSender> OtVoleSender<OT> {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT: OtSender> Default for OtVoleSender<OT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<OT: OtSender> Clone for OtVoleSender<OT> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<OT: OtSender> Copy for OtVoleSender<OT> {}

impl<OT> VoleSender<F128b> for OtVoleSender<OT>
where
    OT: OtSender,
    OT::Msg: From<Block>,
{
    fn send<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(F128b, Vec<F128b>), Error> {
        let delta: F128b = rng.gen();

        let x = F128b::from_u128(2);
        let delta_pows = (0..F128_BITS)
            .scan(delta, |acc, _| {
                let cur = *acc;
                *acc *= x;
                Some(cur)
            })
            .collect::<Vec<_>>();

        let mut b_vec: Vec<F128b> = Vec::with_capacity(m);
        let mut inputs: Vec<(OT::Msg, OT::Msg)> = Vec::with_capacity(m * F128_BITS);
        for _ in 0..m {
            let mut b = F128b::zero();
            for dp in delta_pows.iter() {
                let rho: F128b = rng.gen();
                b += rho;
                let left = Block::from(rho.to_u128());
                let right = Block::from((rho + *dp).to_u128());
                inputs.push((left.into(), right.into()));
            }
            b_vec.push(b);
        }

        log::debug!("vole send: {} correlations, {} OTs", m, inputs.len());

        let mut ot = OT::init(channel, rng)
            .map_err(|e| ocelot_error("vole", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        ot.send(channel, &inputs, rng)
            .map_err(|e| ocelot_error("vole", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok((delta, b_vec))
    }
}

impl<OT: OtReceiver> OtVoleReceiver<OT> {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT: OtReceiver> Default for OtVoleReceiver<OT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<OT: OtReceiver> Clone for OtVoleReceiver<OT> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<OT: OtReceiver> Copy for OtVoleReceiver<OT> {}

fn msg_to_f128b(msg: &mut impl AsMut<[u8]>) -> Result<F128b> {
    let bytes: [u8; 16] = msg
        .as_mut()
        .try_into()
        .with_context(|| format!("OT message is not 16 bytes @{}:{}", file!(), line!()))?;
    Ok(F128b::from_uniform_bytes(&bytes))
}

impl<OT> VoleReceiver<F128b> for OtVoleReceiver<OT>
where
    OT: OtReceiver,
    OT::Msg: From<Block>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(Vec<F128b>, Vec<F128b>), Error> {
        let mut a_vec = Vec::with_capacity(m);
        let mut choices: Vec<bool> = Vec::with_capacity(m * F128_BITS);

        // a = 0 is a valid correlation (c = b), so every sample is kept
        for _ in 0..m {
            let a = rng.gen::<u128>();
            choices.extend((0..F128_BITS).map(|i| (a >> i) & 1 == 1));
            a_vec.push(F128b::from_u128(a));
        }

        log::debug!("vole receive: {} correlations, {} OTs", m, choices.len());

        let mut ot = OT::init(channel, rng)
            .map_err(|e| ocelot_error("vole", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let rhos = ot
            .receive(channel, &choices, rng)
            .map_err(|e| ocelot_error("vole", e))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let c_vec = rhos
            .into_iter()
            .chunks(F128_BITS)
            .into_iter()
            .map(|chunk| {
                chunk
                    .map(|mut msg| msg_to_f128b(&mut msg))
                    .sum::<Result<F128b>>()
            })
            .collect::<Result<Vec<_>>>()?;

        ensure!(
            c_vec.len() == m,
            "OT returned {} correlations, expected {} @{}:{}",
            c_vec.len(),
            m,
            file!(),
            line!()
        );

        Ok((a_vec, c_vec))
    }
}
