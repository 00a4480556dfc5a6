//! OPPRF (Oblivious Programmable PRF) on top of the VOLE-masked exchange in [psi](crate::psi).
//!
//! The sender programs a payload for each of its items. After the masks are computed, instead of
//! sending them the sender encodes
//!
//! ```math
//! x \mapsto \textsf{mask}_S(x) + \textsf{payload}(x)
//! ```
//!
//! into a second OKVS (same `w`, mode and seed as the receiver's, sized by [OkvsParams::fitted] for
//! the sender's item count) and sends that table. The receiver decodes it at its items and adds its
//! own masks: a shared item yields exactly its payload, any other item a pseudo-random value.

use super::{PsiReceiver, PsiSender};
use crate::channel_utils::{recv_symbols, send_symbols};
use crate::error::PsiError;
use crate::okvs::{transform, OkvsParams, OkvsSolver};
use crate::parallel::WorkerPool;
use crate::vole::{VoleReceiver, VoleSender};
use anyhow::{Context, Error};
use rand::{CryptoRng, Rng};
use scuttlebutt::field::F128b;
use scuttlebutt::AbstractChannel;

/// OPPRF sender: holds `(item, payload)` points.
pub struct OpprfSender<VS: VoleSender<F128b>> {
    inner: PsiSender<VS>,
}

impl<VS: VoleSender<F128b>> OpprfSender<VS> {
    #[allow(missing_docs)]
    pub fn new(pool: WorkerPool, vole: VS) -> Self {
        Self {
            inner: PsiSender::new(pool, vole),
        }
    }

    /// Program `points` and send the resulting table. Items must be distinct.
    pub fn send<C, RNG>(
        &mut self,
        channel: &mut C,
        points: &[(u128, F128b)],
        rng: &mut RNG,
    ) -> Result<(), Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let (items, payloads): (Vec<u128>, Vec<F128b>) = points.iter().copied().unzip();

        let (header, masks) = self
            .inner
            .masks(channel, &items, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let pool = self.inner.pool.clone();
        let values = transform::xor_tables(&pool, &masks, &payloads)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let params = OkvsParams::fitted(items.len(), header.params.w(), header.params.e())
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let mut solver = OkvsSolver::new(params, header.mode, header.seed, pool)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        solver
            .encode(&items, &values)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        send_symbols(channel, "opprf table", solver.table())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        log::debug!("opprf sender: {} points programmed", items.len());

        Ok(())
    }
}

/// OPPRF receiver: evaluates the programmed function at its queries.
pub struct OpprfReceiver<VR: VoleReceiver<F128b>> {
    inner: PsiReceiver<VR>,
}

impl<VR: VoleReceiver<F128b>> OpprfReceiver<VR> {
    /// See [PsiReceiver::new]; `params.n()` is the number of queries.
    pub fn new(inner: PsiReceiver<VR>) -> Self {
        Self { inner }
    }

    /// Returns one output per query, in query order.
    pub fn receive<C, RNG>(
        &mut self,
        channel: &mut C,
        queries: &[u128],
        rng: &mut RNG,
    ) -> Result<Vec<F128b>, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let (sender_count, receiver_masks) = self
            .inner
            .exchange(channel, queries, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let header = self.inner.header();
        let params = OkvsParams::fitted(sender_count, header.params.w(), header.params.e())
            .map_err(|e| PsiError::HeaderMismatch(e.to_string()))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let table = recv_symbols(channel, "opprf table", params.m())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let pool = self.inner.solver.pool().clone();
        let decoder = OkvsSolver::from_table(params, header.mode, header.seed, pool.clone(), table)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let res = transform::xor_tables(&pool, &decoder.decode(queries), &receiver_masks)
            .map_err(PsiError::from)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::okvs::{HashSeed, OkvsMode};
    use crate::parallel::ParallelConfig;
    use crate::set_utils::create_range_items;
    use crate::vole::{AlszVoleReceiver, AlszVoleSender};
    use scuttlebutt::{AesRng, Channel};
    use std::collections::HashMap;
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;

    fn pool() -> WorkerPool {
        WorkerPool::new(&ParallelConfig::new(2)).unwrap()
    }

    fn test_opprf_base(mode: OkvsMode) {
        let mut rng = AesRng::new();

        let sender_items = create_range_items(0, 80);
        let points = sender_items
            .iter()
            .map(|&x| (x, rng.gen::<F128b>()))
            .collect::<Vec<_>>();
        let programmed: HashMap<u128, F128b> = points.iter().copied().collect();

        let queries = create_range_items(40, 100);

        let (s, r) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            let mut rng = AesRng::new();
            let mut channel = Channel::new(
                BufReader::new(s.try_clone().unwrap()),
                BufWriter::new(s),
            );
            let mut sender = OpprfSender::new(pool(), AlszVoleSender::new());
            sender.send(&mut channel, &points, &mut rng).unwrap();
        });

        let mut channel = Channel::new(
            BufReader::new(r.try_clone().unwrap()),
            BufWriter::new(r),
        );
        let params = OkvsParams::new(queries.len(), 128, 3.0).unwrap();
        let inner = PsiReceiver::new(
            params,
            mode,
            HashSeed::random(&mut rng),
            pool(),
            AlszVoleReceiver::new(),
        )
        .unwrap();
        let mut receiver = OpprfReceiver::new(inner);
        let outputs = receiver.receive(&mut channel, &queries, &mut rng).unwrap();

        handle.join().unwrap();

        assert_eq!(outputs.len(), queries.len());
        let payloads: Vec<F128b> = programmed.values().copied().collect();
        for (q, out) in queries.iter().zip(outputs.iter()) {
            match programmed.get(q) {
                Some(payload) => assert_eq!(out, payload),
                None => assert!(!payloads.contains(out)),
            }
        }
    }

    #[test]
    fn test_opprf_binary() {
        test_opprf_base(OkvsMode::Binary);
    }

    #[test]
    fn test_opprf_gf128() {
        test_opprf_base(OkvsMode::Gf128);
    }
}
