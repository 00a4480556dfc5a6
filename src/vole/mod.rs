//! VOLE (Vector Oblivious Linear Evaluation) module.
//!
//! VOLE is a pair of correlated random vectors shared between two parties.
//!
//! The VOLE receiver gets $`\bm{A}, \bm{C} \in \mathbb{F}^m`$, the VOLE sender gets
//! $`\bm{B} \in \mathbb{F}^m`$ and a scalar $`\Delta \in \mathbb{F}`$, where $`m`$ is the
//! [OKVS](crate::okvs) table size:
//!
//! ```math
//! \bm{C} = \bm{A} \Delta + \bm{B}
//! ```
//!
//! In [psi](crate::psi) the PSI receiver masks its OKVS table as $`\bm{A} + \bm{P}`$ and the PSI
//! sender rebases it under $`\Delta`$.
//!
//! - [VOLE-PSI: Fast OPRF and Circuit-PSI from Vector-OLE](https://eprint.iacr.org/2021/266)

use crate::error::PsiError;
use anyhow::Error;
pub use ocelot::svole::wykw::{
    LpnParams, LPN_EXTEND_LARGE, LPN_EXTEND_MEDIUM, LPN_EXTEND_SMALL, LPN_SETUP_LARGE,
    LPN_SETUP_MEDIUM, LPN_SETUP_SMALL,
};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::field::FiniteField as FF;

pub mod lpn_based;
pub use lpn_based::{LpnVoleReceiver, LpnVoleSender};
pub mod ot_based;
pub use ot_based::{
    AlszVoleReceiver, AlszVoleSender, KosVoleReceiver, KosVoleSender, OtVoleReceiver,
    OtVoleSender,
};

/// Lift an error of the OT / sVOLE layer. I/O failures (receive timeouts included) become
/// [PsiError] so callers can tell a stalled peer from a broken one.
pub(crate) fn ocelot_error(tag: &str, e: ocelot::Error) -> Error {
    match e {
        ocelot::Error::IoError(e) => PsiError::from_io(tag, e).into(),
        other => Error::new(other),
    }
}

/// VOLE sender: obtains $`\Delta \in \mathbb{F}, \bm{B} \in \mathbb{F}^m`$.
pub trait VoleSender<F: FF>: Clone + Copy + Send {
    /// Run the sender side for `m` correlations.
    fn send<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(F, Vec<F>), Error>;
}

/// VOLE receiver: obtains $`\bm{A}, \bm{C} \in \mathbb{F}^m`$.
pub trait VoleReceiver<F: FF>: Clone + Copy + Send {
    /// Run the receiver side for `m` correlations.
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(Vec<F>, Vec<F>), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::sync_channel::create_unix_stream_pair;
    use crate::channel_utils::{recv_symbols, send_symbols};
    use scuttlebutt::field::F128b;
    use scuttlebutt::{AesRng, Channel};
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    fn test_vole_base<VS, VR>(m: usize)
    where
        VS: VoleSender<F128b> + Default + 'static,
        VR: VoleReceiver<F128b> + Default,
    {
        let (sender, receiver) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            let mut rng = AesRng::new();
            let reader = BufReader::new(sender.try_clone().unwrap());
            let writer = BufWriter::new(sender);
            let mut channel = Channel::new(reader, writer);

            let mut vole_sender = VS::default();
            let (delta, b_vec) = vole_sender.send(&mut channel, &mut rng, m).unwrap();

            send_symbols(&mut channel, "delta", &[delta]).unwrap();
            send_symbols(&mut channel, "b", &b_vec).unwrap();
        });

        let mut rng = AesRng::new();
        let reader = BufReader::new(receiver.try_clone().unwrap());
        let writer = BufWriter::new(receiver);
        let mut channel = Channel::new(reader, writer);

        let mut vole_receiver = VR::default();
        let (a_vec, c_vec) = vole_receiver.receive(&mut channel, &mut rng, m).unwrap();

        let delta = recv_symbols(&mut channel, "delta", 1).unwrap()[0];
        let b_vec = recv_symbols(&mut channel, "b", m).unwrap();

        handle.join().unwrap();

        assert_eq!(a_vec.len(), m);
        assert_eq!(c_vec.len(), m);
        for ((a, b), c) in a_vec.into_iter().zip(b_vec).zip(c_vec) {
            assert_eq!(a * delta + b, c);
        }
    }

    #[test]
    fn test_alsz_vole() {
        test_vole_base::<AlszVoleSender, AlszVoleReceiver>(100);
        test_vole_base::<AlszVoleSender, AlszVoleReceiver>(1000);
    }

    #[test]
    fn test_kos_vole() {
        test_vole_base::<KosVoleSender, KosVoleReceiver>(300);
    }

    #[test]
    fn test_lpn_vole() {
        test_vole_base::<LpnVoleSender, LpnVoleReceiver>(100);
        test_vole_base::<LpnVoleSender, LpnVoleReceiver>(2000);
    }

    fn test_silent_peer_base<VR: VoleReceiver<F128b> + Default>() {
        let (s, r) = create_unix_stream_pair(Some(Duration::from_millis(50))).unwrap();

        let mut rng = AesRng::new();
        let mut channel = Channel::new(BufReader::new(r.try_clone().unwrap()), BufWriter::new(r));
        let err = VR::default().receive(&mut channel, &mut rng, 10).unwrap_err();
        drop(s);

        assert!(matches!(
            err.downcast_ref::<PsiError>(),
            Some(PsiError::ChannelTimeout { .. })
        ));
    }

    #[test]
    fn test_silent_peer_is_timeout() {
        test_silent_peer_base::<AlszVoleReceiver>();
        test_silent_peer_base::<KosVoleReceiver>();
    }

    #[test]
    fn test_ocelot_error_mapping() {
        let closed = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let err = ocelot_error("vole", ocelot::Error::IoError(closed));
        assert!(matches!(
            err.downcast_ref::<PsiError>(),
            Some(PsiError::Channel { .. })
        ));

        let err = ocelot_error("vole", ocelot::Error::Other("bad".to_string()));
        assert!(err.downcast_ref::<PsiError>().is_none());
    }
}
