//! CLI (CommandLine Interface) utilities for the `okvs_psi` binary.
//!
//! Here, you can know the options for the protocol through enum types and structs.
//! See other modules for the actual implementation of the protocol or details of what options mean.

use crate::channel_utils::sync_channel::{
    create_unix_stream_pair, unix_track_channel, UnixTrackChannel,
};
use crate::channel_utils::sync_channel_by_cb::{
    create_crossbeam_end_pair, CrossbeamEnd, CrossbeamTrackChannel,
};
use crate::channel_utils::tcp_channel::{
    connect_tcp_stream, listen_tcp_stream, tcp_track_channel, TcpTrackChannel,
};
use crate::okvs::OkvsMode;
use crate::vole::lpn_based::{lpn_params_for, LPN_MEDIUM_THRESHOLD};
use crate::vole::{
    AlszVoleReceiver, AlszVoleSender, KosVoleReceiver, KosVoleSender, LpnVoleReceiver,
    LpnVoleSender, VoleReceiver, VoleSender,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::{CryptoRng, Rng};
use scuttlebutt::field::F128b;
use scuttlebutt::{AbstractChannel, TrackChannel};
use std::fmt::Display;
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// How to share VOLE (a kind of corelated randomness). More details: [vole](crate::vole).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum VoleType {
    /// Silent VOLE under the Learning Parity with Noise assumption. See [LpnVoleSender].
    Lpn,
    /// OT extension of Asharov, Lindell, Schneider and Zohner. See [AlszVoleSender].
    Alsz,
    /// OT extension of Keller, Orsini and Scholl. See [KosVoleSender].
    Kos,
}

impl Display for VoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoleType::Lpn => write!(f, "lpn"),
            VoleType::Alsz => write!(f, "alsz"),
            VoleType::Kos => write!(f, "kos"),
        }
    }
}

/// Row variant of the OKVS. More details: [okvs](crate::okvs).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum OkvsModeArg {
    /// Band of bits. See [OkvsMode::Binary].
    Binary,
    /// Band of GF(2^128) coefficients. See [OkvsMode::Gf128].
    Gf128,
}

impl Display for OkvsModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OkvsModeArg::Binary => write!(f, "binary"),
            OkvsModeArg::Gf128 => write!(f, "gf128"),
        }
    }
}

impl From<OkvsModeArg> for OkvsMode {
    fn from(arg: OkvsModeArg) -> Self {
        match arg {
            OkvsModeArg::Binary => OkvsMode::Binary,
            OkvsModeArg::Gf128 => OkvsMode::Gf128,
        }
    }
}

/// Channel types. Channels are used to communicate between parties. More details:
/// [channel_utils](crate::channel_utils).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum ChannelType {
    /// Unix domain socket. See [UnixStream].
    Unix,
    /// TCP socket on localhost. See [std::net::TcpStream].
    Tcp,
    /// Native channel of Rust. See
    /// [crossbeam_wrapper](crate::channel_utils::sync_channel_by_cb::crossbeam_wrapper).
    CrossBeam,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Unix => write!(f, "unix"),
            ChannelType::Tcp => write!(f, "tcp"),
            ChannelType::CrossBeam => write!(f, "crossbeam"),
        }
    }
}

/// Arguments for the two-party PSI.
/// This struct implements [clap::Parser] to make that this binary has CommandLine Arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, next_line_help = true)]
pub struct Args {
    /// Number of items of each party's set.
    #[arg(short = 'n', long, default_value_t = 1 << 10)]
    pub set_size: usize,

    /// Number of items both parties hold.
    #[arg(short = 'm', long, default_value_t = 100)]
    pub common_size: usize,

    /// Band width of the OKVS. Must be a positive multiple of 8.
    #[arg(short = 'w', long, default_value_t = 128)]
    pub band_width: usize,

    /// Expansion ratio of the OKVS: table size is `ceil(n * e)`.
    #[arg(short = 'e', long, default_value_t = 1.2)]
    pub expansion: f64,

    /// OKVS row variant.
    #[arg(short = 'o', long = "okvs", default_value_t = OkvsModeArg::Binary)]
    pub okvs_mode: OkvsModeArg,

    /// VOLE Sharing Methods.
    #[arg(short = 'v', long = "vole", default_value_t = VoleType::Lpn)]
    pub vole_type: VoleType,

    /// Channel Types.
    #[arg(short = 'c', long = "channel", default_value_t = ChannelType::Unix)]
    pub channel_type: ChannelType,

    /// Port number for TCP channel.
    ///
    /// The port is used internally. Both parties run in this process.
    #[arg(short = 'p', long = "port", default_value_t = 10000)]
    pub port: u16,

    /// Worker threads per party for encoding and decoding.
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    pub threads: usize,

    /// Receive timeout in seconds. 0 disables it.
    #[arg(long = "timeout", default_value_t = 60)]
    pub timeout: u64,

    /// Verbose mode.
    ///
    /// If specified, print the intersection.
    #[arg(long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Receive timeout, `None` if disabled.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// One party's end of a connection, before it is wrapped in a channel.
///
/// [TrackChannel] is not `Send`, so ends are created first, moved to the party's thread and opened
/// there.
pub enum ChannelEnd {
    /// Unix domain socket. See [UnixStream].
    Unix(UnixStream),
    /// Accept on `127.0.0.1:port`.
    TcpListen(u16, Option<Duration>),
    /// Connect to `127.0.0.1:port`.
    TcpConnect(u16, Option<Duration>),
    /// Native channel of Rust.
    CrossBeam(CrossbeamEnd),
}

impl ChannelEnd {
    /// Open this end as a traffic-counting channel.
    pub fn open(self) -> Result<TrackChannelUnion> {
        let res = match self {
            ChannelEnd::Unix(stream) => TrackChannelUnion::Unix(
                unix_track_channel(stream).with_context(|| format!("@{}:{}", file!(), line!()))?,
            ),
            ChannelEnd::TcpListen(port, timeout) => {
                let stream = listen_tcp_stream(port, timeout)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                TrackChannelUnion::Tcp(
                    tcp_track_channel(stream).with_context(|| format!("@{}:{}", file!(), line!()))?,
                )
            }
            ChannelEnd::TcpConnect(port, timeout) => {
                let stream = connect_tcp_stream(port, timeout)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                TrackChannelUnion::Tcp(
                    tcp_track_channel(stream).with_context(|| format!("@{}:{}", file!(), line!()))?,
                )
            }
            ChannelEnd::CrossBeam((r, s)) => TrackChannelUnion::CrossBeam(TrackChannel::new(r, s)),
        };
        Ok(res)
    }
}

/// Create `(sender end, receiver end)`. Runtime utility.
///
/// Crossbeam pipes have no "no timeout" mode; without one they wait a day.
pub fn create_channel_ends(
    type_: ChannelType,
    port: u16,
    timeout: Option<Duration>,
) -> Result<(ChannelEnd, ChannelEnd)> {
    match type_ {
        ChannelType::Unix => {
            let (s, r) = create_unix_stream_pair(timeout)?;
            Ok((ChannelEnd::Unix(s), ChannelEnd::Unix(r)))
        }
        ChannelType::Tcp => Ok((
            ChannelEnd::TcpConnect(port, timeout),
            ChannelEnd::TcpListen(port, timeout),
        )),
        ChannelType::CrossBeam => {
            let timeout = timeout.unwrap_or(Duration::from_secs(24 * 60 * 60));
            let (s, r) = create_crossbeam_end_pair(timeout);
            Ok((ChannelEnd::CrossBeam(s), ChannelEnd::CrossBeam(r)))
        }
    }
}

/// Enum type to handle multiple channel types on runtime. Please ignore it :)
pub enum TrackChannelUnion {
    /// Unix domain socket. See [UnixStream].
    Unix(UnixTrackChannel),
    /// TCP socket. See [std::net::TcpStream].
    Tcp(TcpTrackChannel),
    /// Native channel of Rust.
    CrossBeam(CrossbeamTrackChannel),
}

use TrackChannelUnion::*;

impl TrackChannelUnion {
    /// Kilobytes read so far.
    pub fn kilobytes_read(&self) -> f64 {
        match self {
            Unix(c) => c.kilobytes_read(),
            Tcp(c) => c.kilobytes_read(),
            CrossBeam(c) => c.kilobytes_read(),
        }
    }

    /// Kilobytes written so far.
    pub fn kilobytes_written(&self) -> f64 {
        match self {
            Unix(c) => c.kilobytes_written(),
            Tcp(c) => c.kilobytes_written(),
            CrossBeam(c) => c.kilobytes_written(),
        }
    }
}

impl AbstractChannel for TrackChannelUnion {
    #[inline(always)]
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Unix(c) => c.write_bytes(bytes),
            Tcp(c) => c.write_bytes(bytes),
            CrossBeam(c) => c.write_bytes(bytes),
        }
    }

    #[inline(always)]
    fn read_bytes(&mut self, bytes: &mut [u8]) -> std::io::Result<()> {
        match self {
            Unix(c) => c.read_bytes(bytes),
            Tcp(c) => c.read_bytes(bytes),
            CrossBeam(c) => c.read_bytes(bytes),
        }
    }

    #[inline(always)]
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Unix(c) => c.flush(),
            Tcp(c) => c.flush(),
            CrossBeam(c) => c.flush(),
        }
    }

    #[inline(always)]
    fn clone(&self) -> Self {
        match self {
            Unix(c) => Unix(c.clone()),
            Tcp(c) => Tcp(c.clone()),
            CrossBeam(c) => CrossBeam(c.clone()),
        }
    }
}

/// Enum type to handle multiple VOLE types for the PSI receiver on runtime. Please ignore it :)
#[derive(Clone, Copy)]
pub enum VoleReceiverUnion {
    /// See [LpnVoleReceiver].
    Lpn(LpnVoleReceiver),
    /// See [AlszVoleReceiver].
    Alsz(AlszVoleReceiver),
    /// See [KosVoleReceiver].
    Kos(KosVoleReceiver),
}

/// Enum type to handle multiple VOLE types for the PSI sender on runtime. Please ignore it :)
#[derive(Clone, Copy)]
pub enum VoleSenderUnion {
    /// See [LpnVoleSender].
    Lpn(LpnVoleSender),
    /// See [AlszVoleSender].
    Alsz(AlszVoleSender),
    /// See [KosVoleSender].
    Kos(KosVoleSender),
}

impl VoleReceiver<F128b> for VoleReceiverUnion {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(Vec<F128b>, Vec<F128b>)> {
        match self {
            VoleReceiverUnion::Lpn(v) => v.receive(channel, rng, m),
            VoleReceiverUnion::Alsz(v) => v.receive(channel, rng, m),
            VoleReceiverUnion::Kos(v) => v.receive(channel, rng, m),
        }
    }
}

impl VoleSender<F128b> for VoleSenderUnion {
    fn send<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        m: usize,
    ) -> Result<(F128b, Vec<F128b>)> {
        match self {
            VoleSenderUnion::Lpn(v) => v.send(channel, rng, m),
            VoleSenderUnion::Alsz(v) => v.send(channel, rng, m),
            VoleSenderUnion::Kos(v) => v.send(channel, rng, m),
        }
    }
}

/// Create VOLE sender and receiver for the protocol. Runtime utility.
///
/// `m` is the OKVS table size; it selects the LPN parameters.
pub fn create_vole_sr(vole_type: VoleType, m: usize) -> (VoleSenderUnion, VoleReceiverUnion) {
    match vole_type {
        VoleType::Lpn => {
            let (setup_param, extend_param) = lpn_params_for(m);
            let size = if m < LPN_MEDIUM_THRESHOLD {
                "small"
            } else {
                "medium"
            };
            log::info!("lpn vole: {} parameters for m = {}", size, m);
            (
                VoleSenderUnion::Lpn(LpnVoleSender::new(setup_param, extend_param)),
                VoleReceiverUnion::Lpn(LpnVoleReceiver::new(setup_param, extend_param)),
            )
        }
        VoleType::Alsz => (
            VoleSenderUnion::Alsz(AlszVoleSender::new()),
            VoleReceiverUnion::Alsz(AlszVoleReceiver::new()),
        ),
        VoleType::Kos => (
            VoleSenderUnion::Kos(KosVoleSender::new()),
            VoleReceiverUnion::Kos(KosVoleReceiver::new()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::{recv_symbols, send_symbols};
    use scuttlebutt::AesRng;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["okvs_psi"]);
        assert_eq!(args.band_width, 128);
        assert_eq!(args.timeout(), Some(Duration::from_secs(60)));
        assert!(matches!(args.okvs_mode, OkvsModeArg::Binary));
        assert!(matches!(args.vole_type, VoleType::Lpn));

        let args = Args::parse_from([
            "okvs_psi",
            "-o",
            "gf128",
            "-v",
            "kos",
            "-c",
            "cross-beam",
            "--timeout",
            "0",
        ]);
        assert!(matches!(OkvsMode::from(args.okvs_mode), OkvsMode::Gf128));
        assert!(matches!(args.vole_type, VoleType::Kos));
        assert!(matches!(args.channel_type, ChannelType::CrossBeam));
        assert_eq!(args.timeout(), None);
    }

    fn test_channel_ends_base(type_: ChannelType, port: u16) {
        let mut rng = AesRng::new();
        let v = (0..20).map(|_| rng.gen::<F128b>()).collect::<Vec<_>>();
        let w = v.clone();

        let (sender_end, receiver_end) =
            create_channel_ends(type_, port, Some(Duration::from_secs(5))).unwrap();

        let handle = std::thread::spawn(move || {
            let mut channel = sender_end.open().unwrap();
            send_symbols(&mut channel, "table", &w).unwrap();
            channel.kilobytes_written()
        });

        let mut channel = receiver_end.open().unwrap();
        assert_eq!(recv_symbols(&mut channel, "table", 20).unwrap(), v);

        let written = handle.join().unwrap();
        assert!(written > 0.0);
        assert_eq!(written, channel.kilobytes_read());
    }

    #[test]
    fn test_create_vole_sr_lpn() {
        let (s, r) = create_vole_sr(VoleType::Lpn, 1000);
        assert!(matches!(s, VoleSenderUnion::Lpn(_)));
        assert!(matches!(r, VoleReceiverUnion::Lpn(_)));

        let (s, r) = create_vole_sr(VoleType::Alsz, 1000);
        assert!(matches!(s, VoleSenderUnion::Alsz(_)));
        assert!(matches!(r, VoleReceiverUnion::Alsz(_)));
    }

    #[test]
    fn test_channel_ends_unix() {
        test_channel_ends_base(ChannelType::Unix, 0);
    }

    #[test]
    fn test_channel_ends_tcp() {
        test_channel_ends_base(ChannelType::Tcp, 10530);
    }

    #[test]
    fn test_channel_ends_crossbeam() {
        test_channel_ends_base(ChannelType::CrossBeam, 0);
    }
}
