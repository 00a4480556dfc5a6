//! TCP channels on localhost. See [TcpStream].

use anyhow::{anyhow, Context, Result};
use scuttlebutt::{SyncChannel, TrackChannel};
use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::sleep;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_ATTEMPTS: usize = 50;

/// Buffered channel over a TCP stream.
pub type TcpChannel = SyncChannel<BufReader<TcpStream>, BufWriter<TcpStream>>;

/// Traffic-counting channel over a TCP stream.
pub type TcpTrackChannel = TrackChannel<BufReader<TcpStream>, BufWriter<TcpStream>>;

fn local_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn configure(stream: &TcpStream, timeout: Option<Duration>) -> Result<()> {
    stream
        .set_nodelay(true)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    stream
        .set_read_timeout(timeout)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(())
}

/// Accept one peer on `127.0.0.1:port`.
pub fn listen_tcp_stream(port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let addr = local_addr(port);
    let listener =
        TcpListener::bind(addr).with_context(|| format!("addr={} @{}:{}", addr, file!(), line!()))?;
    let (stream, peer) = listener
        .accept()
        .with_context(|| format!("addr={} @{}:{}", addr, file!(), line!()))?;
    log::debug!("accepted {} on {}", peer, addr);

    configure(&stream, timeout)?;
    Ok(stream)
}

/// Connect to `127.0.0.1:port`, retrying while the listener comes up.
pub fn connect_tcp_stream(port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let addr = local_addr(port);

    let mut last_err = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                configure(&stream, timeout)?;
                return Ok(stream);
            }
            Err(e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(100));
            }
        }
    }

    Err(anyhow!(
        "could not connect to {}: {:?} @{}:{}",
        addr,
        last_err,
        file!(),
        line!()
    ))
}

/// Connected pair of streams through `127.0.0.1:port`: `(connecting side, accepting side)`.
pub fn create_tcp_stream_pair(
    port: u16,
    timeout: Option<Duration>,
) -> Result<(TcpStream, TcpStream)> {
    let handle = std::thread::spawn(move || connect_tcp_stream(port, timeout));
    let accepted = listen_tcp_stream(port, timeout)?;
    let connected = handle
        .join()
        .map_err(|_| anyhow!("connecting thread panicked @{}:{}", file!(), line!()))??;

    Ok((connected, accepted))
}

/// Wrap a stream.
pub fn tcp_channel(stream: TcpStream) -> Result<TcpChannel> {
    let reader = stream
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(SyncChannel::new(
        BufReader::new(reader),
        BufWriter::new(stream),
    ))
}

/// Wrap a stream and count its traffic.
pub fn tcp_track_channel(stream: TcpStream) -> Result<TcpTrackChannel> {
    let reader = stream
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(TrackChannel::new(
        BufReader::new(reader),
        BufWriter::new(stream),
    ))
}

/// Two connected channels through `127.0.0.1:port`.
pub fn create_tcp_channel_pair(
    port: u16,
    timeout: Option<Duration>,
) -> Result<(TcpChannel, TcpChannel)> {
    let (s, r) = create_tcp_stream_pair(port, timeout)?;
    Ok((tcp_channel(s)?, tcp_channel(r)?))
}
