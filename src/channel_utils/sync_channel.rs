//! Unix domain socket channels. See [UnixStream].

use anyhow::{Context, Result};
use scuttlebutt::{SyncChannel, TrackChannel};
use std::io::{BufReader, BufWriter};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// Buffered channel over one end of a socket pair.
pub type UnixChannel = SyncChannel<BufReader<UnixStream>, BufWriter<UnixStream>>;

/// Traffic-counting channel over one end of a socket pair.
pub type UnixTrackChannel = TrackChannel<BufReader<UnixStream>, BufWriter<UnixStream>>;

/// Connected pair of sockets, with reads on both ends bounded by `timeout` if given.
pub fn create_unix_stream_pair(timeout: Option<Duration>) -> Result<(UnixStream, UnixStream)> {
    let (s, r) = UnixStream::pair().with_context(|| format!("@{}:{}", file!(), line!()))?;
    s.set_read_timeout(timeout)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    r.set_read_timeout(timeout)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok((s, r))
}

/// Wrap one end of a pair.
pub fn unix_channel(stream: UnixStream) -> Result<UnixChannel> {
    let reader = stream
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(SyncChannel::new(
        BufReader::new(reader),
        BufWriter::new(stream),
    ))
}

/// Wrap one end of a pair and count its traffic. [TrackChannel] is not `Send`, so call this on the
/// thread that uses it.
pub fn unix_track_channel(stream: UnixStream) -> Result<UnixTrackChannel> {
    let reader = stream
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(TrackChannel::new(
        BufReader::new(reader),
        BufWriter::new(stream),
    ))
}

/// Two connected channels: `(sender side, receiver side)`.
pub fn create_unix_channel_pair(timeout: Option<Duration>) -> Result<(UnixChannel, UnixChannel)> {
    let (s, r) = create_unix_stream_pair(timeout)?;
    Ok((unix_channel(s)?, unix_channel(r)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::recv_symbols;
    use crate::error::PsiError;
    use scuttlebutt::AbstractChannel;

    #[test]
    fn test_pair() {
        let (mut left, mut right) = create_unix_channel_pair(None).unwrap();

        let handle = std::thread::spawn(move || {
            let n = left.read_u64().unwrap();
            left.write_u64(n + 1).unwrap();
            left.flush().unwrap();
        });

        right.write_u64(41).unwrap();
        right.flush().unwrap();
        assert_eq!(right.read_u64().unwrap(), 42);

        handle.join().unwrap();
    }

    #[test]
    fn test_timeout() {
        let (_left, mut right) =
            create_unix_channel_pair(Some(Duration::from_millis(50))).unwrap();

        let err = recv_symbols(&mut right, "aprime", 8).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PsiError>(),
            Some(PsiError::ChannelTimeout { .. })
        ));
    }

    #[test]
    fn test_track_channel_counts_bytes() {
        let (s, r) = create_unix_stream_pair(None).unwrap();
        let mut left = unix_track_channel(s).unwrap();
        let mut right = unix_track_channel(r).unwrap();

        left.write_bytes(&[0u8; 1024]).unwrap();
        left.flush().unwrap();
        let mut buf = [0u8; 1024];
        right.read_bytes(&mut buf).unwrap();

        assert_eq!(left.kilobytes_written(), 1.0);
        assert_eq!(right.kilobytes_read(), 1.0);
    }
}
