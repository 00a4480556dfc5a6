//! Two-party message framing and channel constructors.
//!
//! Every bulk message is framed as a `usize` byte length followed by the payload. The receiver
//! always knows how many symbols it expects, and a frame whose announced length differs is rejected
//! with [PsiError::SizeMismatch] before any payload is read.
//!
//! Channels: [sync_channel] (unix domain socket), [tcp_channel] and [sync_channel_by_cb]
//! (in-process crossbeam). Each of them can bound receives with a timeout that surfaces as
//! [PsiError::ChannelTimeout].

use crate::error::PsiError;
use crate::set_utils::ToU128;
use anyhow::{Context, Result};
use generic_array::GenericArray;
use scuttlebutt::field::F128b;
use scuttlebutt::serialization::CanonicalSerialize;
use scuttlebutt::AbstractChannel;
use typenum::marker_traits::Unsigned;

pub mod sync_channel;
pub mod sync_channel_by_cb;
pub mod tcp_channel;

/// Bytes per serialized GF(2^128) symbol.
pub const SYMBOL_BYTES: usize = <<F128b as CanonicalSerialize>::ByteReprLen as Unsigned>::USIZE;

/// Write `v` as one framed message. Returns the payload length in bytes.
pub fn send_symbols<C: AbstractChannel>(channel: &mut C, tag: &str, v: &[F128b]) -> Result<usize> {
    let bytes = v
        .iter()
        .flat_map(|x| x.to_u128().to_le_bytes())
        .collect::<Vec<_>>();

    send_frame(channel, tag, &bytes).with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(bytes.len())
}

/// Read one framed message of exactly `expected` symbols.
pub fn recv_symbols<C: AbstractChannel>(
    channel: &mut C,
    tag: &str,
    expected: usize,
) -> Result<Vec<F128b>> {
    let expected_bytes = match expected.checked_mul(SYMBOL_BYTES) {
        Some(n) => n,
        None => {
            // no frame can be this long; report the announced length against a saturated
            // expectation
            let actual = channel
                .read_usize()
                .map_err(|e| PsiError::from_io(tag, e))
                .with_context(|| format!("@{}:{}", file!(), line!()))?;
            log::warn!("message `{}`: {} symbols expected, which overflows usize", tag, expected);
            return Err(PsiError::SizeMismatch {
                tag: tag.to_string(),
                expected: usize::MAX,
                actual,
            })
            .with_context(|| format!("@{}:{}", file!(), line!()));
        }
    };

    let bytes = recv_frame(channel, tag, expected_bytes)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    let res = bytes
        .chunks_exact(SYMBOL_BYTES)
        .map(|chunk| {
            F128b::from_bytes(GenericArray::from_slice(chunk))
                .with_context(|| format!("@{}:{}", file!(), line!()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(res)
}

/// Write a length-prefixed frame and flush.
pub fn send_frame<C: AbstractChannel>(channel: &mut C, tag: &str, bytes: &[u8]) -> Result<()> {
    channel
        .write_usize(bytes.len())
        .and_then(|_| channel.write_bytes(bytes))
        .and_then(|_| channel.flush())
        .map_err(|e| PsiError::from_io(tag, e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(())
}

/// Read a length-prefixed frame that must hold exactly `expected` bytes.
pub fn recv_frame<C: AbstractChannel>(
    channel: &mut C,
    tag: &str,
    expected: usize,
) -> Result<Vec<u8>> {
    let actual = channel
        .read_usize()
        .map_err(|e| PsiError::from_io(tag, e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    if actual != expected {
        log::warn!("message `{}`: {} bytes announced, {} expected", tag, actual, expected);
        return Err(PsiError::SizeMismatch {
            tag: tag.to_string(),
            expected,
            actual,
        })
        .with_context(|| format!("@{}:{}", file!(), line!()));
    }

    let mut buf = vec![0u8; expected];
    channel
        .read_bytes(&mut buf)
        .map_err(|e| PsiError::from_io(tag, e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(buf)
}

/// Write a bare `u128` (little endian), unframed.
pub fn write_u128<C: AbstractChannel>(channel: &mut C, tag: &str, x: u128) -> Result<()> {
    channel
        .write_bytes(&x.to_le_bytes())
        .map_err(|e| PsiError::from_io(tag, e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(())
}

/// Read a bare `u128` (little endian).
pub fn read_u128<C: AbstractChannel>(channel: &mut C, tag: &str) -> Result<u128> {
    let mut b = [0u8; 16];
    channel
        .read_bytes(&mut b)
        .map_err(|e| PsiError::from_io(tag, e))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(u128::from_le_bytes(b))
}
