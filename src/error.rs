//! Error types of this crate.
//!
//! Solver-level failures are [OkvsError]; everything that can go wrong while two parties talk is
//! [PsiError]. Protocol functions return [anyhow::Result] with call-site context, and these errors
//! stay reachable with [anyhow::Error::downcast_ref].

use std::io;
use thiserror::Error;

/// Errors raised by [OkvsParams](crate::okvs::OkvsParams) and
/// [OkvsSolver](crate::okvs::OkvsSolver).
#[derive(Debug, Error)]
pub enum OkvsError {
    /// The banded system is singular at the given row (index after sorting by band position).
    ///
    /// Nothing is retried internally. Pick a fresh [HashSeed](crate::okvs::HashSeed) or a larger
    /// expansion factor.
    #[error("encode failed, banded system is singular at row {0}")]
    EncodeFailed(usize),

    /// Parameters rejected at construction.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Two inputs that must agree in length do not.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// length required by the parameters
        expected: usize,
        /// length actually given
        actual: usize,
    },

    /// The worker pool could not be created.
    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised by the two-party protocols and their message framing.
#[derive(Debug, Error)]
pub enum PsiError {
    /// Solver failure during a protocol run.
    #[error(transparent)]
    Okvs(#[from] OkvsError),

    /// A received buffer does not have the statically known length.
    #[error("message `{tag}` has {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// message label
        tag: String,
        /// expected length in bytes
        expected: usize,
        /// announced length in bytes
        actual: usize,
    },

    /// A bounded receive ran past its deadline.
    #[error("timed out while receiving `{tag}`")]
    ChannelTimeout {
        /// message label
        tag: String,
    },

    /// Transport failure other than a timeout.
    #[error("channel failure on `{tag}`")]
    Channel {
        /// message label
        tag: String,
        /// underlying io error
        #[source]
        source: io::Error,
    },

    /// The peer's OKVS header is inconsistent.
    #[error("inconsistent OKVS header: {0}")]
    HeaderMismatch(String),
}

impl PsiError {
    /// Classify an io error raised while handling message `tag`.
    ///
    /// Read timeouts surface as `WouldBlock` on unix sockets and as `TimedOut` elsewhere.
    pub fn from_io(tag: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => PsiError::ChannelTimeout {
                tag: tag.to_string(),
            },
            _ => PsiError::Channel {
                tag: tag.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let e = PsiError::from_io("x", io::Error::new(io::ErrorKind::TimedOut, "t"));
        assert!(matches!(e, PsiError::ChannelTimeout { .. }));

        let e = PsiError::from_io("x", io::Error::new(io::ErrorKind::WouldBlock, "t"));
        assert!(matches!(e, PsiError::ChannelTimeout { .. }));

        let e = PsiError::from_io("x", io::Error::new(io::ErrorKind::BrokenPipe, "t"));
        assert!(matches!(e, PsiError::Channel { .. }));
    }

    #[test]
    fn test_downcast_through_context() {
        use anyhow::Context;

        let res: Result<(), PsiError> = Err(PsiError::Okvs(OkvsError::EncodeFailed(3)));
        let err = res
            .with_context(|| format!("@{}:{}", file!(), line!()))
            .with_context(|| "outer")
            .unwrap_err();

        match err.downcast_ref::<PsiError>() {
            Some(PsiError::Okvs(OkvsError::EncodeFailed(3))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
