//! Error types for the media streaming pipeline.

/// Errors that can occur while building or running a media pipeline.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Setup** (fatal, surfaced before any packet is sent):
///   [`UnsupportedCodec`](Self::UnsupportedCodec),
///   [`InvalidContainer`](Self::InvalidContainer),
///   [`SsrcUnset`](Self::SsrcUnset),
///   [`InvalidKeyLength`](Self::InvalidKeyLength).
/// - **Runtime** (fatal, tears down the whole pipeline):
///   [`Io`](Self::Io), [`Encryption`](Self::Encryption),
///   [`ChannelClosed`](Self::ChannelClosed).
/// - **Control plane**: [`Control`](Self::Control) — best-effort command
///   channel failures, never affects the packet path.
///
/// Malformed *framing* in the splitters/demuxer is not an error: incomplete
/// units are buffered until more bytes arrive. Cancellation and end-of-stream
/// are not errors either — pipeline drivers report them through
/// [`StreamEnd`](crate::stream::StreamEnd).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec name did not normalize to a supported codec.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Container-level validation failed (e.g. missing IVF `DKIF` magic).
    #[error("invalid container: {0}")]
    InvalidContainer(&'static str),

    /// A packetizer was constructed with an SSRC of zero. The SSRC is
    /// assigned by the signaling layer at connection setup; zero means it
    /// was never negotiated.
    #[error("synchronization source id is unset (zero)")]
    SsrcUnset,

    /// The encryption key did not have the expected length.
    #[error("invalid encryption key length: got {0} bytes, expected 32")]
    InvalidKeyLength(usize),

    /// AEAD encryption failed. Payloads are never sent in the clear, so
    /// this aborts the stream.
    #[error("payload encryption failed")]
    Encryption,

    /// An inter-stage channel closed while the pipeline was still running.
    #[error("pipeline channel closed unexpectedly")]
    ChannelClosed,

    /// The live-control command channel failed to deliver a command.
    #[error("control command failed: {0}")]
    Control(String),
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
