//! Stream configuration supplied by the signaling layer.
//!
//! The session negotiation (out of scope for this crate) hands over the
//! resolved parameters once at stream start: codec selection, target
//! resolution/fps/bitrate, payload types, SSRCs, MTU, and the encryption
//! key. Everything here is immutable for the lifetime of a stream.

use crate::error::{Result, StreamError};

/// Video codecs the pipeline can packetize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264/AVC, Annex B bitstream input.
    H264,
    /// H.265/HEVC, Annex B bitstream input.
    H265,
    /// VP8 in an IVF container.
    Vp8,
}

impl VideoCodec {
    /// Codec name as used in signaling payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::H265 => "H265",
            Self::Vp8 => "VP8",
        }
    }
}

/// Normalize a free-form codec name from session metadata.
///
/// Accepts the common spellings (`h264`, `H.264`, `AVC`, `h265`, `HEVC`,
/// `vp8`, ...). Anything else is a fatal setup error — codec selection
/// happens before the pipeline is built, so an unsupported codec never
/// reaches the packet path.
pub fn normalize_video_codec(codec: &str) -> Result<VideoCodec> {
    let c = codec.to_ascii_uppercase().replace('.', "");
    match c.as_str() {
        "H264" | "AVC" => Ok(VideoCodec::H264),
        "H265" | "HEVC" => Ok(VideoCodec::H265),
        "VP8" => Ok(VideoCodec::Vp8),
        _ => Err(StreamError::UnsupportedCodec(codec.to_string())),
    }
}

/// Per-stream options resolved during session negotiation.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Target width in pixels (encoder-side, informational here).
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Declared video frame rate; drives both the pacing cadence and the
    /// RTP timestamp increment per frame.
    pub fps: u32,
    /// Target video bitrate in kbit/s (encoder-side, informational here).
    pub bitrate_kbps: u32,
    /// Selected video codec.
    pub video_codec: VideoCodec,
    /// Maximum payload bytes per RTP packet before fragmentation.
    pub mtu: usize,
    /// Packets between consecutive RTCP Sender Reports.
    pub sr_interval: u64,
    /// When `false`, frames are forwarded as fast as they arrive instead of
    /// being paced to real time (pre-recorded fast transfer).
    pub pace_to_real_time: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate_kbps: 1000,
            video_codec: VideoCodec::H264,
            mtu: 1200,
            sr_interval: 512,
            pace_to_real_time: true,
        }
    }
}

/// Stream characteristics returned by a media probe.
///
/// Used only to decide whether to build the audio branch of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMetadata {
    pub has_audio: bool,
    pub has_video: bool,
}

/// Synchronous probe over an input's stream layout.
///
/// Implemented by the encoder integration (e.g. an ffprobe wrapper); the
/// pipeline itself never probes.
pub trait MediaProbe {
    fn probe(&self, input: &str) -> Result<StreamMetadata>;
}
