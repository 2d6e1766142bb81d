//! Stream drivers: demux, pace, packetize.
//!
//! [`stream_video`] reads a raw encoder bitstream, reassembles it into
//! frames, holds each frame to its real-time deadline, and hands it to the
//! codec packetizer. [`stream_audio`] does the same for Opus frames arriving
//! on a channel. Both stop cleanly on cancellation: a frame is either sent
//! in full or not at all, so cancellation never leaves a frame half on the
//! wire.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{StreamOptions, VideoCodec};
use crate::demux::annexb::{H264NalSplitter, H265NalSplitter};
use crate::demux::ivf::IvfDemuxer;
use crate::error::Result;
use crate::pace::FramePacer;
use crate::packet::FramePacketizer;
use crate::packet::base::FrameSentHook;

/// Duration of one Opus frame.
const AUDIO_FRAME_INTERVAL: std::time::Duration = std::time::Duration::from_millis(20);

/// Read size for the video bitstream. Chunk boundaries are arbitrary; the
/// demuxers reassemble frames across them.
const READ_CHUNK: usize = 16 * 1024;

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The input was fully consumed.
    Finished,
    /// The cancellation token fired; remaining input was discarded.
    Cancelled,
}

/// Running totals for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub packets: u64,
    pub bytes: u64,
}

/// Terminal report for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub end: StreamEnd,
    pub stats: StreamStats,
}

/// Live, shareable view of cumulative stream totals.
///
/// Cloned handles observe the same counters.
/// [`MediaConnection`](crate::transport::MediaConnection) wires one into
/// every packetizer it builds, so callers can read progress while the
/// stream is still running; the drivers' [`StreamSummary`] remains the
/// terminal per-stream report.
#[derive(Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<StreamStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current totals across everything fed through this handle.
    pub fn snapshot(&self) -> StreamStats {
        *self.inner.lock()
    }

    /// Accounting hook that feeds this handle, one call per frame.
    pub fn hook(&self) -> FrameSentHook {
        let handle = self.clone();
        Box::new(move |packets, bytes| {
            let mut stats = handle.inner.lock();
            stats.frames += 1;
            stats.packets += u64::from(packets);
            stats.bytes += bytes;
        })
    }
}

/// Codec-selected frame reassembler over an arbitrary chunk stream.
enum FrameSource {
    H264(H264NalSplitter),
    H265(H265NalSplitter),
    Ivf(IvfDemuxer),
}

impl FrameSource {
    fn for_codec(codec: VideoCodec) -> Self {
        match codec {
            VideoCodec::H264 => Self::H264(H264NalSplitter::new()),
            VideoCodec::H265 => Self::H265(H265NalSplitter::new()),
            VideoCodec::Vp8 => Self::Ivf(IvfDemuxer::new()),
        }
    }

    /// Feed one chunk; returns the frames it completed, in decode order.
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        Ok(match self {
            Self::H264(s) => s.push(chunk).iter().map(|au| au.serialize()).collect(),
            Self::H265(s) => s.push(chunk).iter().map(|au| au.serialize()).collect(),
            Self::Ivf(d) => d.push(chunk)?.into_iter().map(|f| f.payload).collect(),
        })
    }

    /// Flush the frame still being accumulated at end of stream.
    fn finish(&mut self) -> Vec<Bytes> {
        match self {
            Self::H264(s) => s.finish().iter().map(|au| au.serialize()).collect(),
            Self::H265(s) => s.finish().iter().map(|au| au.serialize()).collect(),
            // A truncated trailing IVF record cannot be decoded; drop it.
            Self::Ivf(_) => Vec::new(),
        }
    }
}

/// Pace one frame and send it. Returns `false` when cancellation fired
/// before the frame went out.
async fn forward_frame(
    frame: &[u8],
    packetizer: &mut dyn FramePacketizer,
    pacer: &mut FramePacer,
    cancel: &CancellationToken,
    stats: &mut StreamStats,
) -> Result<bool> {
    tokio::select! {
        // Cancellation wins over an already-due deadline.
        biased;
        _ = cancel.cancelled() => return Ok(false),
        _ = pacer.wait() => {}
    }
    let sent = packetizer.send_frame(frame)?;
    stats.frames += 1;
    stats.packets += u64::from(sent.packets);
    stats.bytes += sent.bytes;
    Ok(true)
}

/// Drive a video bitstream to completion or cancellation.
///
/// `input` is the encoder's raw output (Annex B for H.264/H.265, IVF for
/// VP8). Cancellation is observed only between frames.
pub async fn stream_video<R: AsyncRead + Unpin>(
    mut input: R,
    packetizer: &mut dyn FramePacketizer,
    opts: &StreamOptions,
    cancel: &CancellationToken,
) -> Result<StreamSummary> {
    let mut source = FrameSource::for_codec(opts.video_codec);
    let mut pacer = if opts.pace_to_real_time {
        FramePacer::for_fps(opts.fps)
    } else {
        FramePacer::passthrough()
    };
    let mut stats = StreamStats::default();
    let mut buf = vec![0u8; READ_CHUNK];

    tracing::info!(codec = opts.video_codec.name(), fps = opts.fps, "video stream started");

    loop {
        if cancel.is_cancelled() {
            return Ok(summarize(StreamEnd::Cancelled, stats));
        }
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for frame in source.push(&buf[..n])? {
            if !forward_frame(&frame, packetizer, &mut pacer, cancel, &mut stats).await? {
                return Ok(summarize(StreamEnd::Cancelled, stats));
            }
        }
    }

    for frame in source.finish() {
        if !forward_frame(&frame, packetizer, &mut pacer, cancel, &mut stats).await? {
            return Ok(summarize(StreamEnd::Cancelled, stats));
        }
    }

    Ok(summarize(StreamEnd::Finished, stats))
}

/// Drive Opus frames from a channel to completion or cancellation.
///
/// Each channel message is exactly one encoded Opus frame. The channel
/// closing is the normal end of stream.
pub async fn stream_audio(
    mut frames: mpsc::Receiver<Bytes>,
    packetizer: &mut dyn FramePacketizer,
    pace_to_real_time: bool,
    cancel: &CancellationToken,
) -> Result<StreamSummary> {
    let mut pacer = if pace_to_real_time {
        FramePacer::new(AUDIO_FRAME_INTERVAL)
    } else {
        FramePacer::passthrough()
    };
    let mut stats = StreamStats::default();

    tracing::info!("audio stream started");

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(summarize(StreamEnd::Cancelled, stats)),
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        if !forward_frame(&frame, packetizer, &mut pacer, cancel, &mut stats).await? {
            return Ok(summarize(StreamEnd::Cancelled, stats));
        }
    }

    Ok(summarize(StreamEnd::Finished, stats))
}

fn summarize(end: StreamEnd, stats: StreamStats) -> StreamSummary {
    tracing::info!(
        ?end,
        frames = stats.frames,
        packets = stats.packets,
        bytes = stats.bytes,
        "stream ended"
    );
    StreamSummary { end, stats }
}
