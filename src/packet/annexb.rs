//! H.264/H.265 video packetizer.
//!
//! Consumes the length-delimited access unit blob produced by the Annex B
//! splitter (see [`AccessUnit::serialize`](crate::demux::AccessUnit::serialize))
//! and fragments it into MTU-bounded packets. The receiver reassembles the
//! frame from the chunk sequence, so no per-chunk codec annotation is
//! needed; the marker bit on the last packet closes the frame.

use std::sync::Arc;

use crate::crypto::PacketCipher;
use crate::error::Result;
use crate::packet::base::BaseMediaPacketizer;
use crate::packet::rtp::PlayoutDelay;
use crate::packet::{FramePacketizer, FrameStats};
use crate::transport::PacketSink;

/// RTP video clock rate in Hz (RFC 3551 §4).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

pub struct AnnexBPacketizer {
    base: BaseMediaPacketizer,
    /// RTP ticks one frame spans: `90000 / fps`.
    ticks_per_frame: u32,
}

impl AnnexBPacketizer {
    pub fn new(
        sink: Arc<dyn PacketSink>,
        cipher: Arc<PacketCipher>,
        ssrc: u32,
        payload_type: u8,
        mtu: usize,
        fps: u32,
    ) -> Result<Self> {
        let base = BaseMediaPacketizer::new(sink, cipher, ssrc, payload_type, mtu)?
            .with_extension(PlayoutDelay::default());
        Ok(Self {
            base,
            ticks_per_frame: VIDEO_CLOCK_RATE / fps.max(1),
        })
    }

    pub fn base_mut(&mut self) -> &mut BaseMediaPacketizer {
        &mut self.base
    }
}

impl FramePacketizer for AnnexBPacketizer {
    fn send_frame(&mut self, frame: &[u8]) -> Result<FrameStats> {
        if frame.is_empty() {
            return Ok(FrameStats::default());
        }

        let chunks = self.base.partition(frame);
        let mut stats = FrameStats::default();
        for (i, chunk) in chunks.iter().enumerate() {
            let marker = i == chunks.len() - 1;
            stats.bytes += self.base.send_chunk(marker, &[], chunk)? as u64;
            stats.packets += 1;
        }

        self.base.advance_timestamp(self.ticks_per_frame);
        self.base.frame_sent(stats.packets, stats.bytes);
        Ok(stats)
    }
}
