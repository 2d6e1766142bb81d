//! Opus audio packetizer.
//!
//! One access unit is one Opus frame, and the encoder's frame size is
//! chosen so a frame always fits under the MTU — no fragmentation, one
//! packet per frame, marker bit always set.

use std::sync::Arc;

use crate::crypto::PacketCipher;
use crate::error::Result;
use crate::packet::base::BaseMediaPacketizer;
use crate::packet::{FramePacketizer, FrameStats};
use crate::transport::PacketSink;

/// Opus clock rate in Hz.
pub const OPUS_SAMPLE_RATE: u32 = 48_000;
/// Samples per 20 ms Opus frame at 48 kHz.
pub const OPUS_SAMPLES_PER_FRAME: u32 = 960;

pub struct AudioPacketizer {
    base: BaseMediaPacketizer,
}

impl AudioPacketizer {
    pub fn new(
        sink: Arc<dyn PacketSink>,
        cipher: Arc<PacketCipher>,
        ssrc: u32,
        payload_type: u8,
        mtu: usize,
    ) -> Result<Self> {
        Ok(Self {
            base: BaseMediaPacketizer::new(sink, cipher, ssrc, payload_type, mtu)?,
        })
    }

    pub fn base_mut(&mut self) -> &mut BaseMediaPacketizer {
        &mut self.base
    }
}

impl FramePacketizer for AudioPacketizer {
    fn send_frame(&mut self, frame: &[u8]) -> Result<FrameStats> {
        if frame.is_empty() {
            return Ok(FrameStats::default());
        }
        let bytes = self.base.send_chunk(true, &[], frame)? as u64;
        self.base.advance_timestamp(OPUS_SAMPLES_PER_FRAME);
        let stats = FrameStats { packets: 1, bytes };
        self.base.frame_sent(stats.packets, stats.bytes);
        Ok(stats)
    }
}
