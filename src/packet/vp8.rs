//! VP8 video packetizer (RFC 7741 payload format).
//!
//! Every packet of a frame carries the VP8 payload descriptor; the
//! start-of-partition bit is set only on the first packet, and the picture
//! ID increments once per frame — never per packet — wrapping at the
//! configured bit width.
//!
//! ```text
//! descriptor byte 0: |X|R|N|S|R| PID |   X=1 (extension), S=start of partition
//! descriptor byte 1: |I|L|T|K| RSV  |   I=1 (picture ID present)
//! picture id:        7-bit, or 15-bit with the top bit set (M convention)
//! ```

use std::sync::Arc;

use crate::crypto::PacketCipher;
use crate::error::Result;
use crate::packet::annexb::VIDEO_CLOCK_RATE;
use crate::packet::base::BaseMediaPacketizer;
use crate::packet::rtp::PlayoutDelay;
use crate::packet::{FramePacketizer, FrameStats};
use crate::transport::PacketSink;

/// Picture ID field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureIdWidth {
    /// 7-bit picture ID, wraps at 128.
    Short,
    /// 15-bit picture ID (top bit of the first byte set), wraps at 32768.
    Wide,
}

pub struct Vp8Packetizer {
    base: BaseMediaPacketizer,
    ticks_per_frame: u32,
    picture_id: u16,
    id_width: PictureIdWidth,
}

impl Vp8Packetizer {
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
            picture_id: 0,
            id_width: PictureIdWidth::Wide,
        })
    }

    pub fn with_picture_id_width(mut self, width: PictureIdWidth) -> Self {
        self.id_width = width;
        self
    }

    pub fn base_mut(&mut self) -> &mut BaseMediaPacketizer {
        &mut self.base
    }

    pub fn picture_id(&self) -> u16 {
        self.picture_id
    }

    /// Payload descriptor prepended to each chunk of the current frame.
    fn descriptor(&self, first_chunk: bool) -> Vec<u8> {
        let mut d = Vec::with_capacity(4);
        // X always set (picture ID extension present); S on partition start.
        d.push(0x80 | if first_chunk { 0x10 } else { 0x00 });
        // I: picture ID present.
        d.push(0x80);
        match self.id_width {
            PictureIdWidth::Short => d.push((self.picture_id & 0x7f) as u8),
            PictureIdWidth::Wide => {
                d.extend_from_slice(&(0x8000 | (self.picture_id & 0x7fff)).to_be_bytes())
            }
        }
        d
    }

    fn increment_picture_id(&mut self) {
        let mask = match self.id_width {
            PictureIdWidth::Short => 0x7f,
            PictureIdWidth::Wide => 0x7fff,
        };
        self.picture_id = self.picture_id.wrapping_add(1) & mask;
    }
}

impl FramePacketizer for Vp8Packetizer {
    fn send_frame(&mut self, frame: &[u8]) -> Result<FrameStats> {
        if frame.is_empty() {
            return Ok(FrameStats::default());
        }

        let chunks = self.base.partition(frame);
        let mut stats = FrameStats::default();
        for (i, chunk) in chunks.iter().enumerate() {
            let descriptor = self.descriptor(i == 0);
            let marker = i == chunks.len() - 1;
            stats.bytes += self.base.send_chunk(marker, &descriptor, chunk)? as u64;
            stats.packets += 1;
        }

        self.increment_picture_id();
        self.base.advance_timestamp(self.ticks_per_frame);
        self.base.frame_sent(stats.packets, stats.bytes);
        Ok(stats)
    }
}
