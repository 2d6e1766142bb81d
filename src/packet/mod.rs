//! RTP packetization.
//!
//! This module converts producer-decoded frames into encrypted, sequenced,
//! timestamped RTP packets, with periodic RTCP Sender Reports interleaved
//! on the same channel.
//!
//! [`BaseMediaPacketizer`](base::BaseMediaPacketizer) owns the shared
//! protocol machinery — sequencing, timestamping, MTU partitioning, header
//! assembly, encryption, Sender Report cadence, and accounting. The codec
//! fronts implement [`FramePacketizer`] and differ only in how a frame is
//! serialized and how chunks are annotated:
//!
//! | Codec | Module | Frame input | Per-chunk annotation |
//! |-------|--------|-------------|----------------------|
//! | Opus  | [`audio`] | one Opus frame | none (fits the MTU by construction) |
//! | H.264/H.265 | [`annexb`] | length-delimited access unit blob | none |
//! | VP8   | [`vp8`] | IVF frame payload | RFC 7741 payload descriptor |

pub mod annexb;
pub mod audio;
pub mod base;
pub mod rtp;
pub mod vp8;

use crate::error::Result;

/// Default RTP payload type for Opus audio.
pub const OPUS_PAYLOAD_TYPE: u8 = 120;
/// Default RTP payload type for H.264 video.
pub const H264_PAYLOAD_TYPE: u8 = 101;
/// Default RTP payload type for H.265 video.
pub const H265_PAYLOAD_TYPE: u8 = 102;
/// Default RTP payload type for VP8 video.
pub const VP8_PAYLOAD_TYPE: u8 = 103;

/// What one frame cost on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// RTP packets sent for this frame.
    pub packets: u32,
    /// Total wire bytes sent for this frame (headers included).
    pub bytes: u64,
}

/// Codec-specific packetizer front.
///
/// One instance owns the mutable protocol state for one media stream; it
/// must never be shared between concurrent streams. `send_frame` consumes
/// exactly one frame (access unit), emits all of its packets in chunk
/// order, and advances the timestamp once.
pub trait FramePacketizer: Send {
    fn send_frame(&mut self, frame: &[u8]) -> Result<FrameStats>;
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::crypto::PacketCipher;
    use crate::error::Result;
    use crate::transport::PacketSink;

    pub const TEST_KEY: [u8; 32] = [0x42; 32];

    /// Sink that records every packet it is handed.
    #[derive(Default)]
    pub struct RecordingSink {
        pub packets: Mutex<Vec<Vec<u8>>>,
    }

    impl PacketSink for RecordingSink {
        fn send(&self, packet: &[u8]) -> Result<usize> {
            self.packets.lock().push(packet.to_vec());
            Ok(packet.len())
        }
    }

    pub fn recording_sink() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::default())
    }

    pub fn test_cipher() -> Arc<PacketCipher> {
        Arc::new(PacketCipher::new(&TEST_KEY).unwrap())
    }

    /// Sequence number from a raw RTP packet.
    pub fn seq_of(packet: &[u8]) -> u16 {
        u16::from_be_bytes([packet[2], packet[3]])
    }

    /// Timestamp from a raw RTP packet.
    pub fn ts_of(packet: &[u8]) -> u32 {
        u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]])
    }

    pub fn marker_of(packet: &[u8]) -> bool {
        packet[1] & 0x80 != 0
    }

    pub fn payload_type_of(packet: &[u8]) -> u8 {
        packet[1] & 0x7f
    }
}
