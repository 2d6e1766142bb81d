//! RTP fixed header, header extension, and RTCP Sender Report builders.

use std::time::{SystemTime, UNIX_EPOCH};

/// Generic RTP fixed header builder (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// This struct is shared by all codec packetizers. It manages:
/// - **Sequence number**: 16-bit, wrapping — incremented on every packet,
///   across all packet types sharing one SSRC.
/// - **Timestamp**: 32-bit, wrapping — advanced once per access unit by the
///   codec clock ticks per frame, never per packet.
/// - **SSRC**: assigned by the signaling layer at connection setup.
///
/// Version is always 2. Padding and CSRC count are always 0. The extension
/// bit reflects whether the playout-delay extension is attached.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    /// Synchronization source identifier.
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

/// Length of the fixed RTP header.
pub const RTP_HEADER_LEN: usize = 12;

impl RtpHeader {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        tracing::debug!(
            payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            payload_type,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Current sequence number (assigned to the next [`write`](Self::write)).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Current timestamp.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence number.
    ///
    /// The `marker` bit signals the last packet of a frame; `extension`
    /// announces an extension block at the start of the payload.
    pub fn write(&mut self, marker: bool, extension: bool) -> [u8; RTP_HEADER_LEN] {
        let first_byte: u8 = (2 << 6) | ((extension as u8) << 4);
        let second_byte: u8 = ((marker as u8) << 7) | self.payload_type;

        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Advance the RTP timestamp by the given increment.
    ///
    /// For video at 90 kHz clock rate, the increment per frame is
    /// `90000 / fps` (e.g. 3000 for 30 fps). For 48 kHz Opus with 20 ms
    /// frames it is 960 samples.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

/// Playout-delay header extension (WebRTC `playout-delay` RTP header
/// extension, one-byte-header form per RFC 5285).
///
/// Advertises the receiver-side delay bounds in 10 ms units, packed as two
/// 12-bit fields in a 3-byte payload:
///
/// ```text
/// 0xBE 0xDE | len=1 word | ID=5, L=2 | min (12 bits) | max (12 bits)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlayoutDelay {
    /// Minimum playout delay in 10 ms units (12-bit).
    pub min: u16,
    /// Maximum playout delay in 10 ms units (12-bit).
    pub max: u16,
}

/// Extension element ID used for playout-delay.
const PLAYOUT_DELAY_EXT_ID: u8 = 5;
/// Serialized extension block length (fixed: one 32-bit word of data).
pub const EXTENSION_LEN: usize = 8;

impl Default for PlayoutDelay {
    fn default() -> Self {
        Self { min: 0, max: 0 }
    }
}

impl PlayoutDelay {
    /// Serialize the full extension block (profile, length, element).
    pub fn write(&self) -> [u8; EXTENSION_LEN] {
        let min = self.min & 0x0fff;
        let max = self.max & 0x0fff;
        [
            0xbe,
            0xde,
            0x00,
            0x01,
            (PLAYOUT_DELAY_EXT_ID << 4) | 0x02,
            (min >> 4) as u8,
            (((min & 0x0f) << 4) as u8) | (max >> 8) as u8,
            (max & 0xff) as u8,
        ]
    }
}

/// RTCP Sender Report (RFC 3550 §6.4.1), minimal sender-info-only form.
///
/// The 8-byte RTCP header stays in the clear; the 20-byte sender info block
/// is encrypted like any media payload. Counters are cumulative since
/// stream start and are never reset between reports.
#[derive(Debug, Clone, Copy)]
pub struct SenderReport {
    pub ssrc: u32,
    /// NTP-format wall-clock time (seconds since 1900, 32.32 fixed point).
    pub ntp_timestamp: u64,
    /// RTP timestamp corresponding to the NTP time.
    pub rtp_timestamp: u32,
    /// Cumulative packets sent since stream start.
    pub packet_count: u32,
    /// Cumulative payload bytes sent since stream start.
    pub octet_count: u32,
}

/// RTCP packet type for Sender Reports.
pub const RTCP_PT_SENDER_REPORT: u8 = 200;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

impl SenderReport {
    /// Capture a report from the current wall clock and cumulative counters.
    pub fn capture(ssrc: u32, rtp_timestamp: u32, packet_count: u32, octet_count: u32) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let ntp_secs = now.as_secs() + NTP_UNIX_OFFSET_SECS;
        let ntp_frac = ((now.subsec_nanos() as u64) << 32) / 1_000_000_000;
        Self {
            ssrc,
            ntp_timestamp: (ntp_secs << 32) | ntp_frac,
            rtp_timestamp,
            packet_count,
            octet_count,
        }
    }

    /// Serialize into (clear header, sender info to be encrypted).
    ///
    /// `total_len` of the final packet on the wire must be supplied so the
    /// RTCP length field (in 32-bit words minus one) covers the encryption
    /// overhead appended after the sender info.
    pub fn write(&self, total_len: usize) -> ([u8; 8], [u8; 20]) {
        debug_assert_eq!(total_len % 4, 0, "RTCP packets are word-aligned");
        let words = (total_len / 4 - 1) as u16;

        let mut header = [0u8; 8];
        header[0] = 2 << 6; // V=2, P=0, RC=0
        header[1] = RTCP_PT_SENDER_REPORT;
        header[2..4].copy_from_slice(&words.to_be_bytes());
        header[4..8].copy_from_slice(&self.ssrc.to_be_bytes());

        let mut info = [0u8; 20];
        info[0..8].copy_from_slice(&self.ntp_timestamp.to_be_bytes());
        info[8..12].copy_from_slice(&self.rtp_timestamp.to_be_bytes());
        info[12..16].copy_from_slice(&self.packet_count.to_be_bytes());
        info[16..20].copy_from_slice(&self.octet_count.to_be_bytes());

        (header, info)
    }
}
