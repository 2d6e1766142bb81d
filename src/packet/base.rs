//! Shared packetizer machinery: sequencing, partitioning, encryption,
//! Sender Report cadence, and send accounting.

use std::sync::Arc;

use crate::crypto::{NONCE_TAIL_LEN, PacketCipher, TAG_LEN};
use crate::error::{Result, StreamError};
use crate::packet::rtp::{PlayoutDelay, RTP_HEADER_LEN, RtpHeader, SenderReport};
use crate::transport::PacketSink;

/// Default number of media packets between RTCP Sender Reports.
pub const DEFAULT_SR_INTERVAL: u64 = 512;

/// Accounting hook invoked after each frame: (packets sent, wire bytes).
pub type FrameSentHook = Box<dyn FnMut(u32, u64) + Send>;

/// Protocol state and shared send path for one media stream.
///
/// Owns the sequence counter, timestamp accumulator, cumulative packet and
/// byte counters, and the SSRC — exclusively, for the lifetime of the
/// stream. Concurrent audio+video use two independent instances (one per
/// SSRC) that share only the [`PacketCipher`] so AEAD nonces stay unique
/// per key.
///
/// Wire layout of every media packet:
///
/// ```text
/// | 12-byte RTP header (clear, AEAD-bound) |
/// | ciphertext( extension? || codec prefix? || chunk ) + 16-byte tag |
/// | 4-byte nonce counter |
/// ```
pub struct BaseMediaPacketizer {
    header: RtpHeader,
    sink: Arc<dyn PacketSink>,
    cipher: Arc<PacketCipher>,
    mtu: usize,
    extension: Option<PlayoutDelay>,
    sr_interval: u64,
    total_packets: u64,
    total_bytes: u64,
    packets_at_last_sr: u64,
    on_frame_sent: Option<FrameSentHook>,
}

impl BaseMediaPacketizer {
    /// Build the shared packetizer state.
    ///
    /// Fails fast with [`StreamError::SsrcUnset`] when the SSRC is zero —
    /// the signaling layer has not assigned one yet, and packets with a
    /// zero source id would be indistinguishable on the channel.
    pub fn new(
        sink: Arc<dyn PacketSink>,
        cipher: Arc<PacketCipher>,
        ssrc: u32,
        payload_type: u8,
        mtu: usize,
    ) -> Result<Self> {
        if ssrc == 0 {
            return Err(StreamError::SsrcUnset);
        }
        Ok(Self {
            header: RtpHeader::new(payload_type, ssrc),
            sink,
            cipher,
            mtu,
            extension: None,
            sr_interval: DEFAULT_SR_INTERVAL,
            total_packets: 0,
            total_bytes: 0,
            packets_at_last_sr: 0,
            on_frame_sent: None,
        })
    }

    /// Attach the playout-delay extension to every packet.
    pub fn with_extension(mut self, extension: PlayoutDelay) -> Self {
        self.extension = Some(extension);
        self
    }

    /// The interval (number of media packets) between two consecutive
    /// RTCP Sender Report packets.
    pub fn set_sr_interval(&mut self, interval: u64) {
        self.sr_interval = interval.max(1);
    }

    /// Register the accounting hook called after each frame.
    pub fn set_frame_sent_hook(&mut self, hook: FrameSentHook) {
        self.on_frame_sent = Some(hook);
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp()
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Partition a frame's serialized bytes into MTU-bounded chunks,
    /// order preserved. Empty input yields no chunks.
    pub fn partition<'a>(&self, data: &'a [u8]) -> Vec<&'a [u8]> {
        data.chunks(self.mtu).collect()
    }

    /// Advance the RTP timestamp — exactly once per access unit, by the
    /// codec clock ticks that one frame spans.
    pub fn advance_timestamp(&mut self, ticks: u32) {
        self.header.advance_timestamp(ticks);
    }

    /// Assemble, encrypt, and send one packet carrying `chunk`.
    ///
    /// `codec_prefix` is the codec-specific annotation (e.g. the VP8
    /// payload descriptor), placed between the extension block and the
    /// chunk inside the encrypted region. Returns wire bytes sent.
    pub fn send_chunk(&mut self, marker: bool, codec_prefix: &[u8], chunk: &[u8]) -> Result<usize> {
        let header = self.header.write(marker, self.extension.is_some());

        let ext = self.extension.map(|e| e.write());
        let ext_len = ext.as_ref().map_or(0, |e| e.len());
        let mut plaintext = Vec::with_capacity(ext_len + codec_prefix.len() + chunk.len());
        if let Some(ext) = &ext {
            plaintext.extend_from_slice(ext);
        }
        plaintext.extend_from_slice(codec_prefix);
        plaintext.extend_from_slice(chunk);

        let (ciphertext, nonce_tail) = self.cipher.encrypt(&header, &plaintext)?;

        let mut packet =
            Vec::with_capacity(RTP_HEADER_LEN + ciphertext.len() + NONCE_TAIL_LEN);
        packet.extend_from_slice(&header);
        packet.extend_from_slice(&ciphertext);
        packet.extend_from_slice(&nonce_tail);

        let sent = self.sink.send(&packet)?;
        self.total_packets += 1;
        self.total_bytes += packet.len() as u64;
        self.maybe_send_sender_report()?;
        Ok(sent)
    }

    /// Report a completed frame to the accounting hook.
    pub fn frame_sent(&mut self, packets: u32, bytes: u64) {
        tracing::trace!(
            ssrc = self.header.ssrc,
            packets,
            bytes,
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "frame sent"
        );
        if let Some(hook) = &mut self.on_frame_sent {
            hook(packets, bytes);
        }
    }

    /// Emit an RTCP Sender Report once enough media packets have gone out.
    ///
    /// Counters are cumulative since stream start — never reset between
    /// reports. The report shares the channel with media packets but does
    /// not consume an RTP sequence number and is not counted as a media
    /// packet.
    fn maybe_send_sender_report(&mut self) -> Result<()> {
        if self.total_packets - self.packets_at_last_sr < self.sr_interval {
            return Ok(());
        }
        self.packets_at_last_sr = self.total_packets;

        let report = SenderReport::capture(
            self.header.ssrc,
            self.header.timestamp(),
            self.total_packets as u32,
            self.total_bytes as u32,
        );
        // 8-byte clear header + encrypted 20-byte sender info.
        let total_len = 8 + 20 + TAG_LEN + NONCE_TAIL_LEN;
        let (rtcp_header, sender_info) = report.write(total_len);
        let (ciphertext, nonce_tail) = self.cipher.encrypt(&rtcp_header, &sender_info)?;

        let mut packet = Vec::with_capacity(total_len);
        packet.extend_from_slice(&rtcp_header);
        packet.extend_from_slice(&ciphertext);
        packet.extend_from_slice(&nonce_tail);
        self.sink.send(&packet)?;

        tracing::debug!(
            ssrc = self.header.ssrc,
            packets = self.total_packets,
            bytes = self.total_bytes,
            "sender report emitted"
        );
        Ok(())
    }

}
