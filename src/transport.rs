//! Datagram transport boundary.
//!
//! The pipeline's only downstream obligation is "send this byte buffer
//! now" on a connected, unreliable datagram channel. Connection lifecycle,
//! address discovery, and key negotiation all happen upstream; this module
//! receives their results once at stream start and never mutates them.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::config::{StreamOptions, VideoCodec};
use crate::crypto::PacketCipher;
use crate::error::{Result, StreamError};
use crate::packet::annexb::AnnexBPacketizer;
use crate::packet::audio::AudioPacketizer;
use crate::packet::vp8::Vp8Packetizer;
use crate::packet::{
    FramePacketizer, H264_PAYLOAD_TYPE, H265_PAYLOAD_TYPE, OPUS_PAYLOAD_TYPE, VP8_PAYLOAD_TYPE,
};
use crate::stream::StatsHandle;

/// A connected datagram channel that accepts fully formed packets.
///
/// Implementations must be cheap to call from the packetizer's send path —
/// one call per packet.
pub trait PacketSink: Send + Sync {
    /// Place one packet on the channel. Returns bytes sent.
    fn send(&self, packet: &[u8]) -> Result<usize>;
}

/// UDP implementation of [`PacketSink`].
///
/// Binds an ephemeral socket and connects it to the negotiated remote, so
/// the send path is a plain `send` with no per-packet addressing.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn connect(remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(remote)?;
        tracing::info!(%remote, "media transport connected");
        Ok(Self { socket })
    }
}

impl PacketSink for UdpTransport {
    fn send(&self, packet: &[u8]) -> Result<usize> {
        Ok(self.socket.send(packet)?)
    }
}

/// Session parameters negotiated by the signaling layer.
///
/// Supplied once at connection setup; immutable for the stream's lifetime.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub audio_ssrc: u32,
    pub video_ssrc: u32,
    pub audio_payload_type: u8,
    /// Payload type for the negotiated video codec.
    pub video_payload_type: u8,
}

impl SessionParams {
    /// Conventional payload types for a codec pair.
    pub fn with_default_payload_types(audio_ssrc: u32, video_ssrc: u32, codec: VideoCodec) -> Self {
        let video_payload_type = match codec {
            VideoCodec::H264 => H264_PAYLOAD_TYPE,
            VideoCodec::H265 => H265_PAYLOAD_TYPE,
            VideoCodec::Vp8 => VP8_PAYLOAD_TYPE,
        };
        Self {
            audio_ssrc,
            video_ssrc,
            audio_payload_type: OPUS_PAYLOAD_TYPE,
            video_payload_type,
        }
    }
}

/// One media connection: sink + cipher + negotiated session parameters.
///
/// Builds the per-stream packetizers. Audio and video packetizers own
/// independent counters and SSRCs but share the connection's cipher so
/// AEAD nonces stay unique for the key. Every packetizer reports into the
/// connection's [`StatsHandle`].
pub struct MediaConnection {
    sink: Arc<dyn PacketSink>,
    cipher: Arc<PacketCipher>,
    params: SessionParams,
    stats: StatsHandle,
}

impl MediaConnection {
    /// Assemble a connection from a sink and a 32-byte session key.
    pub fn new(sink: Arc<dyn PacketSink>, key: &[u8], params: SessionParams) -> Result<Self> {
        Ok(Self {
            sink,
            cipher: Arc::new(PacketCipher::new(key)?),
            params,
            stats: StatsHandle::new(),
        })
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Live totals across all packetizers built from this connection.
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn audio_packetizer(&self, opts: &StreamOptions) -> Result<AudioPacketizer> {
        let mut packetizer = AudioPacketizer::new(
            self.sink.clone(),
            self.cipher.clone(),
            self.params.audio_ssrc,
            self.params.audio_payload_type,
            opts.mtu,
        )?;
        packetizer.base_mut().set_sr_interval(opts.sr_interval);
        packetizer.base_mut().set_frame_sent_hook(self.stats.hook());
        Ok(packetizer)
    }

    /// Build the packetizer matching the negotiated video codec.
    pub fn video_packetizer(&self, opts: &StreamOptions) -> Result<Box<dyn FramePacketizer>> {
        let ssrc = self.params.video_ssrc;
        let pt = self.params.video_payload_type;
        let packetizer: Box<dyn FramePacketizer> = match opts.video_codec {
            VideoCodec::H264 | VideoCodec::H265 => {
                let mut p = AnnexBPacketizer::new(
                    self.sink.clone(),
                    self.cipher.clone(),
                    ssrc,
                    pt,
                    opts.mtu,
                    opts.fps,
                )?;
                p.base_mut().set_sr_interval(opts.sr_interval);
                p.base_mut().set_frame_sent_hook(self.stats.hook());
                Box::new(p)
            }
            VideoCodec::Vp8 => {
                let mut p = Vp8Packetizer::new(
                    self.sink.clone(),
                    self.cipher.clone(),
                    ssrc,
                    pt,
                    opts.mtu,
                    opts.fps,
                )?;
                p.base_mut().set_sr_interval(opts.sr_interval);
                p.base_mut().set_frame_sent_hook(self.stats.hook());
                Box::new(p)
            }
        };
        Ok(packetizer)
    }

    /// Fail fast when the negotiated parameters cannot produce packets.
    pub fn validate(&self) -> Result<()> {
        if self.params.audio_ssrc == 0 && self.params.video_ssrc == 0 {
            return Err(StreamError::SsrcUnset);
        }
        Ok(())
    }
}
