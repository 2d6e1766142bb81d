pub mod config;
pub mod control;
pub mod crypto;
pub mod demux;
pub mod error;
pub mod pace;
pub mod packet;
pub mod stream;
pub mod transport;

pub use config::{StreamOptions, VideoCodec, normalize_video_codec};
pub use error::{Result, StreamError};
pub use packet::FramePacketizer;
pub use stream::{StatsHandle, StreamEnd, StreamSummary, stream_audio, stream_video};
pub use transport::{MediaConnection, PacketSink, SessionParams, UdpTransport};
