//! Integration tests: raw bitstream in, encrypted RTP packets out.
//!
//! Drives the full pipeline (demux → pace → packetize → encrypt) against a
//! recording sink and verifies packet counts, sequencing, marker placement,
//! and clean cancellation at frame boundaries.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use rtpcast::config::{StreamOptions, VideoCodec};
use rtpcast::crypto::{NONCE_TAIL_LEN, PacketCipher, TAG_LEN};
use rtpcast::packet::annexb::AnnexBPacketizer;
use rtpcast::packet::rtp::{EXTENSION_LEN, RTP_HEADER_LEN};
use rtpcast::packet::vp8::Vp8Packetizer;
use rtpcast::stream::{StreamEnd, stream_video};
use rtpcast::{PacketSink, Result};

/// Fixed per-packet overhead around the payload chunk: clear RTP header,
/// encrypted extension block, AEAD tag, and the nonce counter tail.
const PACKET_OVERHEAD: usize = RTP_HEADER_LEN + EXTENSION_LEN + TAG_LEN + NONCE_TAIL_LEN;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Default)]
struct RecordingSink {
    packets: Mutex<Vec<Vec<u8>>>,
}

impl PacketSink for RecordingSink {
    fn send(&self, packet: &[u8]) -> Result<usize> {
        self.packets.lock().push(packet.to_vec());
        Ok(packet.len())
    }
}

fn seq_of(packet: &[u8]) -> u16 {
    u16::from_be_bytes([packet[2], packet[3]])
}

fn marker_of(packet: &[u8]) -> bool {
    packet[1] & 0x80 != 0
}

fn payload_type_of(packet: &[u8]) -> u8 {
    packet[1] & 0x7f
}

fn test_cipher() -> Arc<PacketCipher> {
    Arc::new(PacketCipher::new(&[0x42; 32]).unwrap())
}

/// One coded picture: a start code and a single IDR slice of `size` bytes.
fn idr_frame(size: usize) -> Vec<u8> {
    let mut out = vec![0, 0, 1, 0x65];
    out.extend(std::iter::repeat_n(0xab, size - 1));
    out
}

/// Minimal IVF file: 32-byte header followed by the given frame payloads.
fn ivf_file(frames: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"DKIF");
    out.extend_from_slice(&0u16.to_le_bytes()); // version
    out.extend_from_slice(&32u16.to_le_bytes()); // header size
    out.extend_from_slice(b"VP80");
    out.extend_from_slice(&1280u16.to_le_bytes());
    out.extend_from_slice(&720u16.to_le_bytes());
    out.extend_from_slice(&30u32.to_le_bytes()); // timebase denominator
    out.extend_from_slice(&1u32.to_le_bytes()); // timebase numerator
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for (pts, frame) in frames.iter().enumerate() {
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(&(pts as u64).to_le_bytes());
        out.extend_from_slice(frame);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn h264_stream_fragments_sequences_and_marks_frames() {
    init_tracing();
    let sink = Arc::new(RecordingSink::default());
    let mut packetizer =
        AnnexBPacketizer::new(sink.clone(), test_cipher(), 0x1001, 101, 1200, 30).unwrap();

    // Three access units whose NAL payloads are 10, 5000, and 100 bytes.
    // Serialized with 4-byte length prefixes they span 1, 5, and 1 packets
    // at a 1200-byte MTU.
    let mut input = Vec::new();
    input.extend_from_slice(&idr_frame(10));
    input.extend_from_slice(&idr_frame(5000));
    input.extend_from_slice(&idr_frame(100));

    let cancel = CancellationToken::new();
    let summary = stream_video(
        Cursor::new(input),
        &mut packetizer,
        &StreamOptions::default(),
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(summary.end, StreamEnd::Finished);
    assert_eq!(summary.stats.frames, 3);
    assert_eq!(summary.stats.packets, 7);

    let packets = sink.packets.lock();
    let rtp: Vec<&Vec<u8>> = packets
        .iter()
        .filter(|p| payload_type_of(p) == 101)
        .collect();
    assert_eq!(rtp.len(), 7);

    // Sequence numbers are contiguous across frames.
    let seqs: Vec<u16> = rtp.iter().map(|p| seq_of(p)).collect();
    assert_eq!(seqs, (0..7).collect::<Vec<u16>>());

    // Marker closes each frame: packets 0, 5, and 6.
    for (i, p) in rtp.iter().enumerate() {
        assert_eq!(marker_of(p), matches!(i, 0 | 5 | 6), "packet {i}");
    }

    // Frame 2 fragments as 4 full chunks plus a 204-byte remainder.
    assert_eq!(rtp[0].len(), 14 + PACKET_OVERHEAD);
    for p in &rtp[1..5] {
        assert_eq!(p.len(), 1200 + PACKET_OVERHEAD);
    }
    assert_eq!(rtp[5].len(), 204 + PACKET_OVERHEAD);
    assert_eq!(rtp[6].len(), 104 + PACKET_OVERHEAD);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_cleanly_between_frames() {
    init_tracing();
    let sink = Arc::new(RecordingSink::default());
    let mut packetizer =
        AnnexBPacketizer::new(sink.clone(), test_cipher(), 0x1002, 101, 1200, 50).unwrap();

    // Five frames at 50 fps: deadlines 0, 20, 40, 60, 80 ms.
    let mut input = Vec::new();
    for _ in 0..5 {
        input.extend_from_slice(&idr_frame(200));
    }

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let opts = StreamOptions {
        fps: 50,
        ..StreamOptions::default()
    };
    let task = tokio::spawn(async move {
        stream_video(Cursor::new(input), &mut packetizer, &opts, &task_cancel).await
    });

    // Cancel between the second and third frame deadlines.
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.end, StreamEnd::Cancelled);
    assert_eq!(summary.stats.frames, 2);

    // The two frames that made it out are whole; nothing partial follows.
    let packets = sink.packets.lock();
    assert_eq!(packets.len(), 2);
    for (i, p) in packets.iter().enumerate() {
        assert_eq!(seq_of(p), i as u16);
        assert!(marker_of(p));
        assert_eq!(p.len(), 204 + PACKET_OVERHEAD);
    }
}

#[tokio::test(start_paused = true)]
async fn vp8_stream_from_ivf_container() {
    init_tracing();
    let sink = Arc::new(RecordingSink::default());
    let mut packetizer =
        Vp8Packetizer::new(sink.clone(), test_cipher(), 0x1003, 103, 1200, 30).unwrap();

    let small = vec![0x11u8; 100];
    let large = vec![0x22u8; 3000];
    let input = ivf_file(&[&small, &large]);

    let cancel = CancellationToken::new();
    let opts = StreamOptions {
        video_codec: VideoCodec::Vp8,
        ..StreamOptions::default()
    };
    let summary = stream_video(Cursor::new(input), &mut packetizer, &opts, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.end, StreamEnd::Finished);
    assert_eq!(summary.stats.frames, 2);
    // 100 bytes → 1 packet; 3000 bytes → 3 packets.
    assert_eq!(summary.stats.packets, 4);

    let packets = sink.packets.lock();
    assert!(packets.iter().all(|p| payload_type_of(p) == 103));
    let markers: Vec<bool> = packets.iter().map(|p| marker_of(p)).collect();
    assert_eq!(markers, vec![true, false, false, true]);
}

#[tokio::test(start_paused = true)]
async fn audio_frames_from_channel_are_paced_and_sent() {
    use rtpcast::packet::audio::AudioPacketizer;
    use rtpcast::stream::stream_audio;
    use tokio::sync::mpsc;

    init_tracing();
    let sink = Arc::new(RecordingSink::default());
    let mut packetizer =
        AudioPacketizer::new(sink.clone(), test_cipher(), 0x2001, 120, 1200).unwrap();

    let (tx, rx) = mpsc::channel(8);
    for i in 0..3u8 {
        tx.send(Bytes::from(vec![i; 50])).await.unwrap();
    }
    drop(tx);

    let cancel = CancellationToken::new();
    let summary = stream_audio(rx, &mut packetizer, true, &cancel).await.unwrap();
    assert_eq!(summary.end, StreamEnd::Finished);
    assert_eq!(summary.stats.frames, 3);

    let packets = sink.packets.lock();
    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|p| marker_of(p)));
    // Audio carries no extension block.
    for p in packets.iter() {
        assert_eq!(p.len(), RTP_HEADER_LEN + 50 + TAG_LEN + NONCE_TAIL_LEN);
    }
}
