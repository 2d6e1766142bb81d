//! Bitstream demultiplexers.
//!
//! An external encoder produces one continuous byte stream per media track.
//! The demuxers here reassemble that stream into discrete frames regardless
//! of how the bytes were chunked in transit:
//!
//! - [`annexb`]: H.264/H.265 Annex B bitstreams → [`AccessUnit`]s, one per
//!   coded picture.
//! - [`ivf`]: IVF container → [`ivf::IvfFrame`]s, one per record.
//!
//! Both keep an internal accumulation buffer and never treat a short read
//! as an error — a truncated unit simply waits for more bytes.

pub mod annexb;
pub mod ivf;

use bytes::{BufMut, Bytes, BytesMut};

/// One NAL unit extracted from an Annex B stream.
///
/// The payload excludes the start code. Emulation prevention bytes have
/// been removed unless the codec exempts the unit type (see
/// [`annexb::NalCodec::keep_emulation_bytes`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// Codec-specific unit type discriminant (5 bits for H.264, 6 for H.265).
    pub unit_type: u8,
    pub payload: Bytes,
}

/// The set of NAL units forming exactly one decodable frame.
///
/// Unit order is preserved from the source bitstream. An access unit is
/// only emitted once its boundary is observed (the start of the next unit,
/// or end of stream).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessUnit {
    pub units: Vec<NalUnit>,
}

impl AccessUnit {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Total payload bytes across all units.
    pub fn payload_len(&self) -> usize {
        self.units.iter().map(|u| u.payload.len()).sum()
    }

    /// Serialize into the length-delimited blob the video packetizer
    /// consumes: for each unit, a 4-byte big-endian length followed by the
    /// unit payload.
    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.payload_len() + 4 * self.units.len());
        for unit in &self.units {
            out.put_u32(unit.payload.len() as u32);
            out.put_slice(&unit.payload);
        }
        out.freeze()
    }
}
