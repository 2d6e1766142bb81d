//! Annex B NAL unit splitter for H.264 and H.265 bitstreams.
//!
//! In an Annex B stream one frame equals one access unit, and an access
//! unit is composed of 1 to n NAL units, each preceded by a 3-byte
//! (`00 00 01`) or 4-byte (`00 00 00 01`) start code. The splitter accepts
//! arbitrarily-chunked input (chunk boundaries carry no meaning), scans for
//! start codes incrementally without re-visiting consumed bytes, and emits
//! one [`AccessUnit`] per frame boundary.
//!
//! Boundary rule: an access unit delimiter flushes the current access unit
//! (and is itself dropped — the encoder inserts AUDs for exactly this
//! purpose). For streams without AUDs, a picture-start-eligible unit (a VCL
//! unit or a parameter set) also flushes once the current access unit
//! already holds a VCL unit. The two codecs share this control flow and
//! differ only in unit-type classification and the emulation-prevention
//! exemptions.

use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};

use super::{AccessUnit, NalUnit};

/// Codec-specific NAL classification policy.
///
/// Implementations are zero-sized tags selected at construction; the
/// splitter's control flow never branches on the codec directly.
pub trait NalCodec {
    /// Codec name for logging.
    const NAME: &'static str;

    /// Extract the unit type from a unit's leading bytes. Returns `None`
    /// when the unit is too short to carry its NAL header — such a unit is
    /// never emitted.
    fn unit_type(unit: &[u8]) -> Option<u8>;

    /// Whether the type carries coded picture data (VCL).
    fn is_vcl(unit_type: u8) -> bool;

    /// Whether the type is an access unit delimiter. Delimiters flush the
    /// pending access unit and are not included in the output.
    fn is_delimiter(unit_type: u8) -> bool;

    /// Whether seeing this type may begin a new access unit (flushes the
    /// pending one when it already contains a VCL unit).
    fn starts_new_access_unit(unit_type: u8) -> bool;

    /// Whether emulation prevention bytes are left in place for this type.
    fn keep_emulation_bytes(unit_type: u8) -> bool;
}

/// H.264 classification: unit type is the low 5 bits of the first byte.
pub struct H264Nal;

/// H.264 NAL unit types (ITU-T H.264 §7.4.1).
pub mod h264_types {
    pub const SLICE_NON_IDR: u8 = 1;
    pub const SLICE_IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;
}

impl NalCodec for H264Nal {
    const NAME: &'static str = "H264";

    fn unit_type(unit: &[u8]) -> Option<u8> {
        unit.first().map(|b| b & 0x1f)
    }

    fn is_vcl(unit_type: u8) -> bool {
        (h264_types::SLICE_NON_IDR..=h264_types::SLICE_IDR).contains(&unit_type)
    }

    fn is_delimiter(unit_type: u8) -> bool {
        unit_type == h264_types::AUD
    }

    fn starts_new_access_unit(unit_type: u8) -> bool {
        Self::is_vcl(unit_type)
            || unit_type == h264_types::SPS
            || unit_type == h264_types::PPS
    }

    fn keep_emulation_bytes(_unit_type: u8) -> bool {
        false
    }
}

/// H.265 classification: unit type is bits 1..6 of the first byte of the
/// 2-byte NAL header.
pub struct H265Nal;

/// H.265 NAL unit types (ITU-T H.265 §7.4.2.2).
pub mod h265_types {
    /// Last VCL type value; 0..=31 are (current or reserved) VCL types.
    pub const VCL_MAX: u8 = 31;
    pub const VPS: u8 = 32;
    pub const SPS: u8 = 33;
    pub const PPS: u8 = 34;
    pub const AUD: u8 = 35;
}

impl NalCodec for H265Nal {
    const NAME: &'static str = "H265";

    fn unit_type(unit: &[u8]) -> Option<u8> {
        if unit.len() < 2 {
            return None;
        }
        Some((unit[0] >> 1) & 0x3f)
    }

    fn is_vcl(unit_type: u8) -> bool {
        unit_type <= h265_types::VCL_MAX
    }

    fn is_delimiter(unit_type: u8) -> bool {
        unit_type == h265_types::AUD
    }

    fn starts_new_access_unit(unit_type: u8) -> bool {
        unit_type <= h265_types::PPS
    }

    /// Parameter sets are forwarded verbatim; the receiver parses them from
    /// the escaped form.
    fn keep_emulation_bytes(unit_type: u8) -> bool {
        matches!(
            unit_type,
            h265_types::VPS | h265_types::SPS | h265_types::PPS
        )
    }
}

/// Incremental Annex B access unit splitter.
///
/// Feed chunks with [`push`](Self::push); each call returns the access
/// units completed by those bytes. Call [`finish`](Self::finish) at end of
/// stream to flush the pending unit and access unit.
pub struct AnnexBSplitter<C: NalCodec> {
    buf: BytesMut,
    /// Next buffer index to examine for a start code. Never moves backward,
    /// so scanning is O(total bytes) amortized.
    scan: usize,
    /// Payload start of the unit currently being accumulated (set once the
    /// first start code has been seen).
    unit_start: Option<usize>,
    current: AccessUnit,
    has_vcl: bool,
    _codec: PhantomData<C>,
}

pub type H264NalSplitter = AnnexBSplitter<H264Nal>;
pub type H265NalSplitter = AnnexBSplitter<H265Nal>;

impl<C: NalCodec> Default for AnnexBSplitter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: NalCodec> AnnexBSplitter<C> {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            scan: 0,
            unit_start: None,
            current: AccessUnit::default(),
            has_vcl: false,
            _codec: PhantomData,
        }
    }

    /// Append a chunk and return the access units it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<AccessUnit> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while self.scan + 2 < self.buf.len() {
            let i = self.scan;
            if self.buf[i] == 0 && self.buf[i + 1] == 0 && self.buf[i + 2] == 1 {
                // A preceding zero belongs to a 4-byte start code, not to
                // the unit payload.
                let floor = self.unit_start.unwrap_or(0);
                let code_start = if i > floor && self.buf[i - 1] == 0 {
                    i - 1
                } else {
                    i
                };
                if let Some(s) = self.unit_start {
                    if code_start > s {
                        let unit = self.buf[s..code_start].to_vec();
                        self.handle_unit(unit, &mut out);
                    }
                }
                self.unit_start = Some(i + 3);
                self.scan = i + 3;
            } else if self.buf[i + 2] > 1 {
                // The third byte can't be part of any start code prefix.
                self.scan = i + 3;
            } else {
                self.scan = i + 1;
            }
        }

        self.compact();
        out
    }

    /// Flush the pending unit and access unit at end of stream.
    ///
    /// A trailing unit too short to carry its NAL header is discarded, not
    /// emitted.
    pub fn finish(&mut self) -> Vec<AccessUnit> {
        let mut out = Vec::new();
        if let Some(s) = self.unit_start.take() {
            if self.buf.len() > s {
                let unit = self.buf[s..].to_vec();
                self.handle_unit(unit, &mut out);
            }
        }
        if !self.current.is_empty() {
            out.push(std::mem::take(&mut self.current));
            self.has_vcl = false;
        }
        self.buf.clear();
        self.scan = 0;
        out
    }

    fn handle_unit(&mut self, unit: Vec<u8>, out: &mut Vec<AccessUnit>) {
        let Some(unit_type) = C::unit_type(&unit) else {
            // Start code seen but the NAL header hasn't arrived; skip.
            return;
        };

        if C::is_delimiter(unit_type) {
            self.flush_into(out);
            return;
        }
        if C::starts_new_access_unit(unit_type) && self.has_vcl {
            self.flush_into(out);
        }

        let payload = if C::keep_emulation_bytes(unit_type) {
            Bytes::from(unit)
        } else {
            strip_emulation_prevention(&unit)
        };

        if C::is_vcl(unit_type) {
            self.has_vcl = true;
        }
        tracing::trace!(
            codec = C::NAME,
            unit_type,
            len = payload.len(),
            "NAL unit accumulated"
        );
        self.current.units.push(NalUnit { unit_type, payload });
    }

    fn flush_into(&mut self, out: &mut Vec<AccessUnit>) {
        if !self.current.is_empty() {
            tracing::trace!(
                codec = C::NAME,
                units = self.current.units.len(),
                bytes = self.current.payload_len(),
                "access unit complete"
            );
            out.push(std::mem::take(&mut self.current));
        }
        self.has_vcl = false;
    }

    /// Drop consumed bytes so the buffer holds at most the unit in
    /// progress (plus a 3-byte tail that may begin a start code).
    fn compact(&mut self) {
        let keep_from = match self.unit_start {
            Some(s) => s,
            None => self.scan.min(self.buf.len().saturating_sub(3)),
        };
        if keep_from > 0 {
            let _ = self.buf.split_to(keep_from);
            if let Some(s) = &mut self.unit_start {
                *s -= keep_from;
            }
            self.scan -= keep_from;
        }
    }
}

/// Remove emulation prevention bytes from a NAL unit.
///
/// The escape sequence `00 00 03` followed by a byte in `{00, 01, 02, 03}`
/// collapses by deleting the `03`; anything else is left untouched.
pub fn strip_emulation_prevention(unit: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(unit.len());
    let mut i = 0;
    while i < unit.len() {
        if i + 3 < unit.len()
            && unit[i] == 0
            && unit[i + 1] == 0
            && unit[i + 2] == 3
            && unit[i + 3] <= 3
        {
            out.put_slice(&unit[i..i + 2]);
            i += 3;
        } else {
            out.put_u8(unit[i]);
            i += 1;
        }
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0x67, 0x42, 0x00, 0x1e];
    const PPS: &[u8] = &[0x68, 0xce, 0x38, 0x80];
    const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21, 0xff];
    const AUD: &[u8] = &[0x09, 0xf0];

    fn annexb(units: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for u in units {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(u);
        }
        out
    }

    fn split_all(stream: &[u8], chunk_size: usize) -> Vec<AccessUnit> {
        let mut splitter = H264NalSplitter::new();
        let mut out = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            out.extend(splitter.push(chunk));
        }
        out.extend(splitter.finish());
        out
    }

    // --- Emulation prevention removal ---

    #[test]
    fn epb_guarded_one_collapses() {
        assert_eq!(
            strip_emulation_prevention(&[0x00, 0x00, 0x03, 0x01]).as_ref(),
            &[0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn epb_guarded_three_collapses() {
        assert_eq!(
            strip_emulation_prevention(&[0x00, 0x00, 0x03, 0x03]).as_ref(),
            &[0x00, 0x00, 0x03]
        );
    }

    #[test]
    fn epb_non_matching_untouched() {
        assert_eq!(
            strip_emulation_prevention(&[0x00, 0x00, 0x03, 0x04]).as_ref(),
            &[0x00, 0x00, 0x03, 0x04]
        );
        assert_eq!(
            strip_emulation_prevention(&[0x01, 0x00, 0x03, 0x00]).as_ref(),
            &[0x01, 0x00, 0x03, 0x00]
        );
    }

    #[test]
    fn epb_consecutive_escapes() {
        assert_eq!(
            strip_emulation_prevention(&[0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01]).as_ref(),
            &[0x00, 0x00, 0x00, 0x00, 0x01]
        );
    }

    // --- Access unit splitting ---

    #[test]
    fn single_access_unit_any_chunking() {
        let stream = annexb(&[SPS, PPS, IDR]);
        let whole = split_all(&stream, stream.len());
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].units.len(), 3);
        assert_eq!(whole[0].units[0].unit_type, h264_types::SPS);
        assert_eq!(whole[0].units[2].payload.as_ref(), IDR);

        for chunk_size in 1..stream.len() {
            assert_eq!(
                split_all(&stream, chunk_size),
                whole,
                "chunk_size {chunk_size} changed the result"
            );
        }
    }

    #[test]
    fn aud_flushes_and_is_dropped() {
        let mut stream = annexb(&[SPS, PPS, IDR]);
        stream.extend_from_slice(&annexb(&[AUD, IDR]));
        let aus = split_all(&stream, stream.len());
        assert_eq!(aus.len(), 2);
        assert!(aus[0].units.iter().all(|u| u.unit_type != h264_types::AUD));
        assert!(aus[1].units.iter().all(|u| u.unit_type != h264_types::AUD));
        assert_eq!(aus[1].units.len(), 1);
    }

    #[test]
    fn sps_after_vcl_starts_new_access_unit() {
        let stream = annexb(&[SPS, IDR, SPS, IDR]);
        let aus = split_all(&stream, stream.len());
        assert_eq!(aus.len(), 2);
        assert_eq!(aus[0].units.len(), 2);
        assert_eq!(aus[1].units.len(), 2);
    }

    #[test]
    fn mixed_start_code_lengths() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0, 0, 1]);
        stream.extend_from_slice(SPS);
        stream.extend_from_slice(&[0, 0, 0, 1]);
        stream.extend_from_slice(IDR);
        let aus = split_all(&stream, 2);
        assert_eq!(aus.len(), 1);
        assert_eq!(aus[0].units[0].payload.as_ref(), SPS);
        assert_eq!(aus[0].units[1].payload.as_ref(), IDR);
    }

    #[test]
    fn start_code_split_across_chunks() {
        let stream = annexb(&[SPS, IDR]);
        // Split right inside the second start code.
        let cut = 4 + SPS.len() + 2;
        let mut splitter = H264NalSplitter::new();
        let mut out = splitter.push(&stream[..cut]);
        out.extend(splitter.push(&stream[cut..]));
        out.extend(splitter.finish());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].units.len(), 2);
    }

    #[test]
    fn trailing_start_code_without_header_not_emitted() {
        let mut stream = annexb(&[IDR]);
        stream.extend_from_slice(&[0, 0, 0, 1]);
        let mut splitter = H264NalSplitter::new();
        let mut out = splitter.push(&stream);
        out.extend(splitter.finish());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].units.len(), 1);
    }

    #[test]
    fn garbage_before_first_start_code_ignored() {
        let mut stream = vec![0xde, 0xad, 0xbe, 0xef];
        stream.extend_from_slice(&annexb(&[IDR]));
        let aus = split_all(&stream, 3);
        assert_eq!(aus.len(), 1);
        assert_eq!(aus[0].units[0].payload.as_ref(), IDR);
    }

    #[test]
    fn no_output_until_boundary_observed() {
        let mut splitter = H264NalSplitter::new();
        assert!(splitter.push(&[0, 0, 0, 1, 0x65, 0x88]).is_empty());
        // The IDR is still pending; only the next boundary or EOF emits it.
        assert!(splitter.push(&[0x84, 0x21]).is_empty());
        let out = splitter.finish();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].units[0].payload.as_ref(), &[0x65, 0x88, 0x84, 0x21]);
    }

    #[test]
    fn epb_removed_within_unit_payload() {
        let unit = [0x65, 0x00, 0x00, 0x03, 0x01, 0x42];
        let stream = annexb(&[&unit]);
        let aus = split_all(&stream, stream.len());
        assert_eq!(aus[0].units[0].payload.as_ref(), &[0x65, 0x00, 0x00, 0x01, 0x42]);
    }

    // --- H.265 ---

    const H265_VPS: &[u8] = &[0x40, 0x01, 0x0c, 0x00, 0x00, 0x03, 0x00];
    const H265_IDR: &[u8] = &[0x26, 0x01, 0xaf, 0x1d];

    #[test]
    fn h265_unit_type_from_two_byte_header() {
        assert_eq!(H265Nal::unit_type(H265_VPS), Some(h265_types::VPS));
        assert_eq!(H265Nal::unit_type(H265_IDR), Some(19));
        assert!(H265Nal::is_vcl(19));
        assert_eq!(H265Nal::unit_type(&[0x40]), None);
    }

    #[test]
    fn h265_parameter_sets_keep_emulation_bytes() {
        let stream = annexb(&[H265_VPS, H265_IDR]);
        let mut splitter = H265NalSplitter::new();
        let mut out = splitter.push(&stream);
        out.extend(splitter.finish());
        assert_eq!(out.len(), 1);
        // VPS exempt: the 00 00 03 00 sequence survives.
        assert_eq!(out[0].units[0].payload.as_ref(), H265_VPS);
    }

    #[test]
    fn h265_aud_flushes() {
        let aud = [0x46, 0x01, 0x50];
        let mut stream = annexb(&[H265_IDR]);
        stream.extend_from_slice(&annexb(&[&aud, H265_IDR]));
        let mut splitter = H265NalSplitter::new();
        let mut out = splitter.push(&stream);
        out.extend(splitter.finish());
        assert_eq!(out.len(), 2);
    }
}
