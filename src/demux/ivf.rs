//! IVF container demuxer.
//!
//! IVF frames raw VP8/VP9 with a 32-byte file header followed by repeating
//! records: a 12-byte record header (u32 LE payload size, u64 LE
//! presentation timestamp) and the payload. The demuxer validates the
//! `DKIF` magic once at setup (fatal on mismatch) and then buffers partial
//! records across arbitrarily-chunked input, same incremental discipline as
//! the Annex B splitter.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, StreamError};

/// IVF file magic tag.
const IVF_MAGIC: &[u8; 4] = b"DKIF";
/// Minimum file header length; the header's own size field is honored when
/// larger.
const FILE_HEADER_LEN: usize = 32;
/// Per-record header length: u32 size + u64 timestamp.
const FRAME_HEADER_LEN: usize = 12;

/// One frame decoded from an IVF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfFrame {
    /// Presentation timestamp from the record header.
    pub pts: u64,
    pub payload: Bytes,
}

/// Incremental IVF demuxer.
pub struct IvfDemuxer {
    buf: BytesMut,
    header_done: bool,
    /// Record header already parsed, payload still incomplete.
    pending: Option<(usize, u64)>,
}

impl Default for IvfDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl IvfDemuxer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            header_done: false,
            pending: None,
        }
    }

    /// Append a chunk and return the frames it completed.
    ///
    /// Fails with [`StreamError::InvalidContainer`] when the stream does
    /// not begin with the IVF magic — that aborts the branch at setup.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<IvfFrame>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        if !self.header_done {
            if self.buf.len() < FILE_HEADER_LEN {
                return Ok(out);
            }
            if &self.buf[..4] != IVF_MAGIC {
                return Err(StreamError::InvalidContainer("missing IVF DKIF magic"));
            }
            let header_len = u16::from_le_bytes([self.buf[6], self.buf[7]]) as usize;
            let header_len = header_len.max(FILE_HEADER_LEN);
            if self.buf.len() < header_len {
                return Ok(out);
            }
            let width = u16::from_le_bytes([self.buf[12], self.buf[13]]);
            let height = u16::from_le_bytes([self.buf[14], self.buf[15]]);
            tracing::debug!(width, height, header_len, "IVF header parsed");
            self.buf.advance(header_len);
            self.header_done = true;
        }

        loop {
            let (size, pts) = match self.pending {
                Some(p) => p,
                None => {
                    if self.buf.len() < FRAME_HEADER_LEN {
                        break;
                    }
                    let size = self.buf.get_u32_le() as usize;
                    let pts = self.buf.get_u64_le();
                    self.pending = Some((size, pts));
                    (size, pts)
                }
            };
            if self.buf.len() < size {
                break;
            }
            let payload = self.buf.split_to(size).freeze();
            self.pending = None;
            tracing::trace!(pts, len = payload.len(), "IVF frame complete");
            out.push(IvfFrame { pts, payload });
        }

        Ok(out)
    }
}
