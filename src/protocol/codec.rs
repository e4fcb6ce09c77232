//! Protocol codec for framing envelopes
//!
//! Handles the length prefix on both directions of the stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{Envelope, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};

/// Codec errors
///
/// Every variant is fatal to the session that produced it.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("Stream ended mid-frame ({0} bytes missing)")]
    Incomplete(usize),

    #[error("Stream closed")]
    Closed,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes envelopes into the wire format
#[derive(Debug, Clone)]
pub struct Encoder {
    max_frame_size: usize,
}

impl Encoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Encode an envelope, prefixed with its length, into a buffer
    pub fn encode(&self, envelope: &Envelope, buf: &mut BytesMut) -> CodecResult<()> {
        let len = envelope.encoded_len();
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(len, self.max_frame_size));
        }

        buf.reserve(LENGTH_PREFIX_SIZE + len);
        buf.put_u32(len as u32);
        envelope.encode(buf)?;
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

/// Decodes length-prefixed frames from the wire format
#[derive(Debug)]
pub struct Decoder {
    state: DecodeState,
    max_frame_size: usize,
}

#[derive(Debug, Default, Clone, Copy)]
enum DecodeState {
    #[default]
    Header,
    Body {
        length: usize,
    },
}

impl Decoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_frame_size,
        }
    }

    /// Attempt to decode one raw envelope from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
                    if length > self.max_frame_size {
                        return Err(CodecError::FrameTooLarge(length, self.max_frame_size));
                    }

                    buf.advance(LENGTH_PREFIX_SIZE);
                    self.state = DecodeState::Body { length };
                }
                DecodeState::Body { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    self.state = DecodeState::Header;
                    return Ok(Some(buf.split_to(length).freeze()));
                }
            }
        }
    }

    /// Number of bytes still missing from `buf` to finish the current stage
    pub fn bytes_needed(&self, buf: &BytesMut) -> usize {
        let target = match self.state {
            DecodeState::Header => LENGTH_PREFIX_SIZE,
            DecodeState::Body { length } => length,
        };
        target.saturating_sub(buf.len())
    }

    /// Whether the decoder sits exactly on a frame boundary
    pub fn at_boundary(&self, buf: &BytesMut) -> bool {
        matches!(self.state, DecodeState::Header) && buf.is_empty()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

/// Reads whole frames from an async byte stream, one at a time.
///
/// Never reads past the end of the frame being assembled, so the remaining
/// bytes stay in the underlying stream. `next_frame` is cancel-safe.
pub struct FrameReader<R> {
    reader: R,
    decoder: Decoder,
    buf: BytesMut,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            decoder: Decoder::new(max_frame_size),
            buf: BytesMut::with_capacity(4096),
            bytes_read: 0,
        }
    }

    /// Wait for the next complete frame and return the raw envelope bytes
    pub async fn next_frame(&mut self) -> CodecResult<Bytes> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buf)? {
                return Ok(frame);
            }

            let needed = self.decoder.bytes_needed(&self.buf);
            self.buf.reserve(needed);
            let n = (&mut self.reader)
                .take(needed as u64)
                .read_buf(&mut self.buf)
                .await?;

            if n == 0 {
                if self.decoder.at_boundary(&self.buf) {
                    return Err(CodecError::Closed);
                }
                return Err(CodecError::Incomplete(needed));
            }
            self.bytes_read += n as u64;
        }
    }

    /// Total bytes consumed from the stream
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
