//! Native messaging framing
//!
//! Wire format, symmetric in both directions:
//!
//! ```text
//! [u32 little-endian length] [length bytes of UTF-8 JSON]
//! ```
//!
//! Framing and JSON are deliberately separate layers. A bad length prefix
//! poisons every byte that follows, so the decoder fails the stream. A
//! well-framed payload that is not valid JSON only costs that one message,
//! so parsing happens above the codec via [`decode_json`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Largest payload accepted in either direction (1 MiB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid message length: {0}")]
    InvalidLength(usize),

    #[error("Message length {len} exceeds maximum of {max} bytes")]
    TooLarge { len: usize, max: usize },

    #[error("EOF: stream closed after {received} of {expected} bytes")]
    UnexpectedEof { expected: usize, received: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    Payload(usize),
}

/// Length-prefixed frame codec for a native messaging byte stream
///
/// Decoding keeps its position across calls: once a header has been
/// consumed the decoder waits for exactly that many payload bytes, however
/// the reads happen to be chunked.
#[derive(Debug, Clone)]
pub struct NativeFrameCodec {
    state: DecodeState,
    max_len: usize,
}

impl NativeFrameCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn check_len(&self, len: usize) -> Result<(), FrameError> {
        if len == 0 {
            return Err(FrameError::InvalidLength(len));
        }
        if len > self.max_len {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_len,
            });
        }
        Ok(())
    }
}

impl Default for NativeFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NativeFrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        let len = match self.state {
            DecodeState::Header => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let len = src.get_u32_le() as usize;
                // Validate before reserving so a hostile prefix never allocates
                self.check_len(len)?;
                self.state = DecodeState::Payload(len);
                len
            }
            DecodeState::Payload(len) => len,
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        self.state = DecodeState::Header;
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        match self.state {
            DecodeState::Header if src.is_empty() => Ok(None),
            DecodeState::Header => Err(FrameError::UnexpectedEof {
                expected: HEADER_LEN,
                received: src.len(),
            }),
            DecodeState::Payload(len) => Err(FrameError::UnexpectedEof {
                expected: len,
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for NativeFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = payload.len();
        self.check_len(len)?;

        dst.reserve(HEADER_LEN + len);
        dst.put_u32_le(len as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Serialize a message into a frame payload
pub fn encode_json<T: Serialize>(message: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(message).map(Bytes::from)
}

/// Parse a frame payload as JSON
pub fn decode_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(payload)
}
