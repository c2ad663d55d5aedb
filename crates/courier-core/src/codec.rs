//! Length-prefixed CBOR framing for handshake and logic packets.
//!
//! Wire format: `[4-byte big-endian length][CBOR payload]`

use crate::error::{CourierError, CourierResult};
use std::io::Cursor;

/// Largest payload a single frame may carry (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1_048_576;

/// Encode a serializable value as a bare CBOR payload.
pub fn cbor_encode<T: serde::Serialize>(value: &T) -> CourierResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload)?;
    Ok(payload)
}

/// Encode a serializable value into a length-prefixed CBOR frame.
pub fn frame_encode<T: serde::Serialize>(value: &T) -> CourierResult<Vec<u8>> {
    let payload = cbor_encode(value)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CourierError::Codec(format!(
            "frame too large: {} bytes (max {MAX_FRAME_SIZE})",
            payload.len()
        )));
    }

    let len = payload.len() as u32;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend(payload);
    Ok(frame)
}

/// Decode a CBOR payload (without length prefix) into a typed value.
pub fn cbor_decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> CourierResult<T> {
    let cursor = Cursor::new(data);
    let value: T = ciborium::from_reader(cursor)?;
    Ok(value)
}

/// Streaming frame decoder: accumulates bytes and yields complete payloads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes and return every complete payload (length prefix stripped).
    ///
    /// A declared length above [`MAX_FRAME_SIZE`] poisons the stream and is
    /// reported as a codec error; the buffer is cleared.
    pub fn feed(&mut self, data: &[u8]) -> CourierResult<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        while self.buffer.len() >= 4 {
            let len =
                u32::from_be_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]])
                    as usize;

            if len > MAX_FRAME_SIZE {
                self.buffer.clear();
                return Err(CourierError::Codec(format!(
                    "declared frame length {len} exceeds {MAX_FRAME_SIZE}"
                )));
            }
            if self.buffer.len() < 4 + len {
                break;
            }

            frames.push(self.buffer[4..4 + len].to_vec());
            self.buffer.drain(..4 + len);
        }

        Ok(frames)
    }

    /// Reset internal buffer.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes remaining in the internal buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::InnerHandshakeReq;

    #[test]
    fn incremental_feed() {
        let req = InnerHandshakeReq {
            service_id: "gateway-01".into(),
        };
        let frame = frame_encode(&req).unwrap();
        let mut decoder = FrameDecoder::new();

        // Feed one byte at a time
        for i in 0..frame.len() - 1 {
            let frames = decoder.feed(&frame[i..i + 1]).unwrap();
            assert!(frames.is_empty());
        }
        let frames = decoder.feed(&frame[frame.len() - 1..]).unwrap();
        assert_eq!(frames.len(), 1);

        let decoded: InnerHandshakeReq = cbor_decode(&frames[0]).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn two_frames_in_one_read() {
        let mut combined = frame_encode(&"a").unwrap();
        combined.extend(frame_encode(&"bb").unwrap());

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&combined).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(cbor_decode::<String>(&frames[1]).unwrap(), "bb");
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut decoder = FrameDecoder::new();
        let len = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
        assert!(decoder.feed(&len).is_err());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn pending_bytes() {
        let frame = frame_encode(&"x").unwrap();
        let mut decoder = FrameDecoder::new();

        decoder.feed(&frame[..3]).unwrap();
        assert_eq!(decoder.pending(), 3);

        decoder.reset();
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn garbage_payload_is_codec_error() {
        let err = cbor_decode::<InnerHandshakeReq>(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, CourierError::Codec(_)));
    }
}
