//! Stream framing for [`UpdateMessage`]s.
//!
//! Frames are sent back to back with no delimiter beyond the header's own
//! length fields. Decoding is two-phase: wait for the fixed header, validate
//! it, then wait for exactly the remaining payload. A validation failure is
//! returned as `CorruptFrame` and the stream must be abandoned; there is no
//! resynchronisation marker to skip ahead to.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::frame::{
    decode_with_layout, encode_sections, FrameLayout, UpdateMessage, HEADER_SIZE,
};
use crate::error::constants::ERR_TRUNCATED_STREAM;
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Layout of the frame whose header has been validated but whose
    /// payload has not fully arrived yet
    pending: Option<FrameLayout>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = UpdateMessage;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let layout = match self.pending {
            Some(layout) => layout,
            None => {
                if src.len() < HEADER_SIZE {
                    src.reserve(HEADER_SIZE - src.len());
                    return Ok(None);
                }
                let layout = FrameLayout::parse(&src[..HEADER_SIZE])?;
                self.pending = Some(layout);
                layout
            }
        };

        if src.len() < layout.frame_length {
            src.reserve(layout.frame_length - src.len());
            return Ok(None);
        }

        self.pending = None;
        let frame = src.split_to(layout.frame_length);
        decode_with_layout(&layout, &frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(BridgeError::corrupt(ERR_TRUNCATED_STREAM)),
        }
    }
}

impl Encoder<UpdateMessage> for FrameCodec {
    type Error = BridgeError;

    fn encode(&mut self, msg: UpdateMessage, dst: &mut BytesMut) -> Result<()> {
        encode_sections(&msg.header, &msg.existing, &msg.removed, &msg.added, dst)
    }
}

/// Pre-encoded frames, as queued by the producer, pass through untouched.
impl Encoder<Bytes> for FrameCodec {
    type Error = BridgeError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::core::frame::{FrameHeader, ParticipantFlags, ParticipantState};
    use crate::core::math::Vec3;

    fn frame(id: u64) -> UpdateMessage {
        let mut msg = UpdateMessage::new(FrameHeader::new(1));
        msg.existing.push(ParticipantState {
            id,
            position: Vec3::new(id as f32, 0.0, 0.0),
            flags: ParticipantFlags::empty(),
        });
        msg
    }

    #[test]
    fn test_header_then_payload() {
        let bytes = frame(9).encode().unwrap();
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&bytes[..HEADER_SIZE - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.pending.is_none());

        buf.extend_from_slice(&bytes[HEADER_SIZE - 1..HEADER_SIZE + 3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.pending.is_some());

        buf.extend_from_slice(&bytes[HEADER_SIZE + 3..]);
        let decoded = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(decoded, frame(9));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(frame(1), &mut buf).unwrap();
        codec.encode(frame(2), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().existing[0].id, 1);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().existing[0].id, 2);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_eof_mid_frame_is_corrupt() {
        let bytes = frame(1).encode().unwrap();
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&bytes[..bytes.len() - 2]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, BridgeError::CorruptFrame(_)));
    }

    #[test]
    fn test_clean_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
