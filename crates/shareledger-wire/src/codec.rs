//! Length-prefixed framing.
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (BE)  | payload: CBOR(Envelope)   |
//! +----------------+---------------------------+
//! ```

use bytes::{Buf, BytesMut};

use crate::envelope::Envelope;
use crate::error::{Result, WireError};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted in either direction.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Encode an envelope as one frame.
pub fn encode_frame(envelope: &Envelope, max: usize) -> Result<Vec<u8>> {
    envelope.validate_limits()?;
    let payload = envelope.to_cbor()?;
    if payload.len() > max || payload.len() > u32::MAX as usize {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
            max,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read the declared payload length, rejecting it if over `max`.
pub(crate) fn declared_length(prefix: [u8; LENGTH_PREFIX_SIZE], max: usize) -> Result<usize> {
    let declared = u32::from_be_bytes(prefix) as usize;
    if declared > max {
        return Err(WireError::FrameTooLarge {
            size: declared,
            max,
        });
    }
    Ok(declared)
}

/// Decode exactly one frame. Trailing or missing bytes are an error.
pub fn decode_frame(data: &[u8], max: usize) -> Result<Envelope> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(WireError::Truncated {
            needed: LENGTH_PREFIX_SIZE,
            got: data.len(),
        });
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&data[..LENGTH_PREFIX_SIZE]);
    let declared = declared_length(prefix, max)?;

    let actual = data.len() - LENGTH_PREFIX_SIZE;
    if actual != declared {
        return Err(WireError::LengthMismatch { declared, actual });
    }

    Envelope::from_cbor(&data[LENGTH_PREFIX_SIZE..])
}

/// Incremental decoder for a byte stream carrying back-to-back frames.
///
/// Push bytes as they arrive; pop envelopes once whole frames are buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max: usize,
}

impl FrameDecoder {
    pub fn new(max: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete envelope, if one is buffered.
    ///
    /// An oversized prefix is an error as soon as it is seen, without waiting
    /// for the payload.
    pub fn next_frame(&mut self) -> Result<Option<Envelope>> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let declared = declared_length(prefix, self.max)?;

        if self.buffer.len() < LENGTH_PREFIX_SIZE + declared {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        let payload = self.buffer.split_to(declared);
        Envelope::from_cbor(&payload).map(Some)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shareledger_core::{ChainPosition, Keypair};

    fn sample() -> Envelope {
        Envelope::ChainPosition(ChainPosition::genesis(
            Keypair::from_seed(&[9; 32]).public_key(),
        ))
    }

    #[test]
    fn test_frame_prefix() {
        let frame = encode_frame(&sample(), MAX_MESSAGE_SIZE).unwrap();
        let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(declared, frame.len() - LENGTH_PREFIX_SIZE);
        assert_eq!(decode_frame(&frame, MAX_MESSAGE_SIZE).unwrap(), sample());
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut frame = vec![0u8; 8];
        frame[..4].copy_from_slice(&((MAX_MESSAGE_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            decode_frame(&frame, MAX_MESSAGE_SIZE),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_respects_max() {
        assert!(matches!(
            encode_frame(&sample(), 8),
            Err(WireError::FrameTooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn test_short_and_long_buffers() {
        let frame = encode_frame(&sample(), MAX_MESSAGE_SIZE).unwrap();

        assert!(matches!(
            decode_frame(&frame[..2], MAX_MESSAGE_SIZE),
            Err(WireError::Truncated { needed: 4, got: 2 })
        ));
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 1], MAX_MESSAGE_SIZE),
            Err(WireError::LengthMismatch { .. })
        ));

        let mut long = frame.clone();
        long.push(0);
        assert!(matches!(
            decode_frame(&long, MAX_MESSAGE_SIZE),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decoder_handles_split_and_batched_frames() {
        let frame = encode_frame(&sample(), MAX_MESSAGE_SIZE).unwrap();
        let mut decoder = FrameDecoder::default();

        // 1. Byte-at-a-time delivery.
        for byte in &frame[..frame.len() - 1] {
            decoder.push(&[*byte]);
            assert!(decoder.next_frame().unwrap().is_none());
        }
        decoder.push(&frame[frame.len() - 1..]);
        assert_eq!(decoder.next_frame().unwrap(), Some(sample()));
        assert_eq!(decoder.buffered(), 0);

        // 2. Two frames in one read.
        let mut batch = frame.clone();
        batch.extend_from_slice(&frame);
        decoder.push(&batch);
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_decoder_rejects_oversized_prefix_early() {
        let mut decoder = FrameDecoder::new(16);
        decoder.push(&100u32.to_be_bytes());
        assert!(matches!(decoder.next_frame(), Err(WireError::FrameTooLarge { .. })));
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_frame(&data, MAX_MESSAGE_SIZE);
            let mut decoder = FrameDecoder::new(1024);
            decoder.push(&data);
            let _ = decoder.next_frame();
        }
    }
}
