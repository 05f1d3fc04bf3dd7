use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::{Word, WORD_BYTES};

/// Fixed preamble word marking the start of every frame.
pub const PREAMBLE: Word = 0x5AA5_5AA5;

/// Header size in words: preamble + channel id + length.
pub const HEADER_WORDS: usize = 3;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A logical-channel payload with its routing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this frame belongs to.
    pub channel: u8,
    /// The payload bytes (length on the wire is exact; pad is stripped).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Payload length in bytes, as carried in the header.
    pub fn length_bytes(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Number of payload words on the wire (padded up).
    pub fn payload_words(&self) -> usize {
        self.payload.len().div_ceil(WORD_BYTES)
    }

    /// Total wire size of this frame, in words.
    pub fn wire_words(&self) -> usize {
        HEADER_WORDS + self.payload_words()
    }
}

/// Pack payload bytes into little-endian words, zero-padded to a boundary.
pub(crate) fn pack_payload(payload: &[u8]) -> Vec<Word> {
    payload
        .chunks(WORD_BYTES)
        .map(|chunk| {
            let mut bytes = [0u8; WORD_BYTES];
            bytes[..chunk.len()].copy_from_slice(chunk);
            Word::from_le_bytes(bytes)
        })
        .collect()
}

/// Unpack words back into bytes, keeping only the first `length_bytes`.
pub(crate) fn unpack_payload(words: &[Word], length_bytes: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(words.len() * WORD_BYTES);
    for word in words {
        buf.put_u32_le(*word);
    }
    buf.truncate(length_bytes);
    buf.freeze()
}

/// Encode a frame into its wire word sequence.
///
/// Wire format (one 32-bit word per row):
/// ```text
/// ┌──────────────┬───────────────┬───────────────┬──────────────────┐
/// │ 0x5AA55AA5   │ channel id    │ length (bytes)│ payload words    │
/// │ preamble     │ zero-extended │               │ ceil(len/4), LE  │
/// └──────────────┴───────────────┴───────────────┴──────────────────┘
/// ```
pub fn encode_frame(channel: u8, payload: &[u8]) -> Result<Vec<Word>> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    let mut words = Vec::with_capacity(HEADER_WORDS + payload.len().div_ceil(WORD_BYTES));
    words.push(PREAMBLE);
    words.push(channel as Word);
    words.push(payload.len() as Word);
    words.extend(pack_payload(payload));
    Ok(words)
}

/// Decode one complete frame from the front of a word slice.
///
/// Returns the frame and the number of words consumed, or `None` if the
/// slice does not start with a preamble or is too short to hold the frame
/// it announces. Streaming decode with resynchronization lives in
/// [`crate::Depacketizer`]; this is the slice-level counterpart used by
/// tests and host-side tooling.
pub fn decode_frame(words: &[Word]) -> Option<(Frame, usize)> {
    if words.len() < HEADER_WORDS || words[0] != PREAMBLE {
        return None;
    }
    let channel = (words[1] & 0xFF) as u8;
    let length_bytes = words[2] as usize;
    let payload_words = length_bytes.div_ceil(WORD_BYTES);
    let total = HEADER_WORDS + payload_words;
    if words.len() < total {
        return None;
    }
    let payload = unpack_payload(&words[HEADER_WORDS..total], length_bytes);
    Some((Frame { channel, payload }, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let payload = b"hello, fifomux!";
        let words = encode_frame(7, payload).unwrap();
        assert_eq!(words.len(), HEADER_WORDS + payload.len().div_ceil(4));

        let (frame, consumed) = decode_frame(&words).unwrap();
        assert_eq!(consumed, words.len());
        assert_eq!(frame.channel, 7);
        assert_eq!(frame.payload.as_ref(), payload);
    }

    #[test]
    fn known_wire_words() {
        // 6-byte payload: one full word plus a padded tail word.
        let words = encode_frame(0, b"Hello!").unwrap();
        assert_eq!(
            words,
            vec![0x5AA55AA5, 0x00000000, 0x00000006, 0x6C6C6548, 0x0000216F]
        );
    }

    #[test]
    fn empty_payload() {
        let words = encode_frame(3, b"").unwrap();
        assert_eq!(words, vec![PREAMBLE, 3, 0]);
        let (frame, consumed) = decode_frame(&words).unwrap();
        assert_eq!(consumed, HEADER_WORDS);
        assert_eq!(frame.channel, 3);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn pad_bytes_discarded() {
        for len in 1..=9usize {
            let payload: Vec<u8> = (0..len as u8).collect();
            let words = encode_frame(1, &payload).unwrap();
            let (frame, _) = decode_frame(&words).unwrap();
            assert_eq!(frame.payload.as_ref(), payload.as_slice(), "len {len}");
        }
    }

    #[test]
    fn channel_id_low_eight_bits() {
        // The header word is 32 bits wide but only the low byte routes.
        let mut words = encode_frame(0x42, b"x").unwrap();
        words[1] |= 0xFFFF_FF00;
        let (frame, _) = decode_frame(&words).unwrap();
        assert_eq!(frame.channel, 0x42);
    }

    #[test]
    fn no_preamble_no_frame() {
        let words = [0xDEADBEEF, 0x00000001, 0x00000000];
        assert!(decode_frame(&words).is_none());
    }

    #[test]
    fn short_slice_no_frame() {
        let words = encode_frame(1, b"abcdef").unwrap();
        assert!(decode_frame(&words[..words.len() - 1]).is_none());
        assert!(decode_frame(&words[..2]).is_none());
    }

    #[test]
    fn wire_words_accounting() {
        let frame = Frame::new(1, Bytes::from_static(b"test1"));
        assert_eq!(frame.length_bytes(), 5);
        assert_eq!(frame.payload_words(), 2);
        assert_eq!(frame.wire_words(), HEADER_WORDS + 2);
    }
}
