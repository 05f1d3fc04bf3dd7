//! Word-oriented frame codec for the multiplexed link.
//!
//! Every logical-channel payload travels inside a fixed 3-word header:
//! - A preamble constant (`0x5AA55AA5`) for stream synchronization
//! - A 32-bit channel id (low 8 bits significant)
//! - A 32-bit payload length in bytes
//!
//! Payload bytes are packed little-endian into 32-bit words, padded to a
//! word boundary; the pad is discarded on decode. The [`Packetizer`] and
//! [`Depacketizer`] stream frames one word at a time; the depacketizer
//! self-resynchronizes by scanning for the preamble and recovers from
//! stalled transmissions with a watchdog timeout.

pub mod codec;
pub mod depacketizer;
pub mod error;
pub mod packetizer;

pub use codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD, HEADER_WORDS, PREAMBLE};
pub use depacketizer::{Depacketizer, DepacketizerStats};
pub use error::{FrameError, Result};
pub use packetizer::Packetizer;

pub use fifomux_link::{Word, WORD_BYTES};
