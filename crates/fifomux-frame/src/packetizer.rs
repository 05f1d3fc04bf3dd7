use crate::codec::{pack_payload, Frame, PREAMBLE};
use crate::error::{FrameError, Result};
use crate::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    InsertHeader,
    Copy,
}

/// Wraps channel frames with the wire header, one word at a time.
///
/// Exactly one frame is ever mid-transmission: [`Packetizer::load`] is
/// refused until the previous frame's last word has been taken by
/// [`Packetizer::next_word`]. Downstream backpressure is expressed by
/// simply not calling `next_word`.
#[derive(Debug, Default)]
pub struct Packetizer {
    state: State,
    header: [Word; 3],
    header_pos: usize,
    payload: Vec<Word>,
    payload_pos: usize,
}

impl Packetizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no frame is in flight.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Begin transmitting a frame.
    pub fn load(&mut self, frame: &Frame) -> Result<()> {
        if self.state != State::Idle {
            return Err(FrameError::PacketizerBusy);
        }
        self.header = [PREAMBLE, frame.channel as Word, frame.length_bytes()];
        self.header_pos = 0;
        self.payload = pack_payload(&frame.payload);
        self.payload_pos = 0;
        self.state = State::InsertHeader;
        Ok(())
    }

    /// Produce the next wire word of the frame in flight, if any.
    pub fn next_word(&mut self) -> Option<Word> {
        match self.state {
            State::Idle => None,
            State::InsertHeader => {
                let word = self.header[self.header_pos];
                self.header_pos += 1;
                if self.header_pos == self.header.len() {
                    self.state = if self.payload.is_empty() {
                        State::Idle
                    } else {
                        State::Copy
                    };
                }
                Some(word)
            }
            State::Copy => {
                let word = self.payload[self.payload_pos];
                self.payload_pos += 1;
                if self.payload_pos == self.payload.len() {
                    self.state = State::Idle;
                }
                Some(word)
            }
        }
    }
}
