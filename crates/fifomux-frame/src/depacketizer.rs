use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::{unpack_payload, Frame, DEFAULT_MAX_PAYLOAD, PREAMBLE};
use crate::{Word, WORD_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    RecvHeader,
    Copy,
}

/// Observability counters for conditions the protocol heals silently.
///
/// None of these affect framing behavior; they exist so a stalled or noisy
/// link is diagnosable instead of just slow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerStats {
    /// Partial frames discarded by the watchdog.
    pub timeouts: u64,
    /// Words scanned and rejected while hunting for the preamble.
    pub resync_words: u64,
    /// Frames abandoned because the announced length was implausible.
    pub oversize: u64,
}

/// Streaming frame decoder with preamble resynchronization.
///
/// `Idle` scans every incoming word for [`PREAMBLE`], so the decoder
/// self-recovers from arbitrary bus garbage without intervention. A
/// watchdog runs whenever a frame is partially assembled: if it expires
/// (`timeout_ticks` cycles without completing), the partial frame is
/// discarded and scanning resumes. A timed-out frame produces no
/// downstream notification beyond [`DepacketizerStats::timeouts`].
#[derive(Debug)]
pub struct Depacketizer {
    state: State,
    timeout_ticks: u64,
    watchdog: u64,
    max_payload: usize,
    channel: u8,
    length_bytes: u32,
    header_pos: usize,
    words_needed: usize,
    words: Vec<Word>,
    stats: DepacketizerStats,
}

impl Depacketizer {
    /// Create a decoder whose watchdog fires after `timeout_ticks` cycles
    /// outside `Idle`. Callers derive the tick count from the link clock
    /// frequency and the configured timeout duration.
    pub fn new(timeout_ticks: u64) -> Self {
        Self {
            state: State::Idle,
            timeout_ticks,
            watchdog: 0,
            max_payload: DEFAULT_MAX_PAYLOAD,
            channel: 0,
            length_bytes: 0,
            header_pos: 0,
            words_needed: 0,
            words: Vec::new(),
            stats: DepacketizerStats::default(),
        }
    }

    /// Override the maximum plausible payload length.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn stats(&self) -> DepacketizerStats {
        self.stats
    }

    /// True when no frame is partially assembled.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.watchdog = 0;
        self.words.clear();
    }

    /// Advance the watchdog by one cycle; returns to `Idle` on expiry.
    fn run_watchdog(&mut self) {
        if self.state == State::Idle {
            return;
        }
        self.watchdog += 1;
        if self.watchdog >= self.timeout_ticks {
            warn!(state = ?self.state, "frame watchdog expired, discarding partial frame");
            self.stats.timeouts += 1;
            self.reset();
        }
    }

    /// A cycle elapsed with no word on the bus.
    pub fn idle_tick(&mut self) {
        self.run_watchdog();
    }

    /// Feed one word from the link; returns a frame when one completes.
    pub fn push_word(&mut self, word: Word) -> Option<Frame> {
        self.run_watchdog();
        match self.state {
            State::Idle => {
                if word == PREAMBLE {
                    self.state = State::RecvHeader;
                    self.header_pos = 0;
                } else {
                    self.stats.resync_words += 1;
                }
                None
            }
            State::RecvHeader => {
                if self.header_pos == 0 {
                    self.channel = (word & 0xFF) as u8;
                    self.header_pos = 1;
                    return None;
                }
                self.length_bytes = word;
                if self.length_bytes as usize > self.max_payload {
                    warn!(
                        length = self.length_bytes,
                        max = self.max_payload,
                        "implausible frame length, resynchronizing"
                    );
                    self.stats.oversize += 1;
                    self.reset();
                    return None;
                }
                self.words_needed = (self.length_bytes as usize).div_ceil(WORD_BYTES);
                if self.words_needed == 0 {
                    let frame = Frame {
                        channel: self.channel,
                        payload: Bytes::new(),
                    };
                    self.reset();
                    return Some(frame);
                }
                self.words.clear();
                self.state = State::Copy;
                None
            }
            State::Copy => {
                self.words.push(word);
                // Running counter against the word count derived from the
                // length field decides the last word.
                if self.words.len() < self.words_needed {
                    return None;
                }
                let frame = Frame {
                    channel: self.channel,
                    payload: unpack_payload(&self.words, self.length_bytes as usize),
                };
                debug!(
                    channel = frame.channel,
                    length = self.length_bytes,
                    "frame received"
                );
                self.reset();
                Some(frame)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    fn feed(d: &mut Depacketizer, words: &[Word]) -> Vec<Frame> {
        words.iter().filter_map(|w| d.push_word(*w)).collect()
    }

    #[test]
    fn decodes_clean_frame() {
        let mut d = Depacketizer::new(100);
        let words = encode_frame(4, b"payload bytes").unwrap();
        let frames = feed(&mut d, &words);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 4);
        assert_eq!(frames[0].payload.as_ref(), b"payload bytes");
        assert!(d.is_idle());
    }

    #[test]
    fn resynchronizes_after_garbage() {
        let mut d = Depacketizer::new(100);
        let mut words = vec![0xDEADBEEF, 0x12345678, 0x00000000];
        words.extend(encode_frame(2, b"ok").unwrap());

        let frames = feed(&mut d, &words);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 2);
        assert_eq!(frames[0].payload.as_ref(), b"ok");
        assert_eq!(d.stats().resync_words, 3);
    }

    #[test]
    fn back_to_back_frames() {
        let mut d = Depacketizer::new(100);
        let mut words = encode_frame(1, b"first").unwrap();
        words.extend(encode_frame(2, b"second").unwrap());

        let frames = feed(&mut d, &words);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.as_ref(), b"first");
        assert_eq!(frames[1].payload.as_ref(), b"second");
    }

    #[test]
    fn zero_length_frame() {
        let mut d = Depacketizer::new(100);
        let frames = feed(&mut d, &[PREAMBLE, 7, 0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 7);
        assert!(frames[0].payload.is_empty());
        assert!(d.is_idle());
    }

    #[test]
    fn watchdog_discards_stalled_frame() {
        let mut d = Depacketizer::new(5);
        // Header plus one of two payload words, then the link stalls.
        assert!(feed(&mut d, &[PREAMBLE, 1, 8, 0x11111111]).is_empty());
        assert!(!d.is_idle());

        for _ in 0..5 {
            d.idle_tick();
        }
        assert!(d.is_idle());
        assert_eq!(d.stats().timeouts, 1);

        // The next clean frame decodes; the stalled one is simply gone.
        let words = encode_frame(3, b"after").unwrap();
        let frames = feed(&mut d, &words);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 3);
        assert_eq!(frames[0].payload.as_ref(), b"after");
    }

    #[test]
    fn watchdog_counts_while_receiving_header() {
        let mut d = Depacketizer::new(3);
        assert!(d.push_word(PREAMBLE).is_none());
        for _ in 0..3 {
            d.idle_tick();
        }
        assert!(d.is_idle());
        assert_eq!(d.stats().timeouts, 1);
    }

    #[test]
    fn idle_ticks_do_not_expire_idle_state() {
        // Ten quiet cycles would trip a 5-tick watchdog if `Idle` counted;
        // the frame itself finishes within the budget.
        let mut d = Depacketizer::new(5);
        for _ in 0..10 {
            d.idle_tick();
        }
        assert_eq!(d.stats().timeouts, 0);
        let frames = feed(&mut d, &encode_frame(1, b"x").unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(d.stats().timeouts, 0);
    }

    #[test]
    fn implausible_length_resynchronizes() {
        let mut d = Depacketizer::new(100).with_max_payload(64);
        assert!(feed(&mut d, &[PREAMBLE, 1, 1024]).is_empty());
        assert!(d.is_idle());
        assert_eq!(d.stats().oversize, 1);

        let frames = feed(&mut d, &encode_frame(1, b"fits").unwrap());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn roundtrip_lengths_zero_to_boundary() {
        // Cover the pad edge cases on both sides of word boundaries.
        for len in [0usize, 1, 3, 4, 5, 7, 8, 63, 64, 4096] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let words = encode_frame(9, &payload).unwrap();
            let mut d = Depacketizer::new(1_000_000);
            let frames = feed(&mut d, &words);
            assert_eq!(frames.len(), 1, "len {len}");
            assert_eq!(frames[0].payload.as_ref(), payload.as_slice(), "len {len}");
        }
    }
}
