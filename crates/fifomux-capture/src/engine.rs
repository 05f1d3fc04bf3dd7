use tracing::{trace, warn};

use fifomux_link::BoundedQueue;

use crate::record::{CaptureRecord, Direction, TransactionKind};

/// Per-direction capture outcome counters. Monotonic; zeroed only by an
/// explicit [`CaptureEngine::clear_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Transactions admitted whole (truncated or not).
    pub captured: u64,
    /// Transactions rejected entirely on their first beat.
    pub dropped: u64,
    /// Admitted transactions that lost at least one payload beat.
    pub truncated: u64,
}

/// One beat of an observed request transaction.
///
/// Routing/attribute fields must be valid on every beat of the
/// transaction (stream parameters); `data` carries the payload for
/// write requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBeat {
    pub first: bool,
    pub last: bool,
    pub write_enable: bool,
    pub address: u64,
    /// Declared payload length in 32-bit units (10 bits).
    pub length_dw: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub data: u64,
    pub first_be: u8,
    pub last_be: u8,
    pub attributes: u8,
    pub address_type: u8,
    /// Inbound requests: route/BAR hit.
    pub bar_hit: u8,
    /// Outbound requests: PASID and privilege/execute bits.
    pub pasid_valid: bool,
    pub pasid: u32,
    pub privileged: bool,
    pub execute: bool,
}

/// One beat of an observed completion transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionBeat {
    pub first: bool,
    pub last: bool,
    pub address: u64,
    pub length_dw: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub data: u64,
    pub status: u8,
    pub completer_id: u16,
    pub byte_count: u16,
}

/// Output buffer sizing. Header depth bounds how many committed records
/// can await the arbiter; payload depth bounds truncation likelihood.
#[derive(Debug, Clone, Copy)]
pub struct CaptureEngineConfig {
    pub header_depth: usize,
    pub payload_depth: usize,
}

impl Default for CaptureEngineConfig {
    fn default() -> Self {
        Self {
            header_depth: 4,
            payload_depth: 512,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    record: CaptureRecord,
    has_payload: bool,
    truncated: bool,
}

/// Mirrors one direction of a live transaction bus into a record stream.
///
/// Never exerts backpressure on the monitored source: every beat is
/// accepted, dropped, or truncated. The admit/drop decision is made on a
/// transaction's first beat against header-buffer room; the record itself
/// is committed on the last beat, when the payload length and truncated
/// flag are final.
#[derive(Debug)]
pub struct CaptureEngine {
    direction: Direction,
    enabled: bool,
    timestamp: u64,
    headers: BoundedQueue<CaptureRecord>,
    payload: BoundedQueue<u64>,
    /// Multi-beat transaction being discarded (header buffer was full on
    /// its first beat).
    dropping: bool,
    in_flight: Option<InFlight>,
    stats: CaptureStats,
}

impl CaptureEngine {
    pub fn new(direction: Direction, config: CaptureEngineConfig) -> Self {
        Self {
            direction,
            enabled: false,
            timestamp: 0,
            headers: BoundedQueue::new(config.header_depth),
            payload: BoundedQueue::new(config.payload_depth),
            dropping: false,
            in_flight: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Free-running timestamp sampled into each record's first beat.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Zero all three counters at once.
    pub fn clear_stats(&mut self) {
        self.stats = CaptureStats::default();
    }

    /// Take the oldest committed record, if any.
    pub fn pop_header(&mut self) -> Option<CaptureRecord> {
        self.headers.pop()
    }

    /// Take the oldest buffered payload beat, if any.
    pub fn pop_payload(&mut self) -> Option<u64> {
        self.payload.pop()
    }

    /// Committed records awaiting the arbiter.
    pub fn headers_pending(&self) -> usize {
        self.headers.len()
    }

    fn classify_request(beat: &RequestBeat) -> TransactionKind {
        if beat.write_enable {
            TransactionKind::MemWrite
        } else {
            TransactionKind::MemRead
        }
    }

    fn classify_completion(beat: &CompletionBeat) -> TransactionKind {
        if beat.length_dw > 0 {
            TransactionKind::CompletionData
        } else {
            TransactionKind::Completion
        }
    }

    fn request_record(&self, beat: &RequestBeat, kind: TransactionKind) -> CaptureRecord {
        CaptureRecord {
            direction: self.direction,
            kind,
            timestamp: self.timestamp,
            requester_id: beat.requester_id,
            tag: beat.tag,
            first_be: beat.first_be,
            last_be: beat.last_be,
            address: beat.address,
            write_enable: beat.write_enable,
            attributes: beat.attributes,
            address_type: beat.address_type,
            bar_hit: beat.bar_hit,
            pasid_valid: beat.pasid_valid,
            pasid: beat.pasid,
            privileged: beat.privileged,
            execute: beat.execute,
            status: 0,
            completer_id: 0,
            byte_count: 0,
            payload_length_dw: beat.length_dw & 0x3FF,
            truncated: false,
        }
    }

    fn completion_record(&self, beat: &CompletionBeat, kind: TransactionKind) -> CaptureRecord {
        CaptureRecord {
            direction: self.direction,
            kind,
            timestamp: self.timestamp,
            requester_id: beat.requester_id,
            tag: beat.tag,
            first_be: 0,
            last_be: 0,
            address: beat.address,
            write_enable: false,
            attributes: 0,
            address_type: 0,
            bar_hit: 0,
            pasid_valid: false,
            pasid: 0,
            privileged: false,
            execute: false,
            status: beat.status,
            completer_id: beat.completer_id,
            byte_count: beat.byte_count,
            payload_length_dw: beat.length_dw & 0x3FF,
            truncated: false,
        }
    }

    /// Observe one tick of the monitored bus.
    ///
    /// When request and completion beats land in the same tick the request
    /// wins and the completion beat is lost — the tap is lossy by design,
    /// never blocking.
    pub fn observe(&mut self, request: Option<&RequestBeat>, completion: Option<&CompletionBeat>) {
        if !self.enabled {
            return;
        }
        let (first, last, has_payload, data, record) = if let Some(beat) = request {
            let kind = Self::classify_request(beat);
            (
                beat.first,
                beat.last,
                kind.has_payload(),
                beat.data,
                (beat.first).then(|| self.request_record(beat, kind)),
            )
        } else if let Some(beat) = completion {
            let kind = Self::classify_completion(beat);
            (
                beat.first,
                beat.last,
                kind.has_payload(),
                beat.data,
                (beat.first).then(|| self.completion_record(beat, kind)),
            )
        } else {
            return;
        };

        if first {
            if self.headers.is_full() {
                // No room: the whole transaction is dropped, and none of
                // its payload beats are forwarded.
                if last {
                    self.stats.dropped += 1;
                } else {
                    self.dropping = true;
                }
                trace!(direction = ?self.direction, "transaction dropped, header buffer full");
                return;
            }
            self.dropping = false;
            if let Some(record) = record {
                self.in_flight = Some(InFlight {
                    record,
                    has_payload,
                    truncated: false,
                });
            }
        }

        if self.dropping {
            if last {
                self.stats.dropped += 1;
                self.dropping = false;
            }
            return;
        }

        let Some(flight) = self.in_flight.as_mut() else {
            // Orphan beat (mid-transaction enable, or beats after a
            // commit): nothing latched, nothing to do.
            return;
        };

        if flight.has_payload && self.payload.push(data).is_err() {
            flight.truncated = true;
        }

        if last {
            if let Some(mut flight) = self.in_flight.take() {
                flight.record.truncated = flight.truncated;
                if !flight.has_payload {
                    flight.record.payload_length_dw = 0;
                }
                match self.headers.push(flight.record) {
                    Ok(()) => {
                        self.stats.captured += 1;
                        if flight.truncated {
                            self.stats.truncated += 1;
                        }
                    }
                    Err(_) => {
                        // Room was checked on the first beat and only this
                        // engine writes the header buffer.
                        warn!(direction = ?self.direction, "header buffer raced, record lost");
                        self.stats.dropped += 1;
                    }
                }
            }
        }
    }
}
