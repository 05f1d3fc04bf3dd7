use bytes::{BufMut, BytesMut};

use fifomux_frame::Frame;

use crate::engine::CaptureEngine;
use crate::record::HEADER_WORDS_32;

#[derive(Debug)]
struct InFlight {
    from_inbound: bool,
    acc: BytesMut,
    /// Payload still owed, in 32-bit units.
    dw_left: u16,
}

/// Merges the two directional capture streams into frames on the
/// diagnostic channel.
///
/// Packets are atomic: once a record is selected, its header and its
/// full declared payload are emitted before the other direction is
/// considered. Inbound has fixed priority at packet boundaries. A
/// record's payload is owed at its declared length, so a truncated
/// packet holds the arbiter until enough later beats arrive to cover
/// the shortfall.
#[derive(Debug)]
pub struct CaptureArbiter {
    channel: u8,
    in_flight: Option<InFlight>,
}

impl CaptureArbiter {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            in_flight: None,
        }
    }

    /// True while a packet has been started but not fully assembled.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Advance packet assembly; returns a completed frame when one is ready.
    ///
    /// The packed header goes out as eight little-endian 32-bit words,
    /// followed by the payload split low-half-first from each 64-bit beat.
    /// An odd declared length discards the final beat's upper half as pad.
    pub fn poll(
        &mut self,
        inbound: &mut CaptureEngine,
        outbound: &mut CaptureEngine,
    ) -> Option<Frame> {
        if self.in_flight.is_none() {
            let (record, from_inbound) = if let Some(record) = inbound.pop_header() {
                (record, true)
            } else if let Some(record) = outbound.pop_header() {
                (record, false)
            } else {
                return None;
            };
            let dw_left = record.payload_length_dw;
            let mut acc =
                BytesMut::with_capacity((HEADER_WORDS_32 + dw_left as usize) * 4);
            for word in record.pack() {
                acc.put_u64_le(word);
            }
            self.in_flight = Some(InFlight {
                from_inbound,
                acc,
                dw_left,
            });
        }

        let flight = self.in_flight.as_mut()?;
        let source = if flight.from_inbound { inbound } else { outbound };
        while flight.dw_left > 0 {
            // Starved mid-packet: hold state and wait for more beats.
            let beat = source.pop_payload()?;
            if flight.dw_left >= 2 {
                flight.acc.put_u64_le(beat);
                flight.dw_left -= 2;
            } else {
                // Odd trailing length: the beat's upper half is pad.
                flight.acc.put_u32_le(beat as u32);
                flight.dw_left -= 1;
            }
        }

        let flight = self.in_flight.take()?;
        Some(Frame::new(self.channel, flight.acc.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CaptureEngineConfig, RequestBeat};
    use crate::record::{CaptureRecord, Direction};

    const DIAG: u8 = 1;

    fn engine(direction: Direction) -> CaptureEngine {
        let mut e = CaptureEngine::new(
            direction,
            CaptureEngineConfig {
                header_depth: 8,
                payload_depth: 64,
            },
        );
        e.set_enabled(true);
        e
    }

    fn read_request(address: u64) -> RequestBeat {
        RequestBeat {
            first: true,
            last: true,
            write_enable: false,
            address,
            length_dw: 1,
            ..RequestBeat::default()
        }
    }

    fn write_beats(address: u64, beats: u16, length_dw: u16) -> Vec<RequestBeat> {
        (0..beats)
            .map(|i| RequestBeat {
                first: i == 0,
                last: i == beats - 1,
                write_enable: true,
                address,
                length_dw,
                data: 0x1111_0000_0000_0000 * (i as u64 + 1) + address,
                ..RequestBeat::default()
            })
            .collect()
    }

    fn header_of(frame: &Frame) -> CaptureRecord {
        let mut words = [0u64; 4];
        for (i, chunk) in frame.payload[..32].chunks(8).enumerate() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            words[i] = u64::from_le_bytes(raw);
        }
        CaptureRecord::unpack(words)
    }

    #[test]
    fn payloadless_record_is_header_only() {
        let mut inb = engine(Direction::Inbound);
        let mut out = engine(Direction::Outbound);
        let mut arb = CaptureArbiter::new(DIAG);

        inb.observe(Some(&read_request(0x40)), None);
        let frame = arb.poll(&mut inb, &mut out).unwrap();

        assert_eq!(frame.channel, DIAG);
        assert_eq!(frame.payload.len(), HEADER_WORDS_32 * 4);
        let rec = header_of(&frame);
        assert_eq!(rec.address, 0x40);
        assert_eq!(rec.payload_length_dw, 0);
    }

    #[test]
    fn payload_beats_split_low_half_first() {
        let mut inb = engine(Direction::Inbound);
        let mut out = engine(Direction::Outbound);
        let mut arb = CaptureArbiter::new(DIAG);

        for beat in [RequestBeat {
            first: true,
            last: true,
            write_enable: true,
            length_dw: 2,
            data: 0xAAAA_BBBB_CCCC_DDDD,
            ..RequestBeat::default()
        }] {
            inb.observe(Some(&beat), None);
        }
        let frame = arb.poll(&mut inb, &mut out).unwrap();

        assert_eq!(frame.payload.len(), (HEADER_WORDS_32 + 2) * 4);
        let tail = &frame.payload[HEADER_WORDS_32 * 4..];
        assert_eq!(&tail[..4], 0xCCCC_DDDDu32.to_le_bytes());
        assert_eq!(&tail[4..], 0xAAAA_BBBBu32.to_le_bytes());
    }

    #[test]
    fn odd_length_discards_final_upper_half() {
        let mut inb = engine(Direction::Inbound);
        let mut out = engine(Direction::Outbound);
        let mut arb = CaptureArbiter::new(DIAG);

        inb.observe(
            Some(&RequestBeat {
                first: true,
                last: true,
                write_enable: true,
                length_dw: 1,
                data: 0xFFFF_FFFF_1234_5678,
                ..RequestBeat::default()
            }),
            None,
        );
        let frame = arb.poll(&mut inb, &mut out).unwrap();

        assert_eq!(frame.payload.len(), (HEADER_WORDS_32 + 1) * 4);
        let tail = &frame.payload[HEADER_WORDS_32 * 4..];
        assert_eq!(tail, 0x1234_5678u32.to_le_bytes());
    }

    #[test]
    fn inbound_has_priority_at_packet_boundaries() {
        let mut inb = engine(Direction::Inbound);
        let mut out = engine(Direction::Outbound);
        let mut arb = CaptureArbiter::new(DIAG);

        out.observe(Some(&read_request(0x100)), None);
        inb.observe(Some(&read_request(0x200)), None);

        let first = arb.poll(&mut inb, &mut out).unwrap();
        assert_eq!(header_of(&first).direction, Direction::Inbound);
        let second = arb.poll(&mut inb, &mut out).unwrap();
        assert_eq!(header_of(&second).direction, Direction::Outbound);
    }

    #[test]
    fn packets_are_atomic_across_polls() {
        // A 1-deep payload buffer commits an outbound record that still
        // owes 2 of its 4 declared DWs, pinning the arbiter mid-packet.
        let mut inb = engine(Direction::Inbound);
        let mut out = CaptureEngine::new(
            Direction::Outbound,
            CaptureEngineConfig {
                header_depth: 8,
                payload_depth: 1,
            },
        );
        out.set_enabled(true);
        let mut arb = CaptureArbiter::new(DIAG);

        for beat in write_beats(0x300, 2, 4) {
            out.observe(Some(&beat), None);
        }
        assert!(arb.poll(&mut inb, &mut out).is_none());
        assert!(arb.is_busy());

        // An inbound record arriving mid-packet must wait its turn.
        inb.observe(Some(&read_request(0x400)), None);
        assert!(arb.poll(&mut inb, &mut out).is_none());

        // The next outbound transaction's beats cover the shortfall.
        for beat in write_beats(0x310, 2, 4) {
            out.observe(Some(&beat), None);
        }
        let frame = arb.poll(&mut inb, &mut out).unwrap();
        assert_eq!(header_of(&frame).direction, Direction::Outbound);
        assert_eq!(frame.payload.len(), (HEADER_WORDS_32 + 4) * 4);

        let next = arb.poll(&mut inb, &mut out).unwrap();
        assert_eq!(header_of(&next).address, 0x400);
        assert!(!arb.is_busy());
    }

    #[test]
    fn truncated_record_holds_arbiter_until_beats_cover_the_debt() {
        // Payload buffer takes only 2 of 3 beats, so the committed record
        // declares 6 DWs but only 4 are available.
        let mut inb = CaptureEngine::new(
            Direction::Inbound,
            CaptureEngineConfig {
                header_depth: 8,
                payload_depth: 2,
            },
        );
        inb.set_enabled(true);
        let mut out = engine(Direction::Outbound);
        let mut arb = CaptureArbiter::new(DIAG);

        for beat in write_beats(0x500, 3, 6) {
            inb.observe(Some(&beat), None);
        }
        assert_eq!(inb.stats().truncated, 1);
        assert!(arb.poll(&mut inb, &mut out).is_none());
        assert!(arb.is_busy());

        // Beats from the next transaction cover the shortfall; the frame
        // completes at its declared length, misaligned but bounded.
        for beat in write_beats(0x600, 2, 4) {
            inb.observe(Some(&beat), None);
        }
        let frame = arb.poll(&mut inb, &mut out).unwrap();
        assert_eq!(frame.payload.len(), (HEADER_WORDS_32 + 6) * 4);
        assert!(header_of(&frame).truncated);
    }
}
