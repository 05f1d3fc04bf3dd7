//! Capture record layout: a fixed 256-bit header describing one observed
//! transaction. The bit packing must match the host-side decoder exactly.
//!
//! Word 0: payload length in 32-bit units [9:0], kind [13:10],
//!         direction [14], truncated [15], header word count [31:16],
//!         timestamp low [63:32].
//! Word 1: timestamp high [31:0], requester id [47:32], tag [55:48],
//!         first byte-enable [59:56], last byte-enable [63:60].
//! Word 2: 64-bit address.
//! Word 3: direction-specific bitfields (route/bar info inbound,
//!         PASID/privilege outbound, completion status/completer/count).

/// Fixed header size in 64-bit words.
pub const HEADER_WORDS_64: usize = 4;

/// Fixed header size in 32-bit link words.
pub const HEADER_WORDS_32: usize = HEADER_WORDS_64 * 2;

/// Monitored direction of a captured transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host → device.
    Inbound,
    /// Device → host.
    Outbound,
}

impl Direction {
    fn bit(self) -> u64 {
        match self {
            Direction::Inbound => 0,
            Direction::Outbound => 1,
        }
    }
}

/// Transaction kind encoding. The MSI-X and ATS codes are reserved for
/// the host-side decoder's benefit; the tap classifier only produces the
/// first four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    MemRead,
    MemWrite,
    Completion,
    CompletionData,
    MsiX,
    AtsRequest,
    AtsCompletion,
    AtsInvalidate,
    Unknown,
}

impl TransactionKind {
    pub fn code(self) -> u64 {
        match self {
            TransactionKind::MemRead => 0x0,
            TransactionKind::MemWrite => 0x1,
            TransactionKind::Completion => 0x2,
            TransactionKind::CompletionData => 0x3,
            TransactionKind::MsiX => 0x4,
            TransactionKind::AtsRequest => 0x5,
            TransactionKind::AtsCompletion => 0x6,
            TransactionKind::AtsInvalidate => 0x7,
            TransactionKind::Unknown => 0xF,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code & 0xF {
            0x0 => TransactionKind::MemRead,
            0x1 => TransactionKind::MemWrite,
            0x2 => TransactionKind::Completion,
            0x3 => TransactionKind::CompletionData,
            0x4 => TransactionKind::MsiX,
            0x5 => TransactionKind::AtsRequest,
            0x6 => TransactionKind::AtsCompletion,
            0x7 => TransactionKind::AtsInvalidate,
            _ => TransactionKind::Unknown,
        }
    }

    /// Whether this kind carries payload beats.
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            TransactionKind::MemWrite | TransactionKind::CompletionData
        )
    }
}

/// One committed capture record. Assembled incrementally across the beats
/// of a transaction and immutable once committed on the last beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub direction: Direction,
    pub kind: TransactionKind,
    pub timestamp: u64,
    pub requester_id: u16,
    pub tag: u8,
    /// First-word byte enables, 4 bits.
    pub first_be: u8,
    /// Last-word byte enables, 4 bits.
    pub last_be: u8,
    pub address: u64,
    pub write_enable: bool,
    /// Transaction attributes, 2 bits.
    pub attributes: u8,
    /// Address type, 2 bits.
    pub address_type: u8,
    /// Inbound only: route/BAR hit, 3 bits.
    pub bar_hit: u8,
    /// Outbound only: PASID present.
    pub pasid_valid: bool,
    /// Outbound only: PASID value, 20 bits.
    pub pasid: u32,
    /// Outbound requests only: privileged mode requested.
    pub privileged: bool,
    /// Outbound requests only: execute requested.
    pub execute: bool,
    /// Completions: status, 3 bits.
    pub status: u8,
    /// Completions: completer id.
    pub completer_id: u16,
    /// Completions: byte count, 12 bits.
    pub byte_count: u16,
    /// Payload length in 32-bit units, 10 bits; zero for payload-less kinds.
    pub payload_length_dw: u16,
    /// Set when at least one payload beat was rejected by the buffer.
    pub truncated: bool,
}

impl CaptureRecord {
    /// Pack into the 4×64-bit wire header.
    pub fn pack(&self) -> [u64; 4] {
        let word0 = (self.payload_length_dw as u64 & 0x3FF)
            | (self.kind.code() << 10)
            | (self.direction.bit() << 14)
            | ((self.truncated as u64) << 15)
            | ((HEADER_WORDS_64 as u64) << 16)
            | ((self.timestamp & 0xFFFF_FFFF) << 32);

        let word1 = (self.timestamp >> 32)
            | ((self.requester_id as u64) << 32)
            | ((self.tag as u64) << 48)
            | ((self.first_be as u64 & 0xF) << 56)
            | ((self.last_be as u64 & 0xF) << 60);

        let word2 = self.address;

        let common = (self.write_enable as u64)
            | ((self.attributes as u64 & 0x3) << 4)
            | ((self.address_type as u64 & 0x3) << 6)
            | ((self.completer_id as u64) << 32)
            | ((self.byte_count as u64 & 0xFFF) << 48);

        let word3 = match self.direction {
            Direction::Inbound => {
                common | ((self.bar_hit as u64 & 0x7) << 1) | ((self.status as u64 & 0x7) << 29)
            }
            Direction::Outbound => {
                // Bits 29/30 carry privilege/execute for requests; only
                // status bit 2 survives for outbound completions.
                common
                    | ((self.pasid_valid as u64) << 8)
                    | ((self.pasid as u64 & 0xF_FFFF) << 9)
                    | ((self.privileged as u64) << 29)
                    | ((self.execute as u64) << 30)
                    | (((self.status as u64 >> 2) & 0x1) << 31)
            }
        };

        [word0, word1, word2, word3]
    }

    /// Decode a wire header back into a record. Host-side counterpart of
    /// [`CaptureRecord::pack`]; payload length and flags come from word 0.
    pub fn unpack(words: [u64; 4]) -> Self {
        let [word0, word1, word2, word3] = words;
        let direction = if (word0 >> 14) & 1 == 0 {
            Direction::Inbound
        } else {
            Direction::Outbound
        };
        let (bar_hit, pasid_valid, pasid, privileged, execute, status) = match direction {
            Direction::Inbound => (
                ((word3 >> 1) & 0x7) as u8,
                false,
                0,
                false,
                false,
                ((word3 >> 29) & 0x7) as u8,
            ),
            Direction::Outbound => (
                0,
                (word3 >> 8) & 1 == 1,
                ((word3 >> 9) & 0xF_FFFF) as u32,
                (word3 >> 29) & 1 == 1,
                (word3 >> 30) & 1 == 1,
                (((word3 >> 31) & 0x1) << 2) as u8,
            ),
        };
        Self {
            direction,
            kind: TransactionKind::from_code(word0 >> 10),
            timestamp: ((word0 >> 32) & 0xFFFF_FFFF) | ((word1 & 0xFFFF_FFFF) << 32),
            requester_id: ((word1 >> 32) & 0xFFFF) as u16,
            tag: ((word1 >> 48) & 0xFF) as u8,
            first_be: ((word1 >> 56) & 0xF) as u8,
            last_be: ((word1 >> 60) & 0xF) as u8,
            address: word2,
            write_enable: word3 & 1 == 1,
            attributes: ((word3 >> 4) & 0x3) as u8,
            address_type: ((word3 >> 6) & 0x3) as u8,
            bar_hit,
            pasid_valid,
            pasid,
            privileged,
            execute,
            status,
            completer_id: ((word3 >> 32) & 0xFFFF) as u16,
            byte_count: ((word3 >> 48) & 0xFFF) as u16,
            payload_length_dw: (word0 & 0x3FF) as u16,
            truncated: (word0 >> 15) & 1 == 1,
        }
    }
}
