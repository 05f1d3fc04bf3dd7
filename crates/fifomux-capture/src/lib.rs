//! Non-intrusive diagnostic capture of a live transaction stream.
//!
//! One [`CaptureEngine`] per monitored direction taps request and completion
//! beats without ever backpressuring the source: a transaction is either
//! captured whole, captured truncated, or dropped whole — and each outcome
//! is counted. Committed records are fixed 256-bit headers plus variable
//! 64-bit payload, merged by the [`CaptureArbiter`] into channel frames on
//! the diagnostic channel (device→host only).
//!
//! The header for a transaction is committed only on its last beat, so the
//! payload length and truncated flag are always accurate — at the cost of a
//! large packet's header being invisible until the packet has fully passed.

pub mod arbiter;
pub mod engine;
pub mod monitor;
pub mod record;

pub use arbiter::CaptureArbiter;
pub use engine::{CaptureEngine, CaptureEngineConfig, CaptureStats, CompletionBeat, RequestBeat};
pub use monitor::{MonitorConfig, MonitorSubsystem, MonitorTaps};
pub use record::{CaptureRecord, Direction, TransactionKind, HEADER_WORDS_32, HEADER_WORDS_64};
