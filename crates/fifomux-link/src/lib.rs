//! Link adapter for a synchronous-FIFO chip interface.
//!
//! This crate models the I/O-facing edge of the bridge: a state machine that
//! converts the chip's asynchronous, non-flow-controlled FIFO bus into a
//! clean word stream, plus the bounded queues that carry words between the
//! link clock domain and the core clock domain.
//!
//! The timing contract matters more than the throughput here:
//! - inbound data and its valid flag are registered, so a word sampled on
//!   tick N is visible to the core side on tick N+1;
//! - outbound data is pre-fetched one tick before the write strobe asserts;
//! - every aborted transfer attempt is followed by a fixed two-tick cooldown
//!   before re-arbitration.

pub mod adapter;
pub mod queue;

pub use adapter::{FifoBus, LinkAdapter, LinkAdapterConfig, LinkInputs, LinkOutputs, LinkState};
pub use queue::{BoundedQueue, Full};

/// Fixed-width transfer unit on the link and inside frames.
pub type Word = u32;

/// Bytes per [`Word`].
pub const WORD_BYTES: usize = 4;
