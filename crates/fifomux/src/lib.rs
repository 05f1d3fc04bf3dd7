//! Word-oriented FIFO link multiplexer.
//!
//! fifomux turns a chip-style synchronous FIFO bus into framed, multiplexed
//! logical channels, with an optional non-intrusive diagnostic capture
//! stream merged onto its own channel.
//!
//! # Crate Structure
//!
//! - [`link`] — Bus-turnaround state machine and cross-domain word queues
//! - [`frame`] — Preamble-delimited frame codec with watchdog recovery
//! - [`crossbar`] — Per-channel queues, round-robin egress, id-routed ingress
//! - [`capture`] — Transaction capture engines and diagnostic stream arbiter
//! - [`core`] — The assembled tick-driven pipeline
//! - [`config`] — Validated JSON-loadable configuration

/// Re-export link types.
pub mod link {
    pub use fifomux_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fifomux_frame::*;
}

/// Re-export crossbar types.
pub mod crossbar {
    pub use fifomux_crossbar::*;
}

/// Re-export capture types.
pub mod capture {
    pub use fifomux_capture::*;
}

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::{ConfigError, CoreConfig};
pub use crate::core::{Core, CoreError, CoreStats};
