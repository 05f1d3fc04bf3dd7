//! Channel crossbar: N-to-1 egress arbitration and 1-to-N ingress dispatch.
//!
//! Each logical channel registers under a unique id at setup time; a
//! duplicate id is a fatal configuration error raised before any traffic
//! flows. Egress arbitration is round-robin and happens only at frame
//! boundaries — a selected frame completes atomically before the arbiter
//! reconsiders. Ingress frames are routed by channel id; an id with no
//! registered channel is dropped and counted.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::{debug, warn};

use fifomux_frame::Frame;
use fifomux_link::BoundedQueue;

/// Logical channel identifier (the low 8 bits of the header word).
pub type ChannelId = u8;

/// Channel 0 carries the register-access protocol by convention.
pub const CONTROL_CHANNEL: ChannelId = 0;

/// Default channel for diagnostic capture records.
pub const MONITOR_CHANNEL: ChannelId = 1;

/// Errors surfaced to the caller. Only configuration mistakes and visible
/// egress stalls reach here; runtime ingress anomalies degrade via
/// counters instead.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CrossbarError {
    /// The channel id is already registered.
    #[error("channel {0:#04x} already assigned")]
    ChannelInUse(ChannelId),

    /// The channel id was never registered.
    #[error("channel {0:#04x} not registered")]
    UnknownChannel(ChannelId),

    /// The channel's egress queue has no room for another frame.
    #[error("channel {0:#04x} egress queue full")]
    EgressFull(ChannelId),
}

pub type Result<T> = std::result::Result<T, CrossbarError>;

#[derive(Debug)]
struct ChannelQueues {
    egress: BoundedQueue<Frame>,
    ingress: BoundedQueue<Frame>,
}

/// Per-crossbar drop counters for silently-handled ingress anomalies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossbarStats {
    /// Ingress frames with no registered channel.
    pub unroutable: u64,
    /// Ingress frames dropped because the channel queue was full.
    pub ingress_overflow: u64,
}

/// Routes frames between registered channels and the single link.
#[derive(Debug)]
pub struct Crossbar {
    channels: BTreeMap<ChannelId, ChannelQueues>,
    /// Registration order, used for round-robin arbitration.
    order: Vec<ChannelId>,
    /// Index into `order` of the next channel to consider.
    rr_cursor: usize,
    queue_depth: usize,
    stats: CrossbarStats,
}

impl Crossbar {
    /// Create a crossbar whose per-channel queues hold `queue_depth` frames.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            channels: BTreeMap::new(),
            order: Vec::new(),
            rr_cursor: 0,
            queue_depth,
            stats: CrossbarStats::default(),
        }
    }

    /// Register a channel. Duplicate ids abort configuration.
    pub fn register(&mut self, id: ChannelId) -> Result<()> {
        if self.channels.contains_key(&id) {
            return Err(CrossbarError::ChannelInUse(id));
        }
        self.channels.insert(
            id,
            ChannelQueues {
                egress: BoundedQueue::new(self.queue_depth),
                ingress: BoundedQueue::new(self.queue_depth),
            },
        );
        self.order.push(id);
        debug!(channel = id, "channel registered");
        Ok(())
    }

    pub fn is_registered(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    pub fn stats(&self) -> CrossbarStats {
        self.stats
    }

    /// Queue a payload for transmission on a channel.
    pub fn send(&mut self, id: ChannelId, payload: impl Into<Bytes>) -> Result<()> {
        let queues = self
            .channels
            .get_mut(&id)
            .ok_or(CrossbarError::UnknownChannel(id))?;
        queues
            .egress
            .push(Frame::new(id, payload))
            .map_err(|_| CrossbarError::EgressFull(id))
    }

    /// Take the next received frame for a channel, if any.
    pub fn recv(&mut self, id: ChannelId) -> Result<Option<Frame>> {
        let queues = self
            .channels
            .get_mut(&id)
            .ok_or(CrossbarError::UnknownChannel(id))?;
        Ok(queues.ingress.pop())
    }

    /// Egress arbitration: pick the next ready channel's queued frame.
    ///
    /// Round-robin over registration order, advancing the cursor past the
    /// serviced channel. Called only at frame boundaries by construction —
    /// the returned frame is transmitted whole before the next call.
    pub fn next_egress(&mut self) -> Option<Frame> {
        if self.order.is_empty() {
            return None;
        }
        for offset in 0..self.order.len() {
            let idx = (self.rr_cursor + offset) % self.order.len();
            let id = self.order[idx];
            if let Some(frame) = self
                .channels
                .get_mut(&id)
                .and_then(|queues| queues.egress.pop())
            {
                self.rr_cursor = (idx + 1) % self.order.len();
                return Some(frame);
            }
        }
        None
    }

    /// Ingress dispatch: route a decoded frame to its channel's queue.
    ///
    /// Unroutable frames (unknown id) and frames arriving at a full queue
    /// are dropped with a counter; neither is an error.
    pub fn dispatch(&mut self, frame: Frame) {
        match self.channels.get_mut(&frame.channel) {
            Some(queues) => {
                let channel = frame.channel;
                if queues.ingress.push(frame).is_err() {
                    self.stats.ingress_overflow += 1;
                    warn!(channel, "ingress queue full, frame dropped");
                }
            }
            None => {
                self.stats.unroutable += 1;
                warn!(channel = frame.channel, "unroutable frame dropped");
            }
        }
    }
}
