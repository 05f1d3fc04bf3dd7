use tracing::{trace, warn};

use crate::queue::BoundedQueue;
use crate::Word;

/// External chip-style FIFO interface driven by the [`LinkAdapter`].
///
/// The peer offers no flow control at word granularity: when `rx_ready` is
/// high and the adapter is reading, a word is transferred every tick; when
/// the adapter strobes a write, the peer accepts it unconditionally.
pub trait FifoBus {
    /// Inbound data available (peer RX FIFO not empty).
    fn rx_ready(&self) -> bool;
    /// Transfer one inbound word. Called only while reading is active.
    fn rx_word(&mut self) -> Word;
    /// Peer accepts outbound words (peer TX FIFO not full).
    fn tx_ready(&self) -> bool;
    /// Deliver one outbound word under the write strobe.
    fn tx_word(&mut self, word: Word);
}

/// Link adapter bus-turnaround state machine.
///
/// RX needs three wait states and TX two before data moves; losing
/// readiness during any wait or active state aborts through a fixed
/// two-state cooldown back to [`LinkState::Idle`]. The cooldown is a
/// contract with the peer: a guaranteed idle gap after every aborted
/// attempt, never shortened by retrying the wait sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    RxWait1,
    RxWait2,
    RxWait3,
    RxActive,
    RxCooldown1,
    RxCooldown2,
    TxWait1,
    TxWait2,
    TxActive,
    TxCooldown1,
    TxCooldown2,
}

/// Inputs sampled at the start of a link tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInputs {
    /// Peer has inbound data to offer.
    pub rx_ready: bool,
    /// Peer accepts outbound words.
    pub tx_ready: bool,
    /// The adapter has an outbound word queued or latched.
    pub tx_pending: bool,
}

impl LinkState {
    /// Pure transition function. Inbound availability wins over outbound
    /// readiness when arbitrating from `Idle`.
    pub fn step(self, inputs: LinkInputs) -> LinkState {
        use LinkState::*;
        match self {
            Idle => {
                if inputs.rx_ready {
                    RxWait1
                } else if inputs.tx_ready && inputs.tx_pending {
                    TxWait1
                } else {
                    Idle
                }
            }
            RxWait1 => {
                if inputs.rx_ready {
                    RxWait2
                } else {
                    RxCooldown1
                }
            }
            RxWait2 => {
                if inputs.rx_ready {
                    RxWait3
                } else {
                    RxCooldown1
                }
            }
            RxWait3 => {
                if inputs.rx_ready {
                    RxActive
                } else {
                    RxCooldown1
                }
            }
            RxActive => {
                if inputs.rx_ready {
                    RxActive
                } else {
                    RxCooldown1
                }
            }
            RxCooldown1 => RxCooldown2,
            RxCooldown2 => Idle,
            TxWait1 => {
                if inputs.tx_ready {
                    TxWait2
                } else {
                    TxCooldown1
                }
            }
            TxWait2 => {
                if inputs.tx_ready {
                    TxActive
                } else {
                    TxCooldown1
                }
            }
            TxActive => {
                if inputs.tx_ready && inputs.tx_pending {
                    TxActive
                } else {
                    TxCooldown1
                }
            }
            TxCooldown1 => TxCooldown2,
            TxCooldown2 => Idle,
        }
    }
}

/// Per-tick control outputs, derived from adapter state.
///
/// Mirrors the observable bus signals: whether the adapter is driving the
/// shared data bus, and the read/write strobes. The write strobe is
/// registered and therefore lags its condition by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOutputs {
    pub drive_bus: bool,
    pub read_strobe: bool,
    pub write_strobe: bool,
}

/// Sizing for the adapter-owned queues.
#[derive(Debug, Clone, Copy)]
pub struct LinkAdapterConfig {
    /// Depth of each cross-domain queue, in words.
    pub queue_depth: usize,
    /// Depth of the link-domain inbound staging buffer, in words.
    pub staging_depth: usize,
}

impl Default for LinkAdapterConfig {
    fn default() -> Self {
        Self {
            queue_depth: 128,
            staging_depth: 4,
        }
    }
}

/// Converts the chip FIFO bus into a clean word stream.
///
/// Owns all cross-domain buffering: the core side pushes outbound words via
/// [`LinkAdapter::push_outbound`] and pops inbound words via
/// [`LinkAdapter::pop_inbound`]; [`LinkAdapter::tick`] advances one
/// link-clock cycle against the bus.
///
/// Inbound words are never refused at the bus — if the staging buffer
/// overflows because the core-side queue was not drained fast enough, the
/// word is lost and counted. Sizing the queues for the worst-case burst is
/// the caller's obligation, not an adapter error condition.
#[derive(Debug)]
pub struct LinkAdapter {
    state: LinkState,
    /// Link -> core words (cross-domain).
    inbound: BoundedQueue<Word>,
    /// Core -> link words (cross-domain).
    outbound: BoundedQueue<Word>,
    /// Small link-domain buffer absorbing the unstoppable RX burst.
    staging: BoundedQueue<Word>,
    /// Registered RX stage: word sampled last tick, delivered this tick.
    rx_pipe: Option<Word>,
    /// Pre-fetched outbound word, latched before the strobe asserts.
    tx_latch: Option<Word>,
    /// Write scheduled under the registered strobe for the next tick.
    pending_write: Option<Word>,
    overflow_lost: u64,
}

impl Default for LinkAdapter {
    fn default() -> Self {
        Self::new(LinkAdapterConfig::default())
    }
}

impl LinkAdapter {
    pub fn new(config: LinkAdapterConfig) -> Self {
        Self {
            state: LinkState::Idle,
            inbound: BoundedQueue::new(config.queue_depth),
            outbound: BoundedQueue::new(config.queue_depth),
            staging: BoundedQueue::new(config.staging_depth),
            rx_pipe: None,
            tx_latch: None,
            pending_write: None,
            overflow_lost: 0,
        }
    }

    /// Current state, for sequencing tests and debug.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Control outputs for the current tick.
    pub fn outputs(&self) -> LinkOutputs {
        use LinkState::*;
        let receiving = matches!(
            self.state,
            RxWait2 | RxWait3 | RxActive | RxCooldown1 | RxCooldown2
        );
        LinkOutputs {
            drive_bus: !receiving,
            read_strobe: matches!(self.state, RxWait3 | RxActive),
            write_strobe: self.pending_write.is_some(),
        }
    }

    /// Words lost to staging overflow since construction.
    pub fn overflow_lost(&self) -> u64 {
        self.overflow_lost
    }

    /// Core side: queue a word for transmission.
    pub fn push_outbound(&mut self, word: Word) -> Result<(), crate::queue::Full<Word>> {
        self.outbound.push(word)
    }

    /// Core side: room left in the outbound queue, in words.
    pub fn outbound_space(&self) -> usize {
        self.outbound.capacity() - self.outbound.len()
    }

    /// Core side: take the next received word, if any.
    pub fn pop_inbound(&mut self) -> Option<Word> {
        self.inbound.pop()
    }

    /// Advance one link-clock cycle against the bus.
    pub fn tick(&mut self, bus: &mut dyn FifoBus) {
        let rx_ready = bus.rx_ready();
        let tx_ready = bus.tx_ready();

        // Registered write strobe: the word latched last tick goes out now.
        if let Some(word) = self.pending_write.take() {
            bus.tx_word(word);
        }

        // Drain staging toward the core-domain queue, one word per tick.
        if !self.inbound.is_full() {
            if let Some(word) = self.staging.pop() {
                // Cannot fail: fullness checked above.
                let _ = self.inbound.push(word);
            }
        }

        // Registered RX stage: last tick's sample becomes visible.
        if let Some(word) = self.rx_pipe.take() {
            if self.staging.push(word).is_err() {
                self.overflow_lost += 1;
                warn!(word, lost = self.overflow_lost, "rx staging overflow, word lost");
            }
        }

        // Sample the bus. Reads happen only while active; the word lands in
        // the registered stage and surfaces next tick.
        if self.state == LinkState::RxActive && rx_ready {
            self.rx_pipe = Some(bus.rx_word());
        }

        match self.state {
            LinkState::TxActive if tx_ready => {
                if let Some(word) = self.tx_latch.take() {
                    self.pending_write = Some(word);
                }
                self.tx_latch = self.outbound.pop();
            }
            // Pre-fetch so data is stable one tick before the strobe.
            LinkState::TxWait2 if self.tx_latch.is_none() => {
                self.tx_latch = self.outbound.pop();
            }
            _ => {}
        }

        let next = self.state.step(LinkInputs {
            rx_ready,
            tx_ready,
            tx_pending: self.tx_latch.is_some() || !self.outbound.is_empty(),
        });
        if next != self.state {
            trace!(from = ?self.state, to = ?next, "link state");
        }
        self.state = next;
    }
}
