use bytes::Bytes;
use tracing::{debug, warn};

use fifomux_capture::{CaptureStats, Direction, MonitorSubsystem, MonitorTaps};
use fifomux_crossbar::{ChannelId, Crossbar, CrossbarError, CrossbarStats, CONTROL_CHANNEL};
use fifomux_frame::{Depacketizer, DepacketizerStats, Frame, Packetizer};
use fifomux_link::{FifoBus, LinkAdapter};

use crate::config::{ConfigError, CoreConfig};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crossbar(#[from] CrossbarError),

    #[error(transparent)]
    Frame(#[from] fifomux_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Aggregated health counters across the pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Inbound words lost at the link staging buffer.
    pub link_overflow_lost: u64,
    pub depacketizer: DepacketizerStats,
    pub crossbar: CrossbarStats,
}

/// The full device-side data plane behind one FIFO bus.
///
/// Wires the link adapter, the frame codec pair, the channel crossbar,
/// and (when configured) the diagnostic monitor into a single
/// tick-driven pipeline. One [`Core::tick`] advances every stage by one
/// link-clock cycle:
///
/// ```text
/// channels ── packetizer ──▶ link adapter ──▶ bus
/// channels ◀─ crossbar ◀── depacketizer ◀── link adapter
///                ▲
///        monitor frames (diagnostic channel)
/// ```
#[derive(Debug)]
pub struct Core {
    link: LinkAdapter,
    packetizer: Packetizer,
    depacketizer: Depacketizer,
    crossbar: Crossbar,
    monitor: Option<MonitorSubsystem>,
    /// Assembled monitor frame waiting for egress room.
    monitor_holdover: Option<Frame>,
}

impl Core {
    /// Build the pipeline from a validated configuration. The control
    /// channel and, when enabled, the diagnostic channel are registered
    /// up front.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let mut crossbar = Crossbar::new(config.channel_queue_depth);
        crossbar.register(CONTROL_CHANNEL)?;

        let monitor = if config.monitor.enabled {
            crossbar.register(config.monitor.channel)?;
            Some(MonitorSubsystem::new(config.monitor_config()))
        } else {
            None
        };

        debug!(
            clk_freq_hz = config.clk_freq_hz,
            timeout_ticks = config.timeout_ticks(),
            monitor = config.monitor.enabled,
            "core assembled"
        );
        Ok(Self {
            link: LinkAdapter::new(config.link_config()),
            packetizer: Packetizer::new(),
            depacketizer: Depacketizer::new(config.timeout_ticks()),
            crossbar,
            monitor,
            monitor_holdover: None,
        })
    }

    /// Register an application channel.
    pub fn register_channel(&mut self, id: ChannelId) -> Result<()> {
        self.crossbar.register(id)?;
        Ok(())
    }

    /// Queue a payload for transmission to the host on a channel.
    pub fn send(&mut self, id: ChannelId, payload: impl Into<Bytes>) -> Result<()> {
        self.crossbar.send(id, payload)?;
        Ok(())
    }

    /// Take the next frame received from the host on a channel.
    pub fn recv(&mut self, id: ChannelId) -> Result<Option<Frame>> {
        Ok(self.crossbar.recv(id)?)
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            link_overflow_lost: self.link.overflow_lost(),
            depacketizer: self.depacketizer.stats(),
            crossbar: self.crossbar.stats(),
        }
    }

    /// Capture outcome counters for one direction; `None` when the
    /// monitor is not configured.
    pub fn capture_stats(&self, direction: Direction) -> Option<CaptureStats> {
        self.monitor.as_ref().map(|mon| mon.stats(direction))
    }

    pub fn clear_capture_stats(&mut self, direction: Direction) {
        if let Some(mon) = self.monitor.as_mut() {
            mon.clear_stats(direction);
        }
    }

    pub fn set_capture_enabled(&mut self, direction: Direction, enabled: bool) {
        if let Some(mon) = self.monitor.as_mut() {
            match direction {
                Direction::Inbound => mon.set_inbound_enabled(enabled),
                Direction::Outbound => mon.set_outbound_enabled(enabled),
            }
        }
    }

    /// Advance the whole pipeline by one link-clock cycle.
    pub fn tick(&mut self, bus: &mut dyn FifoBus, taps: MonitorTaps) {
        if let Some(mon) = self.monitor.as_mut() {
            mon.tick(taps);
            if self.monitor_holdover.is_none() {
                self.monitor_holdover = mon.poll_frame();
            }
        }
        if let Some(frame) = self.monitor_holdover.take() {
            match self.crossbar.send(frame.channel, frame.payload.clone()) {
                Ok(()) => {}
                Err(CrossbarError::EgressFull(_)) => {
                    // Egress congested: hold the frame, retry next tick.
                    self.monitor_holdover = Some(frame);
                }
                Err(err) => {
                    warn!(%err, "diagnostic frame unroutable, dropped");
                }
            }
        }

        // Outbound: keep the link queue fed, reloading the packetizer at
        // frame boundaries from the round-robin arbiter.
        while self.link.outbound_space() > 0 {
            if let Some(word) = self.packetizer.next_word() {
                // Space checked above.
                let _ = self.link.push_outbound(word);
            } else if let Some(frame) = self.crossbar.next_egress() {
                // The packetizer is idle whenever next_word is exhausted.
                let _ = self.packetizer.load(&frame);
            } else {
                break;
            }
        }

        self.link.tick(bus);

        // Inbound: one word per cycle through the streaming decoder; the
        // watchdog keeps counting on quiet cycles.
        match self.link.pop_inbound() {
            Some(word) => {
                if let Some(frame) = self.depacketizer.push_word(word) {
                    self.crossbar.dispatch(frame);
                }
            }
            None => self.depacketizer.idle_tick(),
        }
    }
}
