use serde::{Deserialize, Serialize};

use fifomux_capture::{CaptureEngineConfig, MonitorConfig};
use fifomux_crossbar::CONTROL_CHANNEL;
use fifomux_link::LinkAdapterConfig;

/// Configuration mistakes caught before any traffic flows.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be non-zero")]
    ZeroDepth { field: &'static str },

    #[error("clk_freq_hz must be non-zero")]
    ZeroClockFrequency,

    #[error("frame_timeout_secs must be positive and finite")]
    InvalidTimeout,

    #[error("monitor channel {0:#04x} collides with the control channel")]
    MonitorChannelReserved(u8),

    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Link-side buffer sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSettings {
    pub queue_depth: usize,
    pub staging_depth: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        let d = LinkAdapterConfig::default();
        Self {
            queue_depth: d.queue_depth,
            staging_depth: d.staging_depth,
        }
    }
}

/// Diagnostic capture sizing and placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSettings {
    pub enabled: bool,
    /// Channel id carrying the merged capture stream.
    pub channel: u8,
    pub header_depth: usize,
    pub payload_depth: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let d = CaptureEngineConfig::default();
        Self {
            enabled: false,
            channel: MonitorConfig::default().channel,
            header_depth: d.header_depth,
            payload_depth: d.payload_depth,
        }
    }
}

/// Top-level core configuration.
///
/// The frame watchdog is specified in seconds against the link clock so
/// deployments at different clock rates get the same wall-clock recovery
/// behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Link clock frequency in Hz.
    pub clk_freq_hz: u64,
    /// Watchdog for partially received frames, in seconds.
    pub frame_timeout_secs: f64,
    /// Per-channel frame queue depth.
    pub channel_queue_depth: usize,
    pub link: LinkSettings,
    pub monitor: MonitorSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            clk_freq_hz: 100_000_000,
            frame_timeout_secs: 10.0,
            channel_queue_depth: 8,
            link: LinkSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Watchdog expiry in link-clock ticks.
    pub fn timeout_ticks(&self) -> u64 {
        (self.clk_freq_hz as f64 * self.frame_timeout_secs) as u64
    }

    pub fn link_config(&self) -> LinkAdapterConfig {
        LinkAdapterConfig {
            queue_depth: self.link.queue_depth,
            staging_depth: self.link.staging_depth,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let engines = CaptureEngineConfig {
            header_depth: self.monitor.header_depth,
            payload_depth: self.monitor.payload_depth,
        };
        MonitorConfig {
            channel: self.monitor.channel,
            inbound: engines,
            outbound: engines,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clk_freq_hz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }
        if !(self.frame_timeout_secs.is_finite() && self.frame_timeout_secs > 0.0) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.channel_queue_depth == 0 {
            return Err(ConfigError::ZeroDepth {
                field: "channel_queue_depth",
            });
        }
        if self.link.queue_depth == 0 {
            return Err(ConfigError::ZeroDepth {
                field: "link.queue_depth",
            });
        }
        if self.link.staging_depth == 0 {
            return Err(ConfigError::ZeroDepth {
                field: "link.staging_depth",
            });
        }
        if self.monitor.enabled {
            if self.monitor.channel == CONTROL_CHANNEL {
                return Err(ConfigError::MonitorChannelReserved(self.monitor.channel));
            }
            if self.monitor.header_depth == 0 {
                return Err(ConfigError::ZeroDepth {
                    field: "monitor.header_depth",
                });
            }
            if self.monitor.payload_depth == 0 {
                return Err(ConfigError::ZeroDepth {
                    field: "monitor.payload_depth",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CoreConfig::default().validate().unwrap();
    }

    #[test]
    fn timeout_ticks_scale_with_clock() {
        let mut config = CoreConfig::default();
        config.clk_freq_hz = 1_000;
        config.frame_timeout_secs = 0.5;
        assert_eq!(config.timeout_ticks(), 500);
    }

    #[test]
    fn parses_partial_json() {
        let config = CoreConfig::from_json(
            r#"{"clk_freq_hz": 60000000, "monitor": {"enabled": true, "channel": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.clk_freq_hz, 60_000_000);
        assert!(config.monitor.enabled);
        assert_eq!(config.monitor.channel, 2);
        // Unspecified fields keep their defaults.
        assert_eq!(config.channel_queue_depth, 8);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            CoreConfig::from_json(r#"{"clk_frequency": 1}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn monitor_may_not_take_the_control_channel() {
        let mut config = CoreConfig::default();
        config.monitor.enabled = true;
        config.monitor.channel = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MonitorChannelReserved(0))
        ));
        // A disabled monitor on channel 0 is never consulted.
        config.monitor.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn zero_depths_rejected() {
        let mut config = CoreConfig::default();
        config.link.staging_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDepth {
                field: "link.staging_depth"
            })
        ));
    }

    #[test]
    fn non_finite_timeout_rejected() {
        let mut config = CoreConfig::default();
        config.frame_timeout_secs = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
        config.frame_timeout_secs = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }
}
