//! Configuration for PairLink sessions
//!
//! Grouped into small structs so each layer takes only the knobs it reads:
//! link retry cadence, session idle timeout, and channel buffer sizes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PairlinkError, Result};

// ----------------------------------------------------------------------------
// Link Config
// ----------------------------------------------------------------------------

/// Connection establishment and retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Fixed interval between outbound connection attempts while the data
    /// channel is down
    pub retry_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Config
// ----------------------------------------------------------------------------

/// Session lifecycle behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Log the user out after this long without a command
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Config
// ----------------------------------------------------------------------------

/// Buffer sizes for the inter-task channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
    pub effect_buffer_size: usize,
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 128,
            effect_buffer_size: 64,
            app_event_buffer_size: 64,
        }
    }
}

// ----------------------------------------------------------------------------
// Top-Level Config
// ----------------------------------------------------------------------------

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairlinkConfig {
    pub link: LinkConfig,
    pub session: SessionConfig,
    pub channels: ChannelConfig,
}

impl PairlinkConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.link.retry_interval.is_zero() {
            return Err(PairlinkError::config_error(
                "link.retry_interval must be non-zero",
            ));
        }
        if self.session.idle_timeout.is_zero() {
            return Err(PairlinkError::config_error(
                "session.idle_timeout must be non-zero",
            ));
        }
        if self.channels.command_buffer_size == 0
            || self.channels.event_buffer_size == 0
            || self.channels.effect_buffer_size == 0
            || self.channels.app_event_buffer_size == 0
        {
            return Err(PairlinkError::config_error(
                "channel buffer sizes must be non-zero",
            ));
        }
        Ok(())
    }

    /// Preset with short timeouts, for tests
    pub fn testing() -> Self {
        Self {
            link: LinkConfig {
                retry_interval: Duration::from_millis(100),
            },
            session: SessionConfig {
                idle_timeout: Duration::from_secs(2),
            },
            channels: ChannelConfig::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PairlinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.retry_interval, Duration::from_secs(5));
        assert_eq!(config.session.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let mut config = PairlinkConfig::default();
        config.link.retry_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_testing_preset_is_valid() {
        assert!(PairlinkConfig::testing().validate().is_ok());
    }
}
