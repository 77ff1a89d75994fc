//! WebSocket hub configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Largest inbound frame we ever allow, regardless of configuration.
const MAX_FRAME_CEILING: usize = 1024 * 1024;

/// Largest per-connection send buffer we ever allow.
const MAX_OUTBOUND_BUFFER: usize = 65_536;

/// Limits and deadlines for hub connections
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Maximum inbound frame size in bytes; larger frames disconnect the client
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Frames buffered per connection before new ones are dropped
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Deadline for writing one frame, in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Interval between keepalive pings, in seconds
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Deadline for writing a ping, in milliseconds
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Silence tolerated from the peer before the connection is dropped, in
    /// seconds. Any inbound frame, pongs included, resets it.
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,

    /// Deadline for handling one inbound message, in milliseconds
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
}

impl WebSocketConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Validate hub limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_FRAME_CEILING {
            return Err(ValidationError::InvalidWebSocketLimit("max_frame_bytes"));
        }
        if self.outbound_buffer == 0 || self.outbound_buffer > MAX_OUTBOUND_BUFFER {
            return Err(ValidationError::InvalidWebSocketLimit("outbound_buffer"));
        }
        if self.write_timeout_ms == 0 {
            return Err(ValidationError::InvalidWebSocketLimit("write_timeout_ms"));
        }
        if self.handler_timeout_ms == 0 {
            return Err(ValidationError::InvalidWebSocketLimit("handler_timeout_ms"));
        }
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::InvalidWebSocketLimit("ping_interval_secs"));
        }
        // A ping must be able to finish before the next one is due.
        if self.ping_timeout_ms == 0 || self.ping_timeout() >= self.ping_interval() {
            return Err(ValidationError::InvalidWebSocketLimit("ping_timeout_ms"));
        }
        // The peer needs at least one ping to answer within the wait.
        if self.pong_wait_secs <= self.ping_interval_secs {
            return Err(ValidationError::InvalidWebSocketLimit("pong_wait_secs"));
        }
        Ok(())
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            outbound_buffer: default_outbound_buffer(),
            write_timeout_ms: default_write_timeout_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
            pong_wait_secs: default_pong_wait_secs(),
            handler_timeout_ms: default_handler_timeout_ms(),
        }
    }
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_ping_interval_secs() -> u64 {
    54
}

fn default_ping_timeout_ms() -> u64 {
    5_000
}

fn default_pong_wait_secs() -> u64 {
    60
}

fn default_handler_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WebSocketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_frame_bytes, 65_536);
        assert_eq!(config.outbound_buffer, 256);
        assert_eq!(config.ping_interval(), Duration::from_secs(54));
        assert_eq!(config.pong_wait(), Duration::from_secs(60));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let config = WebSocketConfig {
            outbound_buffer: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidWebSocketLimit("outbound_buffer"))
        ));
    }

    #[test]
    fn frame_limit_above_ceiling_is_rejected() {
        let config = WebSocketConfig {
            max_frame_bytes: MAX_FRAME_CEILING + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn ping_timeout_must_be_shorter_than_interval() {
        let config = WebSocketConfig {
            ping_interval_secs: 2,
            ping_timeout_ms: 2_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidWebSocketLimit("ping_timeout_ms"))
        ));
    }

    #[test]
    fn pong_wait_must_outlast_ping_interval() {
        let config = WebSocketConfig {
            ping_interval_secs: 30,
            pong_wait_secs: 30,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidWebSocketLimit("pong_wait_secs"))
        ));
    }
}
