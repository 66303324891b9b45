//! Driver configuration

use std::time::Duration;

use ssprust_core::constants::{
    ADDRESS_MASK, FRAME_TIMEOUT, HOST_PROTOCOL_VERSION, MAX_RETRIES, POLL_INTERVAL,
};

/// Settings for one [`Device`](crate::Device)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ssprust::DeviceConfig;
///
/// let config = DeviceConfig::default()
///     .with_address(0)
///     .with_poll_interval(Duration::from_millis(200))
///     .with_debug(true);
/// assert_eq!(config.retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device address carried in the sequence byte (0-127)
    pub address: u8,

    /// Total attempts per command when the link fails
    pub retries: usize,

    /// Time allowed for one reply frame to arrive
    pub frame_timeout: Duration,

    /// Interval between polls while the validator is enabled
    pub poll_interval: Duration,

    /// Protocol version announced by the host
    pub protocol_version: u8,

    /// Log every exchange with its request and reply bytes
    pub debug: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: 0,
            retries: MAX_RETRIES,
            frame_timeout: FRAME_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            protocol_version: HOST_PROTOCOL_VERSION,
            debug: false,
        }
    }
}

impl DeviceConfig {
    /// Set device address; only the low 7 bits are used
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address & ADDRESS_MASK;
        self
    }

    /// Set total attempts per command (at least one)
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Set reply frame timeout
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set host protocol version
    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Enable exchange logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.address, 0);
        assert_eq!(config.retries, 3);
        assert_eq!(config.frame_timeout, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(400));
        assert_eq!(config.protocol_version, 6);
        assert!(!config.debug);
    }

    #[test]
    fn test_builder_clamps() {
        let config = DeviceConfig::default().with_address(0x90).with_retries(0);
        assert_eq!(config.address, 0x10);
        assert_eq!(config.retries, 1);
    }
}
