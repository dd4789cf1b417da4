//! Frame manager configuration.

use std::time::Duration;

/// Number of frame slots used when no explicit count is configured.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Default bound for the per-frame fence wait and image acquisition.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`FrameManager`](crate::FrameManager).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use redlilium_frame_sync::FrameConfig;
///
/// let config = FrameConfig::new()
///     .with_frames_in_flight(2)
///     .with_acquire_timeout(Duration::from_millis(250))
///     .with_label("main window");
/// assert_eq!(config.frames_in_flight, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Number of frame slots cycled by the frame manager.
    pub frames_in_flight: usize,
    /// Timeout used by [`FrameManager::start_frame_default`](crate::FrameManager::start_frame_default).
    pub acquire_timeout: Duration,
    /// Debug label prefixed to submission labels.
    pub label: Option<String>,
}

impl FrameConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight.
    ///
    /// # Panics
    ///
    /// Panics if `count` is 0.
    pub fn with_frames_in_flight(mut self, count: usize) -> Self {
        assert!(count > 0, "frames_in_flight must be at least 1");
        self.frames_in_flight = count;
        self
    }

    /// Set the default acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("frame")
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FrameConfig::default();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
        assert_eq!(config.label(), "frame");
    }

    #[test]
    fn test_builder() {
        let config = FrameConfig::new()
            .with_frames_in_flight(1)
            .with_label("offscreen");
        assert_eq!(config.frames_in_flight, 1);
        assert_eq!(config.label(), "offscreen");
    }

    #[test]
    #[should_panic(expected = "frames_in_flight must be at least 1")]
    fn test_zero_frames_panics() {
        let _ = FrameConfig::new().with_frames_in_flight(0);
    }
}
