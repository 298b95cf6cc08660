//! Guardian configuration
//!
//! Deserializable from any serde format; missing fields take their defaults.

use crate::errors::{GuardianError, GuardianResult};

// ----------------------------------------------------------------------------
// Guardian Configuration
// ----------------------------------------------------------------------------

/// Configuration for a single guardian and its coordinating task
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Name attached to log events from the coordinating task
    pub name: String,
    /// Slots in the request channel. A request counts as accepted once it
    /// takes a free slot, even while the coordinating task is busy; callers
    /// only wait to enqueue (and can time out there) when every slot is taken.
    pub request_buffer_size: usize,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            name: "guardian".to_string(),
            request_buffer_size: 1, // Closest to rendezvous that mpsc allows
        }
    }
}

impl GuardianConfig {
    /// Configuration used by the test suites
    pub fn testing() -> Self {
        Self {
            name: "test-guardian".to_string(),
            request_buffer_size: 1,
        }
    }

    /// Larger request buffer for bursty writers
    pub fn high_throughput() -> Self {
        Self {
            name: "guardian".to_string(),
            request_buffer_size: 256,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_request_buffer_size(mut self, size: usize) -> Self {
        self.request_buffer_size = size;
        self
    }

    /// Reject settings the request channel cannot be built with
    pub fn validate(&self) -> GuardianResult<()> {
        if self.request_buffer_size == 0 {
            return Err(GuardianError::InvalidConfiguration {
                reason: "request_buffer_size must be at least 1".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(GuardianError::InvalidConfiguration {
                reason: "name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardian_config_defaults() {
        let config = GuardianConfig::default();
        assert_eq!(config.name, "guardian");
        assert_eq!(config.request_buffer_size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(GuardianConfig::testing().validate().is_ok());
        assert!(GuardianConfig::high_throughput().validate().is_ok());
        assert_eq!(GuardianConfig::high_throughput().request_buffer_size, 256);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = GuardianConfig::default().with_request_buffer_size(0);
        match config.validate() {
            Err(GuardianError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("request_buffer_size"));
            }
            other => panic!("Unexpected validation result: {:?}", other),
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let config = GuardianConfig::default().with_name("   ");
        assert!(matches!(
            config.validate(),
            Err(GuardianError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = GuardianConfig::default()
            .with_name("counter")
            .with_request_buffer_size(8);
        assert_eq!(config.name, "counter");
        assert_eq!(config.request_buffer_size, 8);
    }
}
