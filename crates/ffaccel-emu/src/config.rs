//! Hardware configuration injected into a buffer model
//!
//! Capacities and array geometry are never derived by the emulator; the
//! caller picks them (usually from a [`HardwareProfile`] preset) and the
//! buffer model records them at `configure` time.

use crate::error::{EmulatorError, Result};
use ffaccel_hw::{Activation, HardwareProfile};
use tracing::debug;

/// Hardware configuration for one evaluation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareConfig {
    /// Capacities and lane geometry
    pub profile: HardwareProfile,

    /// Activation unit wired into every lane
    pub activation: Activation,
}

impl HardwareConfig {
    /// Create configuration from explicit capacities and array geometry
    pub const fn new(
        input_capacity: usize,
        weight_capacity: usize,
        output_capacity: usize,
        lanes: usize,
        multipliers_per_lane: usize,
    ) -> Self {
        Self {
            profile: HardwareProfile {
                input_capacity,
                weight_capacity,
                output_capacity,
                lanes,
                multipliers_per_lane,
            },
            activation: Activation::Relu,
        }
    }

    /// Create configuration from a profile preset
    pub const fn from_profile(profile: HardwareProfile) -> Self {
        Self {
            profile,
            activation: Activation::Relu,
        }
    }

    /// Select the activation unit
    #[must_use]
    pub const fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Check the array geometry
    ///
    /// Capacities are checked at allocation time, and against each layer's
    /// tile shapes at evaluation time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the lane or multiplier count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.profile.lanes == 0 {
            return Err(EmulatorError::configuration("lane count (m_o) must be non-zero"));
        }
        if self.profile.multipliers_per_lane == 0 {
            return Err(EmulatorError::configuration(
                "multipliers per lane (m_i) must be non-zero",
            ));
        }
        debug!(
            "Hardware config: in={} w={} out={} m_o={} m_i={} act={}",
            self.profile.input_capacity,
            self.profile.weight_capacity,
            self.profile.output_capacity,
            self.profile.lanes,
            self.profile.multipliers_per_lane,
            self.activation
        );
        Ok(())
    }

    /// Input buffer capacity (elements)
    pub const fn input_capacity(&self) -> usize {
        self.profile.input_capacity
    }

    /// Weight buffer capacity (elements)
    pub const fn weight_capacity(&self) -> usize {
        self.profile.weight_capacity
    }

    /// Output buffer capacity (elements)
    pub const fn output_capacity(&self) -> usize {
        self.profile.output_capacity
    }

    /// Lane count (`m_o`)
    pub const fn lanes(&self) -> usize {
        self.profile.lanes
    }

    /// Multipliers per lane (`m_i`)
    pub const fn multipliers_per_lane(&self) -> usize {
        self.profile.multipliers_per_lane
    }

    /// Total multipliers (`m_o · m_i`)
    pub const fn total_multipliers(&self) -> usize {
        self.profile.total_multipliers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reference_profile() {
        let cfg = HardwareConfig::default();
        assert_eq!(cfg.profile, HardwareProfile::REFERENCE);
        assert_eq!(cfg.activation, Activation::Relu);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_lanes_rejected() {
        let cfg = HardwareConfig::new(3, 6, 2, 0, 2);
        assert!(matches!(cfg.validate(), Err(EmulatorError::Configuration { .. })));
    }

    #[test]
    fn zero_multipliers_rejected() {
        let cfg = HardwareConfig::new(3, 6, 2, 1, 0);
        assert!(matches!(cfg.validate(), Err(EmulatorError::Configuration { .. })));
    }

    #[test]
    fn activation_override() {
        let cfg = HardwareConfig::new(4, 16, 4, 2, 2).with_activation(Activation::Identity);
        assert_eq!(cfg.activation, Activation::Identity);
        assert_eq!(cfg.total_multipliers(), 4);
    }
}
