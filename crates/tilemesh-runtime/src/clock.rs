use crate::config::DeviceConfig;

/// Source of the device clock frequency used to convert time into cycles.
pub trait ClockSource {
    /// Clock frequency in MHz.
    fn frequency_mhz(&self) -> f64;
}

/// A clock source reporting a constant frequency.
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct FixedClock {
    frequency_mhz: f64,
}

impl FixedClock {
    /// The frequency declared in the device configuration.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.frequency_mhz)
    }
}

impl ClockSource for FixedClock {
    fn frequency_mhz(&self) -> f64 {
        self.frequency_mhz
    }
}
