use tilemesh_common::ComputeGrid;

/// Description of the device the host runtime simulates.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Core clock frequency in MHz.
    pub frequency_mhz: f64,
    /// Bytes reserved for recorded traces. A capture recording more is rejected.
    pub trace_region_size: u64,
    /// Full physical grid of compute cores.
    pub grid: ComputeGrid,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 1000.0,
            trace_region_size: 3855488,
            grid: ComputeGrid::new(8, 8),
        }
    }
}
