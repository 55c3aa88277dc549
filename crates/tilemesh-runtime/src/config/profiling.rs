use super::logger::{LogLevel, LoggerConfig};

/// Configuration of the profiling channel.
#[derive(Default, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProfilingConfig {
    /// Where profiling messages go.
    #[serde(default)]
    pub logger: LoggerConfig<ProfilingLogLevel>,
}

/// Amount of profiling information logged.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProfilingLogLevel {
    /// Nothing is logged.
    #[serde(rename = "disabled")]
    Disabled,
    /// Only the summary table at the end of a sweep.
    #[default]
    #[serde(rename = "basic")]
    Basic,
    /// The summary table and the timing of every case.
    #[serde(rename = "medium")]
    Medium,
    /// Everything above, plus the resolved program of every case.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for ProfilingLogLevel {
    fn is_disabled(&self) -> bool {
        matches!(self, ProfilingLogLevel::Disabled)
    }
}
