use super::{
    benchmark::BenchmarkConfig, device::DeviceConfig, profiling::ProfilingConfig,
    sweep::SweepConfig,
};
use std::{path::Path, sync::Arc};
use thiserror::Error;

/// Static mutex holding the global configuration, initialized as `None`.
static TILEMESH_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Names of the configuration files, searched in this order.
const CONFIG_FILE_NAMES: [&str; 2] = ["tilemesh.toml", "TileMesh.toml"];

/// Global configuration of tilemesh.
#[derive(Default, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Parameters shared by every benchmark case.
    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    /// Device simulated by the host runtime.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Profiling output.
    #[serde(default)]
    pub profiling: ProfilingConfig,

    /// Cases run by a sweep.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Errors raised while loading or saving a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file couldn't be read or written.
    #[error("Can't access the config file\nCaused by:\n  {0}")]
    Io(#[from] std::io::Error),

    /// The file isn't valid TOML for [GlobalConfig].
    #[error("The config file doesn't have the right format\nCaused by:\n  {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration can't be written as TOML.
    #[error("The config can't be serialized\nCaused by:\n  {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `tilemesh.toml` or `TileMesh.toml`
    /// in the current directory or its parents, then applies [environment
    /// overrides](Self::override_from_env). If no file is found, a default configuration is used.
    pub fn get() -> Arc<Self> {
        let mut state = TILEMESH_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = TILEMESH_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        Self::get().save(path)
    }

    /// Save this configuration to the provided file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_with(|key| std::env::var(key).ok())
    }

    /// Overrides configuration fields from the variables returned by `lookup`.
    ///
    /// - `TILEMESH_DEBUG_LOG`: `stdout`, `stderr`, `1`/`true` for `/tmp/tilemesh.log`, `0`/`false`
    ///   to disable, or any other value as a file path. Applies to every logging channel.
    /// - `TILEMESH_WARMUP`: number of warmup iterations.
    /// - `TILEMESH_ITERATIONS`: number of measured iterations.
    /// - `TILEMESH_REPORT`: path of the CSV report.
    pub fn override_with<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Self {
        use super::{profiling::ProfilingLogLevel, sweep::SweepLogLevel};

        if let Some(val) = lookup("TILEMESH_DEBUG_LOG") {
            self.profiling.logger.level = ProfilingLogLevel::Medium;
            self.sweep.logger.level = SweepLogLevel::Full;

            match val.as_str() {
                "stdout" => {
                    self.profiling.logger.stdout = true;
                    self.sweep.logger.stdout = true;
                }
                "stderr" => {
                    self.profiling.logger.stderr = true;
                    self.sweep.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = "/tmp/tilemesh.log";
                    self.profiling.logger.file = Some(file_path.into());
                    self.sweep.logger.file = Some(file_path.into());
                }
                "0" | "false" => {
                    self.profiling.logger.level = ProfilingLogLevel::Disabled;
                    self.sweep.logger.level = SweepLogLevel::Disabled;
                }
                file_path => {
                    self.profiling.logger.file = Some(file_path.into());
                    self.sweep.logger.file = Some(file_path.into());
                }
            }
        }

        if let Some(val) = lookup("TILEMESH_WARMUP") {
            match val.parse() {
                Ok(count) => self.benchmark.num_warmup_iterations = count,
                Err(err) => log::warn!("Ignoring TILEMESH_WARMUP={val}: {err}"),
            }
        }

        if let Some(val) = lookup("TILEMESH_ITERATIONS") {
            match val.parse() {
                Ok(count) => self.benchmark.num_measurement_iterations = count,
                Err(err) => log::warn!("Ignoring TILEMESH_ITERATIONS={val}: {err}"),
            }
        }

        if let Some(val) = lookup("TILEMESH_REPORT") {
            self.benchmark.report = val.into();
        }

        self
    }

    /// Loads configuration from a specified file path.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;

        Ok(config)
    }

    // Traverses up the directory tree until a configuration file is found or the root is reached.
    // A file with the wrong format is reported and skipped.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if !path.is_file() {
                    continue;
                }

                match Self::from_file_path(&path) {
                    Ok(config) => return config,
                    Err(err) => log::warn!("Skipping {}: {err}", path.display()),
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{profiling::ProfilingLogLevel, sweep::SweepLogLevel};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn iteration_counts_are_overridden() {
        let config = GlobalConfig::default().override_with(lookup(&[
            ("TILEMESH_WARMUP", "2"),
            ("TILEMESH_ITERATIONS", "7"),
            ("TILEMESH_REPORT", "out.csv"),
        ]));

        assert_eq!(config.benchmark.num_warmup_iterations, 2);
        assert_eq!(config.benchmark.num_measurement_iterations, 7);
        assert_eq!(config.benchmark.report, PathBuf::from("out.csv"));
    }

    #[test]
    fn invalid_counts_are_ignored() {
        let config =
            GlobalConfig::default().override_with(lookup(&[("TILEMESH_ITERATIONS", "many")]));

        assert_eq!(config.benchmark.num_measurement_iterations, 100);
    }

    #[test]
    fn debug_log_routes_every_channel() {
        let config = GlobalConfig::default().override_with(lookup(&[("TILEMESH_DEBUG_LOG", "stderr")]));

        assert!(config.profiling.logger.stderr);
        assert!(config.sweep.logger.stderr);
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Medium);

        let config = GlobalConfig::default().override_with(lookup(&[("TILEMESH_DEBUG_LOG", "0")]));
        assert_eq!(config.sweep.logger.level, SweepLogLevel::Disabled);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilemesh.toml");

        let mut config = GlobalConfig::default();
        config.benchmark.num_warmup_iterations = 1;
        config.device.frequency_mhz = 1200.0;
        config.save(&path).unwrap();

        assert_eq!(GlobalConfig::from_file_path(&path).unwrap(), config);
    }

    #[test]
    fn partial_files_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilemesh.toml");
        std::fs::write(&path, "[benchmark]\nnum_measurement_iterations = 3\n").unwrap();

        let config = GlobalConfig::from_file_path(&path).unwrap();

        assert_eq!(config.benchmark.num_measurement_iterations, 3);
        assert_eq!(config.benchmark.num_warmup_iterations, 5);
        assert_eq!(config.device, DeviceConfig::default());
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilemesh.toml");
        std::fs::write(&path, "[benchmark\n").unwrap();

        assert!(matches!(
            GlobalConfig::from_file_path(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
