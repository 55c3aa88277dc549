use super::{GlobalConfig, profiling::ProfilingLogLevel, sweep::SweepLogLevel};
use core::fmt::Display;
use hashbrown::HashMap;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

/// Where the messages of one logging channel go.
///
/// Several outputs can be enabled at the same time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or truncate it (false).
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Forward messages to the `log` crate at this level.
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// Verbosity of the channel.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: Some(LogCrateLevel::Info),
            level: L::default(),
        }
    }
}

impl<L: LogLevel> LoggerConfig<L> {
    fn has_output(&self) -> bool {
        self.file.is_some() || self.stdout || self.stderr || self.log.is_some()
    }
}

/// Level of the messages forwarded to the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// `log::info!`
    #[default]
    #[serde(rename = "info")]
    Info,

    /// `log::debug!`
    #[serde(rename = "debug")]
    Debug,

    /// `log::trace!`
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Verbosity type of a [LoggerConfig].
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
    /// Whether the channel is turned off.
    fn is_disabled(&self) -> bool;
}

/// Routes the profiling and sweep channels to their configured outputs.
#[derive(Debug)]
pub struct Logger {
    loggers: Vec<LoggerKind>,
    profiling_index: Vec<usize>,
    sweep_index: Vec<usize>,
    /// Configuration the logger was built from.
    pub config: Arc<GlobalConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Hash, PartialEq, Eq)]
enum LoggerId {
    File(PathBuf),
    Stdout,
    Stderr,
    LogCrate(LogCrateLevel),
}

impl Logger {
    /// Create a logger from the [global configuration](GlobalConfig::get).
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Create a logger from an explicit configuration.
    ///
    /// Channels sharing an output share one writer, so a file listed twice is opened once.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let mut loggers = Vec::new();
        let mut ids = HashMap::<LoggerId, usize>::new();

        let profiling_index = match config.profiling.logger.level.is_disabled() {
            true => Vec::new(),
            false => register(&config.profiling.logger, &mut loggers, &mut ids),
        };
        let sweep_index = match config.sweep.logger.level.is_disabled() {
            true => Vec::new(),
            false => register(&config.sweep.logger, &mut loggers, &mut ids),
        };

        Self {
            loggers,
            profiling_index,
            sweep_index,
            config,
        }
    }

    /// Log a message on the profiling channel.
    pub fn log_profiling<S: Display>(&mut self, msg: &S) {
        Self::dispatch(&mut self.loggers, &self.profiling_index, msg)
    }

    /// Log a message on the sweep channel.
    pub fn log_sweep<S: Display>(&mut self, msg: &S) {
        Self::dispatch(&mut self.loggers, &self.sweep_index, msg)
    }

    /// Current profiling verbosity.
    pub fn log_level_profiling(&self) -> ProfilingLogLevel {
        self.config.profiling.logger.level
    }

    /// Current sweep verbosity.
    pub fn log_level_sweep(&self) -> SweepLogLevel {
        self.config.sweep.logger.level
    }

    fn dispatch<S: Display>(loggers: &mut [LoggerKind], indices: &[usize], msg: &S) {
        match indices {
            [] => {}
            [index] => loggers[*index].log(msg),
            indices => {
                let msg = msg.to_string();
                for index in indices {
                    loggers[*index].log(&msg);
                }
            }
        }
    }
}

fn register<L: LogLevel>(
    config: &LoggerConfig<L>,
    loggers: &mut Vec<LoggerKind>,
    ids: &mut HashMap<LoggerId, usize>,
) -> Vec<usize> {
    let mut indices = Vec::new();
    if !config.has_output() {
        return indices;
    }

    let mut add = |id: LoggerId, create: &dyn Fn() -> Option<LoggerKind>| {
        if let Some(index) = ids.get(&id) {
            indices.push(*index);
        } else if let Some(logger) = create() {
            let index = loggers.len();
            ids.insert(id, index);
            loggers.push(logger);
            indices.push(index);
        }
    };

    if let Some(file) = &config.file {
        add(LoggerId::File(file.clone()), &|| {
            FileLogger::new(file, config.append).map(LoggerKind::File)
        });
    }
    if config.stdout {
        add(LoggerId::Stdout, &|| Some(LoggerKind::Stdout));
    }
    if config.stderr {
        add(LoggerId::Stderr, &|| Some(LoggerKind::Stderr));
    }
    if let Some(level) = config.log {
        add(LoggerId::LogCrate(level), &|| Some(LoggerKind::Log(level)));
    }

    indices
}

#[derive(Debug)]
enum LoggerKind {
    File(FileLogger),
    Stdout,
    Stderr,
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

#[derive(Debug)]
struct FileLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileLogger {
    fn new(path: &PathBuf, append: bool) -> Option<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path);

        match file {
            Ok(file) => Some(Self {
                path: path.clone(),
                writer: BufWriter::new(file),
            }),
            Err(err) => {
                log::warn!("Can't open log file {}: {err}", path.display());
                None
            }
        }
    }

    fn log<S: Display>(&mut self, msg: &S) {
        let result = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush());
        if let Err(err) = result {
            log::warn!("Can't write to log file {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilemesh.log");

        let mut config = GlobalConfig::default();
        config.profiling.logger.file = Some(path.clone());
        config.profiling.logger.log = None;
        config.profiling.logger.level = ProfilingLogLevel::Basic;
        config.sweep.logger.file = Some(path.clone());
        config.sweep.logger.log = None;

        let mut logger = Logger::from_config(Arc::new(config));
        assert_eq!(logger.loggers.len(), 1);

        logger.log_profiling(&"profiling line");
        logger.log_sweep(&"sweep line");

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "profiling line\nsweep line\n");
    }

    #[test]
    fn disabled_channels_have_no_output() {
        let mut config = GlobalConfig::default();
        config.profiling.logger.level = ProfilingLogLevel::Disabled;
        config.sweep.logger.level = SweepLogLevel::Disabled;

        let logger = Logger::from_config(Arc::new(config));

        assert!(logger.loggers.is_empty());
        assert!(logger.profiling_index.is_empty());
        assert!(logger.sweep_index.is_empty());
    }
}
