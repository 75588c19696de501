// Logging for gminer
//
// Text or JSON lines, written to stderr, a log file, or both, each destination
// with its own level. Mining progress is logged from worker threads, so the log
// file handle is shared behind a mutex and opened once.
//
// ```
// let config = LogConfig {
//     console_level: LevelFilter::Info,
//     file_level: Some(LevelFilter::Debug),
//     format: LogFormat::Json,
//     destination: LogDestination::Both(PathBuf::from("gminer.log")),
// };
// init_logger(config)?;
// ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogDestination {
    #[default]
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl LogDestination {
    fn file_path(&self) -> Option<&Path> {
        match self {
            LogDestination::Console => None,
            LogDestination::File(path) | LogDestination::Both(path) => Some(path),
        }
    }

    fn includes_console(&self) -> bool {
        !matches!(self, LogDestination::File(_))
    }
}

/// One JSON log line
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    /// Module that emitted the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

impl LogConfig {
    /// Most verbose level any destination accepts
    pub fn max_level(&self) -> LevelFilter {
        let console = if self.destination.includes_console() {
            self.console_level
        } else {
            LevelFilter::Off
        };
        match self.file_level {
            Some(file_level) if self.destination.file_path().is_some() => console.max(file_level),
            _ => console,
        }
    }
}

pub struct MinerLogger {
    config: LogConfig,
    file: Option<Mutex<File>>,
}

impl MinerLogger {
    /// Create the logger, opening the log file (in append mode) if one is configured.
    pub fn new(config: LogConfig) -> Result<Self> {
        let file = match config.destination.file_path() {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self { config, file })
    }

    fn format_timestamp() -> String {
        let now: DateTime<Local> = Local::now();
        now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_text(&self, level: Level, message: &str) -> String {
        format!("{} [{}] {}", Self::format_timestamp(), level.as_str(), message)
    }

    fn format_json(&self, level: Level, target: &str, message: &str) -> Result<String> {
        let entry = JsonLogEntry {
            timestamp: Self::format_timestamp(),
            level: level.as_str().to_string(),
            message: message.to_string(),
            target: (!target.is_empty()).then(|| target.to_string()),
        };
        serde_json::to_string(&entry).context("Failed to serialize log entry")
    }

    fn console_accepts(&self, level: Level) -> bool {
        self.config.destination.includes_console() && level <= self.config.console_level
    }

    fn file_accepts(&self, level: Level) -> bool {
        self.file.is_some() && self.config.file_level.is_some_and(|file_level| level <= file_level)
    }

    fn write_file(&self, line: &str) -> io::Result<()> {
        match &self.file {
            Some(file) => writeln!(file.lock(), "{}", line),
            None => Ok(()),
        }
    }
}

impl log::Log for MinerLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.console_accepts(metadata.level()) || self.file_accepts(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = record.level();
        let message = record.args().to_string();
        let line = match self.config.format {
            LogFormat::Text => self.format_text(level, &message),
            LogFormat::Json => self
                .format_json(level, record.target(), &message)
                .unwrap_or_else(|_| self.format_text(level, &message)),
        };

        if self.console_accepts(level) {
            let _ = writeln!(io::stderr(), "{}", line);
        }
        if self.file_accepts(level) {
            if let Err(e) = self.write_file(&line) {
                // Keep the record rather than losing it
                eprintln!("Log file write failed: {}", e);
                eprintln!("{}", line);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Install [`MinerLogger`] as the global logger
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = config.max_level();
    let logger = MinerLogger::new(config)?;
    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(max_level);
    Ok(())
}

/// Convert a level name to a `LevelFilter`
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off",
            level
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use tempfile::TempDir;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("warning").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_log_level("DEBUG").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_log_level("off").unwrap(), LevelFilter::Off);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_max_level_ignores_unused_destinations() {
        let config = LogConfig {
            console_level: LevelFilter::Warn,
            file_level: Some(LevelFilter::Trace),
            format: LogFormat::Text,
            destination: LogDestination::Console,
        };
        assert_eq!(config.max_level(), LevelFilter::Warn);

        let config = LogConfig {
            destination: LogDestination::Both(PathBuf::from("x.log")),
            ..config
        };
        assert_eq!(config.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_global_logger_installs_once() {
        let config = LogConfig {
            console_level: LevelFilter::Error,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        };
        init_logger(config.clone()).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Error);
        assert!(init_logger(config).is_err());
    }

    #[test]
    fn test_text_format() {
        let logger = MinerLogger::new(LogConfig::default()).unwrap();
        let line = logger.format_text(Level::Warn, "branch skipped");
        assert!(line.ends_with("[WARN] branch skipped"));
        assert_eq!(line.chars().nth(4), Some('-'));
        assert_eq!(line.chars().nth(10), Some(' '));
        assert_eq!(line.chars().nth(13), Some(':'));
    }

    #[test]
    fn test_json_format_carries_target() {
        let logger = MinerLogger::new(LogConfig::default()).unwrap();
        let line = logger.format_json(Level::Info, "gminer::engine", "done").unwrap();
        let entry: JsonLogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(entry.level, "INFO");
        assert_eq!(entry.message, "done");
        assert_eq!(entry.target.as_deref(), Some("gminer::engine"));

        let line = logger.format_json(Level::Info, "", "done").unwrap();
        assert!(!line.contains("target"));
    }

    #[test]
    fn test_file_destination_receives_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("gminer.log");
        let logger = MinerLogger::new(LogConfig {
            console_level: LevelFilter::Off,
            file_level: Some(LevelFilter::Debug),
            format: LogFormat::Text,
            destination: LogDestination::File(path.clone()),
        })
        .unwrap();

        logger.log(
            &log::Record::builder()
                .level(Level::Debug)
                .args(format_args!("mined pair"))
                .build(),
        );
        logger.log(
            &log::Record::builder()
                .level(Level::Trace)
                .args(format_args!("too verbose"))
                .build(),
        );
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[DEBUG] mined pair"));
        assert!(!contents.contains("too verbose"));
    }
}
