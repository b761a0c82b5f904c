//! Log writer module
//!
//! Provides thread-safe leveled log writing to a file or stdout/stderr.
//! Write failures fall back to stderr and are never reported to callers.

use chrono::Local;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Severity of a log message, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Severe,
}

impl Level {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "severe" | "error" => Ok(Self::Severe),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output target
enum LogTarget {
    /// Info to stdout, warnings and severe to stderr
    Console,
    /// Append everything to a file
    File(Mutex<File>),
}

/// Thread-safe leveled log writer
pub struct LogWriter {
    min_level: Level,
    target: LogTarget,
}

impl LogWriter {
    /// Create a new log writer with an optional file path
    fn new(min_level: Level, log_file: Option<&str>) -> io::Result<Self> {
        let target = match log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Console,
        };
        Ok(Self { min_level, target })
    }

    /// Write a message at the given level, dropping it if below the threshold
    pub fn write(&self, level: Level, message: &str) {
        if level < self.min_level {
            return;
        }
        let line = format_line(level, message);
        match &self.target {
            LogTarget::Console => write_console(level, &line),
            LogTarget::File(file) => {
                let written = file
                    .lock()
                    .map_err(|_| io::Error::other("log file lock poisoned"))
                    .and_then(|mut f| writeln!(f, "{line}"));
                if let Err(e) = written {
                    eprintln!("[logger] failed to write log file ({e}): {line}");
                }
                if level == Level::Severe {
                    eprintln!("{line}");
                }
            }
        }
    }
}

/// Render one log line with a local timestamp
pub fn format_line(level: Level, message: &str) -> String {
    format!(
        "[{}] [{level}] {message}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    )
}

/// Write a formatted line to the console stream matching its level
pub fn write_console(level: Level, line: &str) {
    if level == Level::Info {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global log writer
///
/// This should be called once at application startup.
/// Returns error if the log file cannot be opened.
pub fn init(min_level: Level, log_file: Option<&str>) -> io::Result<()> {
    let writer = LogWriter::new(min_level, log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if initialized
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}
