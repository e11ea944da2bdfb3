//! A small leveled logger.
//!
//! Translated from the original implementation's hand-rolled `Log`/`Logger`
//! classes (`log.hpp`/`log.cpp`): a threshold level gates which messages are
//! written, `Debug`/`Info`/`Warn` go to stdout and `Error`/`Fatal` go to
//! stderr. Carried by value through constructors rather than a global
//! singleton (`spec.md` §9).

use std::fmt;
use std::str::FromStr;

/// Logging severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        };
        write!(f, "{s}")
    }
}

/// A leveled logger with a fixed threshold.
///
/// Cloning is cheap (the threshold is a `Copy` enum); a `Logger` can be
/// shared with the input-producer thread by value.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    threshold: LogLevel,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl Logger {
    #[must_use]
    pub const fn new(threshold: LogLevel) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub const fn enabled(&self, level: LogLevel) -> bool {
        // LogLevel's derived Ord matches declaration order (Debug < Info <
        // ... < Fatal), so a message prints when its own severity meets or
        // exceeds the configured threshold.
        self.threshold as u8 <= level as u8
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn info(&self, msg: impl fmt::Display) {
        self.log(LogLevel::Info, msg);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn error(&self, msg: impl fmt::Display) {
        self.log(LogLevel::Error, msg);
    }

    pub fn log(&self, level: LogLevel, msg: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        if level >= LogLevel::Error {
            eprintln!("[{level}] {msg}");
        } else {
            println!("[{level}] {msg}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Fatal".parse::<LogLevel>().unwrap(), LogLevel::Fatal);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn threshold_gates_lower_severities() {
        let logger = Logger::new(LogLevel::Warn);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Warn));
        assert!(logger.enabled(LogLevel::Error));
    }

    #[test]
    fn ordering_matches_declared_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }
}
