//! Log levels
//!
//! Levels are ordered; a record is written only when its level is at or above
//! the configured minimum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing_subscriber::filter::LevelFilter;

/// Ordered log level.
///
/// The discriminants match the numeric ranks used by the JSON records, leaving
/// room between the standard levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i8)]
pub enum Level {
    /// Development-only output, disabled in staging and production
    Develop = -8,
    #[default]
    Debug = -4,
    Info = 0,
    Notice = 2,
    Warning = 4,
    Error = 8,
    Fatal = 12,
}

impl Level {
    /// All levels, lowest first.
    pub const ALL: [Level; 7] = [
        Level::Develop,
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Resolve a level name, case-insensitively.
    ///
    /// Unknown names resolve to [`Level::Debug`] so that a misconfigured level
    /// never silences logging.
    pub fn resolve(name: &str) -> Level {
        match name.trim().to_ascii_lowercase().as_str() {
            "develop" => Level::Develop,
            "debug" => Level::Debug,
            "info" => Level::Info,
            "notice" => Level::Notice,
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            "fatal" => Level::Fatal,
            _ => Level::Debug,
        }
    }

    /// Numeric rank of the level.
    pub fn rank(self) -> i8 {
        self as i8
    }

    /// Label written into the `level` field of a record.
    pub fn label(self) -> &'static str {
        match self {
            Level::Develop => "DEVELOP",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warning => "WARN",
            Level::Error => "ERR",
            Level::Fatal => "FATAL",
        }
    }

    /// Lowercase configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Level::Develop => "develop",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Notice => "notice",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Closest `tracing` filter for crate-internal diagnostics.
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Level::Develop => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info | Level::Notice => LevelFilter::INFO,
            Level::Warning => LevelFilter::WARN,
            Level::Error | Level::Fatal => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Level::resolve(s))
    }
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        Level::resolve(s)
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Level::resolve(&name))
    }
}
