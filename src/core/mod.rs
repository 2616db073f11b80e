//! Core data model: levels, severities, fields and configuration

pub mod config;
pub mod fields;
pub mod keys;
pub mod level;
pub mod severity;

pub use config::{ConfigError, Configuration};
pub use fields::{Fields, Value};
pub use level::Level;
pub use severity::Severity;
