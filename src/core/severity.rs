//! Error severity classification
//!
//! Severity describes operator impact of an error and is independent of the
//! log level it is emitted at.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fields::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The user can fix this themselves and continue the operation
    Lowest,
    /// The user can fix this themselves but must restart the operation
    Low,
    /// May disrupt operation; the user may need support
    Medium,
    /// Disrupts operation; something outside the user's control must be fixed
    High,
    /// Major disruption with possible wider implications for the system
    Highest,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Lowest => "lowest",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Highest => "highest",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Severity> for Value {
    fn from(severity: Severity) -> Self {
        Value::Str(severity.as_str().to_string())
    }
}
