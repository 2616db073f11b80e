//! Request ID generation.
//!
//! Every inbound request gets an ID that is attached to its records and spans
//! so related operations can be found together.

use uuid::Uuid;

use crate::core::fields::Value;

/// A unique identifier for one unit of inbound work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request ID (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use an ID supplied by a caller, e.g. from an `X-Request-Id` header.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&RequestId> for Value {
    fn from(id: &RequestId) -> Self {
        Value::Str(id.0.clone())
    }
}

impl From<RequestId> for Value {
    fn from(id: RequestId) -> Self {
        Value::Str(id.0)
    }
}
