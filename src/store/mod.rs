//! Persistence of outbound HTTP round trips.

pub mod memory;
pub mod migrate;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::O11yError;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Header names mapped to their values, after redaction.
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// One outbound call as persisted. The default value is the zero record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundTripRecord {
    pub url: String,
    pub method: String,
    pub status_code: i32,
    pub duration: Duration,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub request_headers: HeaderValues,
    pub response_headers: HeaderValues,
    /// Set by stores that timestamp rows on insert
    pub created_at: Option<DateTime<Utc>>,
}

impl RoundTripRecord {
    /// Body text, or `None` for an empty body.
    pub fn body_text(bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Backend that persists round-trip records.
#[async_trait]
pub trait RoundTripStore: Send + Sync {
    /// Persist one record.
    async fn insert_round_trip(&self, record: &RoundTripRecord) -> Result<(), O11yError>;

    /// Most recently persisted record, if any.
    async fn last_round_trip(&self) -> Result<Option<RoundTripRecord>, O11yError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_record() {
        let record = RoundTripRecord::default();
        assert!(record.url.is_empty());
        assert_eq!(record.status_code, 0);
        assert_eq!(record.duration, Duration::ZERO);
        assert!(record.request_body.is_none());
    }

    #[test]
    fn test_body_text() {
        assert_eq!(RoundTripRecord::body_text(b""), None);
        assert_eq!(RoundTripRecord::body_text(b"{}"), Some("{}".to_string()));
    }
}
