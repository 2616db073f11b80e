//! Postgres round-trip store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use super::{HeaderValues, RoundTripRecord, RoundTripStore};
use crate::error::O11yError;

const INSERT: &str = "INSERT INTO remote_api_requests \
    (url, method, status_code, request_body, request_headers, response_body, response_headers, response_time_ms) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const SELECT_LAST: &str = "SELECT url, method, status_code, request_body, request_headers, \
    response_body, response_headers, response_time_ms, created_at \
    FROM remote_api_requests ORDER BY id DESC LIMIT 1";

/// Stores round trips in the `remote_api_requests` table.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Create a pool for `con_str` and check that a connection can be made.
    pub async fn connect(con_str: &str) -> Result<Self, O11yError> {
        let mut cfg = Config::new();
        cfg.url = Some(con_str.to_string());

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| O11yError::Connect(e.to_string()))?;

        pool.get()
            .await
            .map_err(|e| O11yError::Connect(e.to_string()))?;

        tracing::debug!("Connected to round-trip store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("status", &self.pool.status())
            .finish()
    }
}

#[async_trait]
impl RoundTripStore for PostgresStore {
    async fn insert_round_trip(&self, record: &RoundTripRecord) -> Result<(), O11yError> {
        let request_headers = serde_json::to_value(&record.request_headers)?;
        let response_headers = serde_json::to_value(&record.response_headers)?;
        let response_time_ms = i64::try_from(record.duration.as_millis()).unwrap_or(i64::MAX);

        let client = self.pool.get().await?;
        client
            .execute(
                INSERT,
                &[
                    &record.url,
                    &record.method,
                    &record.status_code,
                    &record.request_body,
                    &request_headers,
                    &record.response_body,
                    &response_headers,
                    &response_time_ms,
                ],
            )
            .await?;
        Ok(())
    }

    async fn last_round_trip(&self) -> Result<Option<RoundTripRecord>, O11yError> {
        let client = self.pool.get().await?;
        let Some(row) = client.query_opt(SELECT_LAST, &[]).await? else {
            return Ok(None);
        };

        let request_headers: serde_json::Value = row.get("request_headers");
        let response_headers: serde_json::Value = row.get("response_headers");
        let response_time_ms: i64 = row.get("response_time_ms");
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Some(RoundTripRecord {
            url: row.get("url"),
            method: row.get("method"),
            status_code: row.get("status_code"),
            duration: Duration::from_millis(u64::try_from(response_time_ms).unwrap_or_default()),
            request_body: row.get("request_body"),
            response_body: row.get("response_body"),
            request_headers: serde_json::from_value::<HeaderValues>(request_headers)?,
            response_headers: serde_json::from_value::<HeaderValues>(response_headers)?,
            created_at: Some(created_at),
        }))
    }
}
