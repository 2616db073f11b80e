//! Well-known field names

pub const REQUEST_ID: &str = "request_id";
pub const REQUEST_METHOD: &str = "request_method";
pub const REQUEST_PATH: &str = "request_path";
pub const REQUEST_HEADERS: &str = "request_headers";
pub const REQUEST_URL: &str = "request_url";
pub const REQUEST_BODY: &str = "request_body";
pub const RESPONSE_HEADERS: &str = "response_headers";
pub const RESPONSE_BODY: &str = "response_body";
pub const CALL_DURATION: &str = "call_duration";
pub const STATUS_CODE: &str = "status_code";
pub const SPAN_ID: &str = "span_id";
pub const TRACE_ID: &str = "trace_id";
pub const REMOTE_TRACE_ID: &str = "remote_trace_id";
pub const REMOTE_SPAN_ID: &str = "remote_span_id";
pub const ENVIRONMENT: &str = "environment";
pub const ORIGIN: &str = "origin";
pub const ERROR: &str = "error";
pub const SEVERITY: &str = "severity";
