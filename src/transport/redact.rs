//! Header redaction.

use http::header::{HeaderValue, AUTHORIZATION, COOKIE};
use http::HeaderMap;

use crate::core::fields::Value;
use crate::store::HeaderValues;

/// Replacement value for sensitive headers.
pub const REDACTED: &str = "REDACTED";

/// Copy of `headers` with `Authorization` and `Cookie` replaced by [`REDACTED`].
///
/// All other headers are copied unchanged, including repeated values.
pub fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for name in headers.keys() {
        if *name == AUTHORIZATION || *name == COOKIE {
            out.insert(name.clone(), HeaderValue::from_static(REDACTED));
            continue;
        }
        for value in headers.get_all(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Header names mapped to their values. Non-UTF-8 values are converted lossily.
pub fn headers_to_map(headers: &HeaderMap) -> HeaderValues {
    let mut map = HeaderValues::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Redacted headers as a structured field value.
pub fn redacted_field(headers: &HeaderMap) -> Value {
    let map = headers_to_map(&redact_headers(headers));
    Value::Json(serde_json::to_value(map).unwrap_or_default())
}
