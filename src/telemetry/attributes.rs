//! Conversion of fields into span attributes.

use opentelemetry::{Array, Key, KeyValue, StringValue};

use crate::core::fields::{Fields, Value};
use crate::core::keys;

/// Keys carried by the span itself and never duplicated as attributes.
pub const RESERVED_KEYS: [&str; 2] = [keys::SPAN_ID, keys::TRACE_ID];

/// Encode fields as span attributes, preserving order.
///
/// Scalars and homogeneous lists map to native attribute kinds; durations and
/// JSON values are stringified.
pub fn encode(fields: &Fields) -> Vec<KeyValue> {
    fields
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| KeyValue::new(Key::new(key.to_string()), to_otel(value)))
        .collect()
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|reserved| *reserved == key)
}

fn to_otel(value: &Value) -> opentelemetry::Value {
    use opentelemetry::Value as V;
    match value {
        Value::Bool(b) => V::Bool(*b),
        Value::Int(i) => V::I64(*i),
        Value::Float(f) => V::F64(*f),
        Value::Str(s) => V::String(s.clone().into()),
        Value::BoolList(v) => V::Array(Array::Bool(v.clone())),
        Value::IntList(v) => V::Array(Array::I64(v.clone())),
        Value::FloatList(v) => V::Array(Array::F64(v.clone())),
        Value::StrList(v) => V::Array(Array::String(
            v.iter().cloned().map(StringValue::from).collect(),
        )),
        Value::Duration(_) | Value::Json(_) => V::String(value.to_string().into()),
    }
}
