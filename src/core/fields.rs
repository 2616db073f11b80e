//! Structured fields attached to records and spans.
//!
//! A [`Fields`] set is an ordered list of `(key, Value)` pairs. Sets built by
//! [`Fields::merge`] hold each key at most once.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
    Duration(Duration),
    Json(serde_json::Value),
}

impl Value {
    /// Capture any displayable value as text.
    pub fn display(value: impl fmt::Display) -> Self {
        Value::Str(value.to_string())
    }

    /// Render the value for a JSON record.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => J::from(*f),
            Value::Str(s) => J::String(s.clone()),
            Value::BoolList(v) => J::from(v.clone()),
            Value::IntList(v) => J::from(v.clone()),
            Value::FloatList(v) => J::from(v.clone()),
            Value::StrList(v) => J::from(v.clone()),
            Value::Duration(d) => J::String(format!("{d:?}")),
            Value::Json(j) => j.clone(),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::BoolList(v) => write_list(f, v),
            Value::IntList(v) => write_list(f, v),
            Value::FloatList(v) => write_list(f, v),
            Value::StrList(v) => write_list(f, v),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::Json(j) => write!(f, "{j}"),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, isize, u8, u16, u32);

macro_rules! value_from_wide_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                match i64::try_from(v) {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Str(v.to_string()),
                }
            }
        })*
    };
}

value_from_wide_uint!(u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Cow<'_, str>> for Value {
    fn from(v: Cow<'_, str>) -> Self {
        Value::Str(v.into_owned())
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BoolList(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntList(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatList(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrList(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StrList(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// Field key.
pub type Key = Cow<'static, str>;

/// Ordered set of structured fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(Key, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a field, consuming and returning the set.
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a field without deduplicating.
    pub fn push(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        self.0.push((key.into(), value.into()));
    }

    /// Replace the value of `key` in place, or append it when absent.
    pub fn upsert(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    /// Last value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| &**k)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Build fields from a flat alternating key/value list.
    ///
    /// Keys are rendered with their `Display` form. An odd trailing element
    /// has no value and is dropped.
    pub fn from_alternating(values: Vec<Value>) -> Self {
        let mut out = Fields::new();
        let mut iter = values.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            let key = match key {
                Value::Str(s) => s,
                other => other.to_string(),
            };
            out.push(key, value);
        }
        out
    }

    /// Combine `stable` then `ephemeral` into a set with unique keys.
    ///
    /// Later entries overwrite earlier ones. Each key keeps the position of its
    /// first occurrence.
    pub fn merge(stable: &Fields, ephemeral: &Fields) -> Fields {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(stable.len() + ephemeral.len());
        let mut out: Vec<(Key, Value)> = Vec::with_capacity(stable.len() + ephemeral.len());

        for (key, value) in stable.0.iter().chain(ephemeral.0.iter()) {
            let name: &str = key;
            match index.get(name) {
                Some(&pos) => out[pos].1 = value.clone(),
                None => {
                    index.insert(name, out.len());
                    out.push((key.clone(), value.clone()));
                }
            }
        }

        Fields(out)
    }
}

impl From<()> for Fields {
    fn from(_: ()) -> Self {
        Fields::new()
    }
}

impl<K, V> From<Vec<(K, V)>> for Fields
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Fields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> Extend<(K, V)> for Fields
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.push(k, v);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        fields.extend(iter);
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (Key, Value);
    type IntoIter = std::vec::IntoIter<(Key, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Fields`] set from `key => value` pairs.
///
/// ```
/// let fields = o11y::fields! { "user" => "ada", "attempt" => 3 };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Fields::new()$(.with($key, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(fields: &Fields) -> Vec<&str> {
        fields.keys().collect()
    }

    #[test]
    fn test_merge_ephemeral_wins() {
        let stable = Fields::new().with("a", 1).with("b", 2);
        let ephemeral = Fields::new().with("b", 3).with("c", 4);

        let merged = Fields::merge(&stable, &ephemeral);

        assert_eq!(keys(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_merge_removes_duplicates_within_one_side() {
        let stable = Fields::new().with("k", "first").with("x", true).with("k", "second");
        let merged = Fields::merge(&stable, &Fields::new());

        assert_eq!(merged.len(), 2);
        assert_eq!(keys(&merged), vec!["k", "x"]);
        assert_eq!(merged.get("k"), Some(&Value::from("second")));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let stable = Fields::new().with("a", 1).with("b", "two");
        let ephemeral = Fields::new().with("a", 9).with("c", 1.5);

        let once = Fields::merge(&stable, &ephemeral);
        let twice = Fields::merge(&once, &ephemeral);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_empty_sides() {
        let merged = Fields::merge(&Fields::new(), &Fields::new());
        assert!(merged.is_empty());

        let only = Fields::new().with("a", 1);
        assert_eq!(Fields::merge(&only, &Fields::new()), only);
        assert_eq!(Fields::merge(&Fields::new(), &only), only);
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut fields = Fields::new().with("a", 1).with("b", 2);
        fields.upsert("a", 10);
        fields.upsert("c", 3);

        assert_eq!(keys(&fields), vec!["a", "b", "c"]);
        assert_eq!(fields.get("a"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_from_alternating_drops_odd_tail() {
        let fields = Fields::from_alternating(vec![
            Value::from("k1"),
            Value::from(1),
            Value::from("k2"),
        ]);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("k1"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_from_alternating_formats_non_string_keys() {
        let fields = Fields::from_alternating(vec![Value::from(42), Value::from("answer")]);
        assert_eq!(fields.get("42"), Some(&Value::from("answer")));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(vec![1i64, 2, 3]).to_string(), "[1 2 3]");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "[a b]");
        assert_eq!(Value::from(Duration::from_millis(1500)).to_string(), "1.5s");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::display('x').to_string(), "x");
    }

    #[test]
    fn test_wide_unsigned_overflow_becomes_text() {
        assert_eq!(Value::from(7u64), Value::Int(7));
        assert_eq!(Value::from(u64::MAX), Value::Str(u64::MAX.to_string()));
    }

    #[test]
    fn test_fields_macro() {
        let fields = crate::fields! { "user" => "ada", "attempt" => 3, "ok" => true };
        assert_eq!(keys(&fields), vec!["user", "attempt", "ok"]);

        let empty = crate::fields! {};
        assert!(empty.is_empty());
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::from(3).to_json(), serde_json::json!(3));
        assert_eq!(Value::from(vec![true, false]).to_json(), serde_json::json!([true, false]));
        assert_eq!(
            Value::from(serde_json::json!({"a": 1})).to_json(),
            serde_json::json!({"a": 1})
        );
    }
}
