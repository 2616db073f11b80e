//! Structured JSON record sink.
//!
//! Each record is one JSON object per line:
//!
//! ```text
//! {"time":"...","level":"INFO","source":{"file":"src/api.rs","line":42,"module":"api"},"msg":"...", ...fields}
//! ```

use std::io::{self, Write};
use std::panic::Location;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value as Json};
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::Configuration;
use crate::core::fields::Fields;
use crate::core::level::Level;

/// Keys written by the sink itself. Fields using these names are prefixed.
const BUILTIN_KEYS: [&str; 4] = ["time", "level", "source", "msg"];

/// Cloneable, thread-safe handle to the output stream.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write a complete line under a single lock.
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock().expect("mutex poisoned");
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl std::fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedWriter")
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().expect("mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().expect("mutex poisoned").flush()
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Writes levelled records with call-site attribution.
#[derive(Debug, Clone)]
pub struct RecordSink {
    writer: SharedWriter,
    min_level: Level,
    timestamps: bool,
    trim_paths: Vec<String>,
    trim_modules: Vec<String>,
}

impl RecordSink {
    pub fn new(writer: SharedWriter, config: &Configuration) -> Self {
        Self {
            writer,
            min_level: config.level,
            timestamps: config.timestamps,
            trim_paths: config.trim_paths.clone(),
            trim_modules: config.trim_modules.clone(),
        }
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Whether a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Write a record if `level` passes the minimum.
    pub fn write(
        &self,
        level: Level,
        msg: &str,
        fields: &Fields,
        caller: &Location<'_>,
    ) -> io::Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        let record = self.render(level, msg, fields, caller);
        let line = serde_json::to_vec(&record)?;
        self.writer.write_line(&line)
    }

    fn render(&self, level: Level, msg: &str, fields: &Fields, caller: &Location<'_>) -> Json {
        let mut record = Map::with_capacity(fields.len() + BUILTIN_KEYS.len());

        if self.timestamps {
            record.insert(
                "time".into(),
                Json::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }
        record.insert("level".into(), Json::String(level.label().into()));

        let mut source = Map::new();
        source.insert(
            "file".into(),
            Json::String(trim(caller.file(), &self.trim_paths)),
        );
        source.insert("line".into(), Json::from(caller.line()));
        source.insert(
            "module".into(),
            Json::String(trim(&module_of(caller.file()), &self.trim_modules)),
        );
        record.insert("source".into(), Json::Object(source));
        record.insert("msg".into(), Json::String(msg.into()));

        for (key, value) in fields.iter() {
            let key = if BUILTIN_KEYS.iter().any(|builtin| *builtin == key) {
                format!("field_{key}")
            } else {
                key.to_string()
            };
            record.insert(key, value.to_json());
        }

        Json::Object(record)
    }
}

/// Cut everything up to and including each configured substring.
fn trim(value: &str, patterns: &[String]) -> String {
    let mut out = value;
    for pattern in patterns.iter().filter(|p| !p.is_empty()) {
        if let Some(idx) = out.find(pattern.as_str()) {
            out = &out[idx + pattern.len()..];
        }
    }
    out.to_string()
}

/// Module path for a source file, e.g. `src/transport/logging.rs` -> `transport::logging`.
fn module_of(file: &str) -> String {
    let file = file.replace('\\', "/");
    let rel = match file.rfind("src/") {
        Some(idx) => &file[idx + 4..],
        None => file.rsplit('/').next().unwrap_or(&file),
    };
    let rel = rel
        .strip_suffix("/mod.rs")
        .or_else(|| rel.strip_suffix(".rs"))
        .unwrap_or(rel);
    rel.replace('/', "::")
}
