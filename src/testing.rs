//! Shared helpers for unit tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

use crate::core::config::Configuration;
use crate::core::level::Level;
use crate::observer::{Observer, ObserverBuilder};
use crate::store::RoundTripStore;

/// In-memory record output.
#[derive(Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    /// Every line written so far, parsed as JSON.
    pub fn records(&self) -> Vec<serde_json::Value> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn builder(buffer: &Buffer, level: Level) -> ObserverBuilder {
    Observer::builder(
        Configuration::default()
            .with_level(level)
            .with_timestamps(false),
    )
    .output(buffer.clone())
}

pub fn capture() -> (Observer, Buffer) {
    let buffer = Buffer::default();
    (builder(&buffer, Level::Debug).build().unwrap(), buffer)
}

pub fn capture_with_store(store: Arc<dyn RoundTripStore>) -> (Observer, Buffer) {
    let buffer = Buffer::default();
    let observer = builder(&buffer, Level::Debug).store(store).build().unwrap();
    (observer, buffer)
}

pub fn capture_with_spans() -> (Observer, Buffer, InMemorySpanExporter) {
    capture_at(Level::Debug)
}

/// Observer at `level` exporting finished spans to memory.
pub fn capture_at(level: Level) -> (Observer, Buffer, InMemorySpanExporter) {
    let buffer = Buffer::default();
    let exporter = InMemorySpanExporter::default();
    let observer = builder(&buffer, level)
        .tracer_provider(
            SdkTracerProvider::builder()
                .with_simple_exporter(exporter.clone())
                .build(),
        )
        .build()
        .unwrap();
    (observer, buffer, exporter)
}
