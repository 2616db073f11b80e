//! Observers that write records to memory and export spans in-process.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use o11y::{Configuration, Level, ObsContext, Observer, RoundTripStore};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use serde_json::Value;

/// Shared in-memory log output.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    /// Raw output lines.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Every record written so far, parsed.
    pub fn records(&self) -> Vec<Value> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("record is JSON"))
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| r["msg"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// First record with the given message.
    pub fn find(&self, msg: &str) -> Option<Value> {
        self.records().into_iter().find(|r| r["msg"] == msg)
    }
}

/// Everything a test needs to inspect an observer's output.
pub struct Harness {
    pub observer: Observer,
    pub cx: ObsContext,
    pub output: Capture,
    pub spans: InMemorySpanExporter,
}

pub struct HarnessBuilder {
    level: Level,
    store: Option<Arc<dyn RoundTripStore>>,
}

impl HarnessBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn store(mut self, store: Arc<dyn RoundTripStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Harness {
        let output = Capture::default();
        let spans = InMemorySpanExporter::default();
        let config = Configuration::default()
            .with_level(self.level)
            .with_timestamps(false)
            .with_service_name("o11y-tests");

        let mut builder = Observer::builder(config)
            .output(output.clone())
            .tracer_provider(
                SdkTracerProvider::builder()
                    .with_simple_exporter(spans.clone())
                    .build(),
            );
        if let Some(store) = self.store {
            builder = builder.store(store);
        }
        let observer = builder.build().expect("observer builds");

        Harness {
            cx: ObsContext::new().with_observer(observer.clone()),
            observer,
            output,
            spans,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        level: Level::Debug,
        store: None,
    }
}
