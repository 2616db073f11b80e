//! The observer handle.
//!
//! An [`Observer`] bundles the record sink, the tracer provider, the span stack
//! and the stable fields attached to every record. Handles are cheap to clone
//! and all clones share state. Work receives an observer through an
//! [`ObsContext`]; when the context carries none, the process-wide default is
//! used.
//!
//! ```rust,ignore
//! use o11y::{fields, Configuration, ObsContext};
//!
//! let (cx, o) = o11y::initialise(Configuration::from_env()?, None, fields! { "service" => "orders" }).await?;
//! o.info("ready", ());
//!
//! let (cx, o) = o11y::extend(&cx, fields! { "tenant" => "acme" });
//! o.debug("tenant selected", fields! { "plan" => "pro" });
//! ```

pub mod context;
mod emit;
pub mod inbound;

use std::borrow::Cow;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use once_cell::sync::Lazy;
use opentelemetry::trace::{
    SpanContext, SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _,
};
use opentelemetry::{global, Context};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

use crate::core::config::Configuration;
use crate::core::fields::Fields;
use crate::core::level::Level;
use crate::error::O11yError;
use crate::store::{RoundTripRecord, RoundTripStore};
use crate::telemetry::{self, RecordSink, SharedWriter, SpanStack, TraceSpan};

pub use context::ObsContext;
pub use inbound::{begin_request, RequestScope};

static DEFAULT: Lazy<RwLock<Observer>> = Lazy::new(|| RwLock::new(Observer::fallback()));

/// Shared observability handle.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<Inner>,
}

struct Inner {
    config: Configuration,
    output: SharedWriter,
    provider: SdkTracerProvider,
    store: Option<Arc<dyn RoundTripStore>>,
    shut_down: AtomicBool,
    state: Mutex<State>,
}

struct State {
    sink: RecordSink,
    stable: Fields,
    spans: SpanStack,
}

/// Builder for an [`Observer`] that is not installed as the process default.
pub struct ObserverBuilder {
    config: Configuration,
    output: Option<SharedWriter>,
    provider: Option<SdkTracerProvider>,
    store: Option<Arc<dyn RoundTripStore>>,
    fields: Fields,
}

impl ObserverBuilder {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            output: None,
            provider: None,
            store: None,
            fields: Fields::new(),
        }
    }

    /// Write records to `output` instead of stdout.
    pub fn output(self, output: impl Write + Send + 'static) -> Self {
        self.writer(SharedWriter::new(Box::new(output)))
    }

    pub fn writer(mut self, writer: SharedWriter) -> Self {
        self.output = Some(writer);
        self
    }

    /// Use an existing tracer provider instead of building one from the configuration.
    pub fn tracer_provider(mut self, provider: SdkTracerProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn RoundTripStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Initial stable fields.
    pub fn fields(mut self, fields: impl Into<Fields>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn build(self) -> Result<Observer, O11yError> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => telemetry::build_provider(&self.config)?,
        };
        let output = self.output.unwrap_or_else(SharedWriter::stdout);
        Ok(Observer::assemble(
            self.config,
            output,
            provider,
            self.store,
            Fields::merge(&Fields::new(), &self.fields),
        ))
    }
}

impl Observer {
    pub fn builder(config: Configuration) -> ObserverBuilder {
        ObserverBuilder::new(config)
    }

    fn assemble(
        config: Configuration,
        output: SharedWriter,
        provider: SdkTracerProvider,
        store: Option<Arc<dyn RoundTripStore>>,
        stable: Fields,
    ) -> Self {
        let sink = RecordSink::new(output.clone(), &config);
        Self {
            inner: Arc::new(Inner {
                config,
                output,
                provider,
                store,
                shut_down: AtomicBool::new(false),
                state: Mutex::new(State {
                    sink,
                    stable,
                    spans: SpanStack::new(),
                }),
            }),
        }
    }

    /// Observer used before [`initialise`] has run.
    ///
    /// Reads the environment for level and trimming, writes to stdout and
    /// never exports spans or persists round trips.
    pub fn fallback() -> Self {
        let config = Configuration::from_env().unwrap_or_default();
        Self::assemble(
            config,
            SharedWriter::stdout(),
            SdkTracerProvider::builder().build(),
            None,
            Fields::new(),
        )
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().expect("mutex poisoned")
    }

    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    /// Minimum level of the current record sink.
    pub fn level(&self) -> Level {
        self.state().sink.min_level()
    }

    /// Output stream shared by every record.
    pub fn output(&self) -> SharedWriter {
        self.inner.output.clone()
    }

    /// Snapshot of the stable fields.
    pub fn stable_fields(&self) -> Fields {
        self.state().stable.clone()
    }

    /// Merge `fields` into the stable set in place.
    pub fn add_fields(&self, fields: impl Into<Fields>) {
        let fields = fields.into();
        if fields.is_empty() {
            return;
        }
        let mut state = self.state();
        state.stable = Fields::merge(&state.stable, &fields);
    }

    /// Whether both handles refer to the same observer.
    pub fn same_as(&self, other: &Observer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.inner.provider
    }

    /// Tracer from this observer's provider.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.inner.provider.tracer(name)
    }

    /// Push a span started elsewhere and make it active.
    pub fn enter_span(&self, span: Box<dyn TraceSpan>) {
        self.state().spans.enter(span);
    }

    /// End the active span and make its parent active. Does nothing when no
    /// span is open.
    pub fn close_span(&self) {
        self.state().spans.exit();
    }

    /// Set the status of the active span, if any.
    pub fn set_span_status(&self, status: Status) {
        if let Some(span) = self.state().spans.active_mut() {
            span.set_status(status);
        }
    }

    pub fn span_depth(&self) -> usize {
        self.state().spans.depth()
    }

    /// Context of the active span, or an invalid context when none is open.
    pub fn span_context(&self) -> SpanContext {
        self.active_span_context()
            .unwrap_or_else(SpanContext::empty_context)
    }

    pub(crate) fn active_span_context(&self) -> Option<SpanContext> {
        self.state().spans.active_context()
    }

    /// Rebuild the record sink from the configuration and clear the stable set.
    pub fn reset(&self) {
        let mut state = self.state();
        state.sink = RecordSink::new(self.inner.output.clone(), &self.inner.config);
        state.stable.clear();
    }

    /// End all open spans and flush and shut down the tracer provider.
    ///
    /// Only the first call does anything.
    pub fn try_shutdown(&self) -> Result<(), O11yError> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let ended = self.state().spans.drain();
        tracing::debug!(spans = ended, "Ending open spans before shutdown");
        self.inner.provider.shutdown()?;
        Ok(())
    }

    /// Like [`Observer::try_shutdown`], but a failure is fatal.
    #[track_caller]
    pub fn shutdown(&self) {
        if let Err(err) = self.try_shutdown() {
            self.fatal(&err, ());
        }
    }

    pub fn has_store(&self) -> bool {
        self.inner.store.is_some()
    }

    /// Persist a round trip through the configured store.
    ///
    /// Without a store this only logs at debug level. Store failures are logged
    /// at error level and returned.
    #[track_caller]
    pub fn store_round_trip(
        &self,
        record: &RoundTripRecord,
    ) -> impl std::future::Future<Output = Result<(), O11yError>> + Send + '_ {
        let caller = std::panic::Location::caller();
        let record = record.clone();
        async move {
            let Some(store) = self.inner.store.clone() else {
                self.log_at(
                    Level::Debug,
                    "Database is not enabled, skipping storage of API request",
                    Fields::new(),
                    caller,
                );
                return Ok(());
            };

            if let Err(err) = store.insert_round_trip(&record).await {
                self.error_at(&err, None, Fields::new(), caller);
                return Err(err);
            }
            Ok(())
        }
    }

    /// Most recently stored round trip, or the zero record without a store.
    pub async fn last_round_trip(&self) -> Result<RoundTripRecord, O11yError> {
        match &self.inner.store {
            Some(store) => Ok(store.last_round_trip().await?.unwrap_or_default()),
            None => Ok(RoundTripRecord::default()),
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Observer")
            .field("level", &state.sink.min_level())
            .field("stable", &state.stable)
            .field("spans", &state.spans)
            .field("store", &self.inner.store.is_some())
            .finish()
    }
}

fn default_observer() -> Observer {
    DEFAULT.read().expect("lock poisoned").clone()
}

fn set_default(observer: Observer) {
    *DEFAULT.write().expect("lock poisoned") = observer;
}

/// Build the process-wide observer and return a context carrying it.
///
/// Connects the round-trip store and applies its migrations when a connection
/// string is configured; either failure is returned. Records go to `output`,
/// or stdout when `None`.
pub async fn initialise(
    config: Configuration,
    output: Option<Box<dyn Write + Send>>,
    initial: impl Into<Fields>,
) -> Result<(ObsContext, Observer), O11yError> {
    let writer = output.map(SharedWriter::new).unwrap_or_else(SharedWriter::stdout);
    #[allow(unused_mut)]
    let mut builder = Observer::builder(config.clone()).writer(writer.clone());

    #[cfg(feature = "postgres")]
    let migrated = match &config.db_con_str {
        Some(con_str) => {
            use crate::store::migrate::{EmbeddedMigrations, MigrationRunner, Migrator};
            use crate::store::PostgresStore;

            let store = PostgresStore::connect(con_str).await?;
            let migrator = Migrator::new(store.pool().clone(), &EmbeddedMigrations::default())?;
            migrator.apply_all().await?;
            builder = builder.store(Arc::new(store));
            true
        }
        None => false,
    };

    #[cfg(not(feature = "postgres"))]
    let migrated = {
        if config.db_con_str.is_some() {
            tracing::warn!("DB_CONSTR is set but round-trip persistence requires the `postgres` feature");
        }
        false
    };

    let observer = builder.build()?;

    global::set_tracer_provider(observer.inner.provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    if config.install_subscriber {
        if let Err(err) = telemetry::install_subscriber(config.level, writer) {
            tracing::debug!(error = %err, "Global tracing subscriber already installed");
        }
    }

    set_default(observer.clone());

    if migrated {
        observer.debug("Database migrated successfully", ());
    }

    let cx = ObsContext::new().with_observer(observer);
    Ok(extend(&cx, initial))
}

/// Observer carried by `cx`, or the process-wide default.
pub fn get(cx: &ObsContext) -> Observer {
    cx.observer().cloned().unwrap_or_else(default_observer)
}

/// Merge `fields` into the observer's stable set and return a context carrying it.
pub fn extend(cx: &ObsContext, fields: impl Into<Fields>) -> (ObsContext, Observer) {
    let observer = get(cx);
    observer.add_fields(fields);
    (cx.clone().with_observer(observer.clone()), observer)
}

/// Start a span and push it onto the observer's stack.
///
/// The span is a child of the active span, else of the remote parent carried
/// by `cx`, else a new root.
pub fn open_span<T>(
    cx: &ObsContext,
    tracer: &T,
    name: impl Into<Cow<'static, str>>,
    kind: SpanKind,
) -> (ObsContext, Observer)
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    let observer = get(cx);

    let parent = observer
        .active_span_context()
        .or_else(|| cx.remote_parent().cloned());
    let parent_cx = match parent {
        Some(span) => Context::new().with_remote_span_context(span),
        None => Context::new(),
    };

    let span = tracer.build_with_context(tracer.span_builder(name).with_kind(kind), &parent_cx);
    observer.enter_span(Box::new(span));

    (cx.clone().with_observer(observer.clone()), observer)
}

/// [`open_span`] followed by [`extend`].
pub fn expand<T>(
    cx: &ObsContext,
    tracer: &T,
    name: impl Into<Cow<'static, str>>,
    kind: SpanKind,
    fields: impl Into<Fields>,
) -> (ObsContext, Observer)
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    let (cx, _) = open_span(cx, tracer, name, kind);
    extend(&cx, fields)
}

/// Rebuild the record sink, clear the stable set and return a context carrying
/// the observer.
#[track_caller]
pub fn reset(cx: &ObsContext) -> ObsContext {
    let observer = get(cx);
    observer.reset();
    observer.debug("Observer reset", ());
    cx.clone().with_observer(observer)
}
