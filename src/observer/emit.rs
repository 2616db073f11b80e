//! Levelled emission.
//!
//! Every call merges the stable and per-call fields, mirrors the message onto
//! the active span (regardless of level), then writes a record if the level
//! passes the sink's minimum.

use std::error::Error;
use std::panic::Location;

use super::Observer;
use crate::core::fields::Fields;
use crate::core::keys;
use crate::core::level::Level;
use crate::core::severity::Severity;
use crate::telemetry::attributes;

impl Observer {
    #[track_caller]
    pub fn develop(&self, msg: &str, fields: impl Into<Fields>) {
        self.log_at(Level::Develop, msg, fields.into(), Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, fields: impl Into<Fields>) {
        self.log_at(Level::Debug, msg, fields.into(), Location::caller());
    }

    #[track_caller]
    pub fn info(&self, msg: &str, fields: impl Into<Fields>) {
        self.log_at(Level::Info, msg, fields.into(), Location::caller());
    }

    #[track_caller]
    pub fn notice(&self, msg: &str, fields: impl Into<Fields>) {
        self.log_at(Level::Notice, msg, fields.into(), Location::caller());
    }

    #[track_caller]
    pub fn warning(&self, msg: &str, fields: impl Into<Fields>) {
        self.log_at(Level::Warning, msg, fields.into(), Location::caller());
    }

    /// Log at an arbitrary level.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, fields: impl Into<Fields>) {
        self.log_at(level, msg, fields.into(), Location::caller());
    }

    /// Log an error. The record message is the error text.
    #[track_caller]
    pub fn error(&self, err: &dyn Error, fields: impl Into<Fields>) {
        self.error_at(err, None, fields.into(), Location::caller());
    }

    #[track_caller]
    pub fn error_with_severity(&self, err: &dyn Error, severity: Severity, fields: impl Into<Fields>) {
        self.error_at(err, Some(severity), fields.into(), Location::caller());
    }

    /// Log an error at fatal level and exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, err: &dyn Error, fields: impl Into<Fields>) -> ! {
        self.fatal_at(err, None, fields.into(), Location::caller())
    }

    #[track_caller]
    pub fn fatal_with_severity(
        &self,
        err: &dyn Error,
        severity: Severity,
        fields: impl Into<Fields>,
    ) -> ! {
        self.fatal_at(err, Some(severity), fields.into(), Location::caller())
    }

    pub(crate) fn log_at(&self, level: Level, msg: &str, fields: Fields, caller: &Location<'_>) {
        self.emit(level, msg, None, fields, caller);
    }

    pub(crate) fn error_at(
        &self,
        err: &dyn Error,
        severity: Option<Severity>,
        fields: Fields,
        caller: &Location<'_>,
    ) {
        let msg = err.to_string();
        self.emit(Level::Error, &msg, Some((err, severity)), fields, caller);
    }

    fn fatal_at(
        &self,
        err: &dyn Error,
        severity: Option<Severity>,
        fields: Fields,
        caller: &Location<'_>,
    ) -> ! {
        let msg = err.to_string();
        self.emit(Level::Fatal, &msg, Some((err, severity)), fields, caller);
        std::process::exit(1)
    }

    fn emit(
        &self,
        level: Level,
        msg: &str,
        failure: Option<(&dyn Error, Option<Severity>)>,
        mut ephemeral: Fields,
        caller: &Location<'_>,
    ) {
        let mut state = self.state();
        if !state.sink.enabled(level) && state.spans.is_empty() {
            return;
        }

        if let Some((err, severity)) = failure {
            ephemeral.upsert(keys::ERROR, err.to_string());
            if let Some(severity) = severity {
                ephemeral.upsert(keys::SEVERITY, severity);
            }
        }
        let fields = Fields::merge(&state.stable, &ephemeral);

        if let Some(span) = state.spans.active_mut() {
            span.set_attributes(attributes::encode(&fields));
            match failure {
                Some((err, _)) => span.record_error(err),
                None => span.add_event(msg.to_string(), Vec::new()),
            }
        }

        if let Err(err) = state.sink.write(level, msg, &fields, caller) {
            tracing::warn!(error = %err, "Failed to write log record");
        }
    }
}
