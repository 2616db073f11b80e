//! Observer configuration.
//!
//! A [`Configuration`] can be built in code with the `with_*` methods or read
//! from the process environment with [`Configuration::from_env`].

use thiserror::Error;
use url::Url;

use super::level::Level;

/// Errors raised while building a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid OTEL_URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Observer configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Minimum level written to the record sink
    pub level: Level,
    /// OTLP/HTTP collector endpoint; spans are not exported when unset
    pub otel_url: Option<Url>,
    /// Postgres connection string; round trips are not persisted when unset
    pub db_con_str: Option<String>,
    /// Service name reported on exported spans
    pub service_name: String,
    /// Substrings trimmed from the `source.module` attribute
    pub trim_modules: Vec<String>,
    /// Substrings trimmed from the `source.file` attribute
    pub trim_paths: Vec<String>,
    /// Whether records carry a `time` field
    pub timestamps: bool,
    /// Install a global `tracing` subscriber writing to the observer's output
    pub install_subscriber: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            level: Level::Debug,
            otel_url: None,
            db_con_str: None,
            service_name: String::new(),
            trim_modules: Vec::new(),
            trim_paths: Vec::new(),
            timestamps: true,
            install_subscriber: false,
        }
    }
}

impl Configuration {
    /// Read the configuration from the environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `LOG_LEVEL` | minimum level, default `debug` |
    /// | `OTEL_URL` | collector endpoint |
    /// | `DB_CONSTR` | Postgres connection string |
    /// | `OTEL_SERVICE_NAME` | service name |
    /// | `TRIM_MODULES` | comma separated module prefixes |
    /// | `TRIM_PATHS` | comma separated path prefixes |
    /// | `ENV` | `test` disables timestamps |
    pub fn from_env() -> Result<Self, ConfigError> {
        let level = env_var("LOG_LEVEL")
            .map(|s| Level::resolve(&s))
            .unwrap_or(Level::Debug);

        let otel_url = match env_var("OTEL_URL") {
            Some(raw) => Some(parse_url(&raw)?),
            None => None,
        };

        Ok(Self {
            level,
            otel_url,
            db_con_str: env_var("DB_CONSTR"),
            service_name: env_var("OTEL_SERVICE_NAME").unwrap_or_default(),
            trim_modules: split_list(env_var("TRIM_MODULES").as_deref()),
            trim_paths: split_list(env_var("TRIM_PATHS").as_deref()),
            timestamps: env_var("ENV").as_deref() != Some("test"),
            install_subscriber: false,
        })
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the collector endpoint.
    pub fn with_otel_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.otel_url = Some(parse_url(url)?);
        Ok(self)
    }

    pub fn with_db_con_str(mut self, con_str: impl Into<String>) -> Self {
        self.db_con_str = Some(con_str.into());
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_trim_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trim_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trim_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trim_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn with_subscriber(mut self, install: bool) -> Self {
        self.install_subscriber = install;
        self
    }
}

/// Non-empty value of an environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
