//! # Logging & Tracing Infrastructure
//!
//! One `tracing-subscriber` registry for the whole process: an `EnvFilter`
//! plus a formatting layer (pretty, JSON or compact) writing to stderr.
//!
//! Token values must never reach a log line. Spans skip token arguments, and
//! anything that echoes a request URI goes through [`redact_query`] first.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Json)
//!     .with_level(LogLevel::Debug)
//!     .with_env_filter();
//!
//! init_logging(config)?;
//! tracing::info!("Broker started");
//! ```

use crate::error::{Error, Result};
use bridge_traits::time::LogLevel;
use std::io;
use std::str::FromStr;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use url::form_urlencoded;

/// Environment variable holding a full filter directive string.
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

const REDACTED: &str = "[REDACTED]";

/// Crates whose level follows [`LoggingConfig::level`]; everything else
/// logs at warn.
const WORKSPACE_TARGETS: &[&str] = &[
    "broker_server",
    "drive_token_broker",
    "core_auth",
    "core_runtime",
    "bridge_desktop",
    "provider_google_drive",
    "tower_http",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored output for a terminal
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line text
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::Config(format!(
                "Unknown log format '{}' (expected pretty, json or compact)",
                other
            ))),
        }
    }
}

impl Default for LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for workspace crates when no custom filter is set
    pub level: LogLevel,
    /// Full filter directive string, replacing the level-based default
    pub filter: Option<String>,
    /// Log span open/close events
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Take the filter from `RUST_LOG` when it is set and not blank.
    pub fn with_env_filter(self) -> Self {
        match std::env::var(ENV_LOG_FILTER) {
            Ok(filter) if !filter.trim().is_empty() => self.with_filter(filter),
            _ => self,
        }
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.span_events = enable;
        self
    }

    /// Directive string the filter is built from.
    pub fn directives(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => {
                let level = self.level.as_str();
                let mut directives = vec!["warn".to_string()];
                directives.extend(
                    WORKSPACE_TARGETS
                        .iter()
                        .map(|target| format!("{}={}", target, level)),
                );
                directives.join(",")
            }
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] if the filter does not parse or a global subscriber is
/// already installed, so only the first call in a process succeeds.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_span_events(span_events);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
        LogFormat::Json => fmt_layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// Whether a field or parameter name carries credential material.
pub fn is_sensitive(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "code"
        || name == "authorization"
        || name.contains("token")
        || name.contains("secret")
        || name.contains("password")
}

/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("refresh_token", "1//0g-abc"), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("file_id", "abc123"), "abc123");
/// ```
pub fn redact_if_sensitive(name: &str, value: &str) -> String {
    if is_sensitive(name) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Replace sensitive query parameter values in a URI or path.
///
/// ```
/// use core_runtime::logging::redact_query;
///
/// assert_eq!(
///     redact_query("/oauth2callback?code=4%2F0Ab&scope=drive.file"),
///     "/oauth2callback?code=%5BREDACTED%5D&scope=drive.file"
/// );
/// ```
pub fn redact_query(uri: &str) -> String {
    let Some((path, query)) = uri.split_once('?') else {
        return uri.to_string();
    };

    let pairs = form_urlencoded::parse(query.as_bytes());
    if !pairs.clone().any(|(name, _)| is_sensitive(&name)) {
        return uri.to_string();
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        serializer.append_pair(&name, &redact_if_sensitive(&name, &value));
    }
    format!("{}?{}", path, serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!("xml".parse::<LogFormat>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_directives_cover_workspace() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();

        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("core_auth=debug"));
        assert!(directives.contains("broker_server=debug"));
        assert!(!directives.contains("reqwest"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_auth=trace,tower_http=debug");
        assert_eq!(config.directives(), "core_auth=trace,tower_http=debug");
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_auth=[bad");
        assert!(matches!(init_logging(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_sensitive_names() {
        assert!(is_sensitive("code"));
        assert!(is_sensitive("access_token"));
        assert!(is_sensitive("Client_Secret"));
        assert!(!is_sensitive("scope"));
        assert!(!is_sensitive("error_description"));
    }

    #[test]
    fn test_redact_query() {
        assert_eq!(redact_query("/health"), "/health");
        assert_eq!(
            redact_query("/oauth2callback?error=access_denied"),
            "/oauth2callback?error=access_denied"
        );
        let redacted = redact_query("/oauth2callback?state=x&code=4%2F0AbCdEf");
        assert!(!redacted.contains("0AbCdEf"));
        assert!(redacted.starts_with("/oauth2callback?state=x&code="));
    }
}
