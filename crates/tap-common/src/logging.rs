//! Logging for taps
//!
//! stdout carries the Singer message stream, so log lines go to stderr and,
//! when a log directory is configured, to a daily rolling file as well.
//! Stream metrics are logged as Singer `METRIC:` lines under the
//! [`METRICS_TARGET`] target.
//!
//! Environment overrides:
//!
//! - `TAP_LOG_LEVEL`: trace, debug, info, warn, error
//! - `TAP_LOG_FORMAT`: text or json
//! - `TAP_LOG_DIR`: also write rolling log files here
//! - `TAP_LOG_FILTER`: extra directives, e.g. `reqwest=debug`
//!
//! # Example
//!
//! ```no_run
//! use tap_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::for_tap("tap-marketo").verbose(false).with_env()?;
//!     init_logging(&config)?;
//!
//!     info!(stream = "leads", "Starting sync");
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, Level, Subscriber};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Target of Singer metric lines
pub const METRICS_TARGET: &str = "singer_metrics";

/// HTTP stack crates are only interesting when something breaks
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper=warn", "reqwest=warn", "h2=warn"];

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging setup for one tap process
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name used as the log file prefix
    pub tap_name: String,
    pub level: Level,
    pub format: LogFormat,
    /// Rolling log files are written here when set
    pub log_dir: Option<PathBuf>,
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Info level text logs on stderr
    pub fn for_tap(tap_name: impl Into<String>) -> Self {
        Self {
            tap_name: tap_name.into(),
            level: Level::INFO,
            format: LogFormat::Text,
            log_dir: None,
            directives: QUIET_DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Debug level when `verbose`
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = Level::DEBUG;
        }
        self
    }

    /// Apply `TAP_LOG_*` environment overrides
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = var("TAP_LOG_LEVEL") {
            self.level = Level::from_str(&level)
                .map_err(|_| anyhow!("Invalid TAP_LOG_LEVEL: {}", level))?;
        }
        if let Some(format) = var("TAP_LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(dir) = var("TAP_LOG_DIR").filter(|d| !d.is_empty()) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(filter) = var("TAP_LOG_FILTER") {
            self.directives.extend(
                filter
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy();
        for directive in &self.directives {
            filter = filter.add_directive(
                directive
                    .parse()
                    .with_context(|| format!("Invalid filter directive '{}'", directive))?,
            );
        }
        Ok(filter)
    }
}

/// Install the global subscriber; call once at start-up
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut layers = vec![stderr_layer(config.format)];
    if let Some(dir) = &config.log_dir {
        layers.push(file_layer(config.format, dir, &config.tap_name)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter()?)
        .try_init()?;

    Ok(())
}

fn stderr_layer<S>(format: LogFormat) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn file_layer<S>(format: LogFormat, dir: &Path, prefix: &str) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Flushes on drop; the subscriber lives as long as the process
    std::mem::forget(guard);

    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    Ok(match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    })
}

/// Singer counter metric line, e.g. `METRIC: {"type":"counter",...}`
pub fn counter_metric(metric: &str, value: u64, stream: &str) -> String {
    let body = serde_json::json!({
        "type": "counter",
        "metric": metric,
        "value": value,
        "tags": { "endpoint": stream },
    });
    format!("METRIC: {}", body)
}

/// Log the number of records a finished stream emitted
pub fn record_counter(stream: &str, count: u64) {
    info!(target: METRICS_TARGET, "{}", counter_metric("record_count", count, stream));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_quiet_http_crates() {
        let config = LogConfig::for_tap("tap-marketo");
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.log_dir, None);
        assert!(config.directives.contains(&"reqwest=warn".to_string()));
    }

    #[test]
    fn test_verbose_raises_level() {
        assert_eq!(LogConfig::for_tap("t").verbose(true).level, Level::DEBUG);
        assert_eq!(LogConfig::for_tap("t").verbose(false).level, Level::INFO);
    }

    #[test]
    fn test_env_overrides() {
        let config = LogConfig::for_tap("tap-marketo")
            .with_vars(vars(&[
                ("TAP_LOG_LEVEL", "trace"),
                ("TAP_LOG_FORMAT", "JSON"),
                ("TAP_LOG_DIR", "/var/log/tap"),
                ("TAP_LOG_FILTER", "tap_marketo=debug, ,hyper=info"),
            ]))
            .unwrap();

        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/tap")));
        assert!(config.directives.ends_with(&[
            "tap_marketo=debug".to_string(),
            "hyper=info".to_string()
        ]));
    }

    #[test]
    fn test_invalid_env_values_rejected() {
        let bad_level = LogConfig::for_tap("t").with_vars(vars(&[("TAP_LOG_LEVEL", "loud")]));
        assert!(bad_level.is_err());

        let bad_format = LogConfig::for_tap("t").with_vars(vars(&[("TAP_LOG_FORMAT", "xml")]));
        assert!(bad_format.is_err());
    }

    #[test]
    fn test_counter_metric_line() {
        let line = counter_metric("record_count", 12, "leads");
        let json: serde_json::Value =
            serde_json::from_str(line.strip_prefix("METRIC: ").unwrap()).unwrap();

        assert_eq!(json["type"], "counter");
        assert_eq!(json["metric"], "record_count");
        assert_eq!(json["value"], 12);
        assert_eq!(json["tags"]["endpoint"], "leads");
    }
}
