//! Logging setup for the tlmirror server.
//!
//! Events go to a daily rotated file (`tlmirror.<YYYY-MM-DD>.log`) and, unless
//! disabled, to stderr. Call [`init_logging`] once near process start; later
//! calls are no-ops that return the path resolved by the first one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Log directory used when `logging.dir` is unset.
pub const LOG_DIR_ENV: &str = "TLMIRROR_LOG_DIR";
/// Filter directives that win over both `RUST_LOG` and the configured filter.
pub const LOG_FILTER_ENV: &str = "TLMIRROR_LOG";
/// Rotated files kept on disk.
const MAX_LOG_FILES: usize = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct UnknownLogFormat(String);

impl fmt::Display for UnknownLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log format `{}` (expected `text` or `json`)", self.0)
    }
}

impl std::error::Error for UnknownLogFormat {}

/// Configuration passed to [`init_logging`], normally built from the `logging`
/// section of the config file.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Prefix of the log file name and of the default directory.
    pub app_name: &'static str,
    /// Directory for log files. Falls back to `TLMIRROR_LOG_DIR`, then the XDG
    /// state directory.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when neither `TLMIRROR_LOG` nor `RUST_LOG` is set.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "tlmirror",
            log_dir: None,
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global `tracing` subscriber and return today's log file path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.app_name)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&dir)
        .with_context(|| format!("opening log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);

    let filter = build_filter(&config.default_filter)?;
    let mut layers = vec![file_layer(config.format, writer)];
    if config.emit_stderr {
        layers.push(stderr_layer(config.format));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = todays_log_file(&dir, config.app_name);
    let _ = LOG_PATH.set(path.clone());
    tracing::debug!(path = %path.display(), format = ?config.format, "logging initialised");
    Ok(path)
}

fn build_filter(configured: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(directives) = std::env::var(LOG_FILTER_ENV) {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {LOG_FILTER_ENV} filter `{directives}`"));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(configured).with_context(|| format!("invalid logging.filter `{configured}`"))
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Name the daily appender writes to; it dates files in UTC.
fn todays_log_file(dir: &Path, app_name: &str) -> PathBuf {
    dir.join(format!("{app_name}.{}.log", Utc::now().format("%Y-%m-%d")))
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(expand_home)
        .or_else(|| std::env::var_os(LOG_DIR_ENV).map(|d| expand_home(Path::new(&d))))
        .unwrap_or_else(|| default_state_dir(app_name))
}

fn expand_home(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

/// `$XDG_STATE_HOME/<app>`, `~/.local/state/<app>`, or `./logs` without a home.
fn default_state_dir(app_name: &str) -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(state).join(app_name);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/state").join(app_name),
        None => PathBuf::from("logs"),
    }
}
