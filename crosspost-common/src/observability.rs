//! Logging setup for the `crosspost` binary and integration tests.
//!
//! stdout carries the command's JSON result, so events never go there. They land
//! in `<dir>/crosspost.<date>.log`, rotated daily with the oldest files pruned,
//! and are optionally mirrored to stderr in the same format.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_DIR_ENV: &str = "CROSSPOST_LOG_DIR";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Event encoding, shared by the file sink and the stderr mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// File name prefix and directory name under the state dir.
    pub app_name: &'static str,
    /// Wins over `CROSSPOST_LOG_DIR` and the XDG state directory.
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Daily files kept before the oldest is deleted.
    pub retention_days: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "crosspost",
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: "info".to_string(),
            retention_days: 14,
        }
    }
}

/// Install the global subscriber and return the log directory.
///
/// Only the first call configures anything; later calls return the directory
/// chosen then.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = LOG_DIR.get() {
        return Ok(dir.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.app_name)
        .filename_suffix("log")
        .max_log_files(config.retention_days.max(1))
        .build(&dir)
        .with_context(|| format!("opening log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let file_layer = match config.format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    };
    let stderr_layer = config.stderr.then(|| match config.format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    let _ = LOG_GUARD.set(guard);
    let _ = LOG_DIR.set(dir.clone());
    tracing::info!(
        dir = %dir.display(),
        format = ?config.format,
        stderr = config.stderr,
        retention_days = config.retention_days,
        "logging.ready"
    );
    Ok(dir)
}

/// Explicit dir, then `CROSSPOST_LOG_DIR`, then `$XDG_STATE_HOME/<app>`,
/// then `~/.local/state/<app>`, then `./logs`.
fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    let env = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());
    if let Some(dir) = env(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(state) = env("XDG_STATE_HOME") {
        return PathBuf::from(state).join(app_name);
    }
    match env("HOME") {
        Some(home) => PathBuf::from(home).join(".local/state").join(app_name),
        None => PathBuf::from("logs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(resolve_log_dir("crosspost", Some(tmp.path())), tmp.path());
    }

    #[test]
    fn format_names_match_config_values() {
        #[derive(Deserialize)]
        struct Holder {
            format: LogFormat,
        }
        let json: Holder = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(json.format, LogFormat::Json);
        assert!(serde_json::from_str::<Holder>(r#"{"format":"xml"}"#).is_err());
    }

    #[test]
    fn init_writes_into_the_dated_file_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = init_logging(LogConfig {
            dir: Some(tmp.path().join("logs")),
            ..LogConfig::default()
        })
        .unwrap();
        assert_eq!(dir, tmp.path().join("logs"));

        let again = init_logging(LogConfig {
            dir: Some(tmp.path().join("elsewhere")),
            ..LogConfig::default()
        })
        .unwrap();
        assert_eq!(again, dir);
        assert!(!tmp.path().join("elsewhere").exists());

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(
            names
                .iter()
                .any(|n| n.starts_with("crosspost.") && n.ends_with(".log"))
        );
    }
}
