//! Loader for crosspost configuration with YAML + environment overlays.
//!
//! A config file carries one optional section per network plus logging
//! preferences:
//!
//! ```yaml
//! linkedin:
//!   redirect_uri: "https://app.example.com/linkedin/callback"
//!   client_id: "${LINKEDIN_CLIENT_ID}"
//!   client_secret: "${LINKEDIN_CLIENT_SECRET}"
//! twitter:
//!   consumer_key: "${TWITTER_CONSUMER_KEY}"
//!   consumer_secret: "${TWITTER_CONSUMER_SECRET}"
//!   access_token: "${TWITTER_ACCESS_TOKEN}"
//!   access_token_secret: "${TWITTER_ACCESS_TOKEN_SECRET}"
//! logging:
//!   format: json
//! ```
//!
//! `CROSSPOST__`-prefixed variables override file values
//! (`CROSSPOST__TWITTER__ACCESS_TOKEN=...`), then `${VAR}` placeholders are expanded.
use config::{Config, ConfigError, Environment, File};
use crosspost_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_LINKEDIN_OAUTH_BASE: &str = "https://www.linkedin.com/oauth/v2/";
pub const DEFAULT_LINKEDIN_API_BASE: &str = "https://api.linkedin.com/v2/";
pub const DEFAULT_TWITTER_API_BASE: &str = "https://api.twitter.com/";
pub const DEFAULT_TWITTER_UPLOAD_BASE: &str = "https://upload.twitter.com/";

#[derive(Debug, Clone, Deserialize)]
pub struct CrosspostConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub linkedin: Option<LinkedInConfig>,
    #[serde(default)]
    pub twitter: Option<TwitterConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OAuth application credentials for LinkedIn.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedInConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub redirect_uri: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_secret: String,
    #[serde(default = "default_linkedin_oauth_base")]
    pub oauth_base: String,
    #[serde(default = "default_linkedin_api_base")]
    pub api_base: String,
}

impl LinkedInConfig {
    /// Credentials against the production endpoints.
    pub fn new(
        redirect_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            oauth_base: default_linkedin_oauth_base(),
            api_base: default_linkedin_api_base(),
        }
    }
}

/// OAuth 1.0a user-context credentials for Twitter.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub consumer_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub consumer_secret: String,
    #[serde(deserialize_with = "lenient_string")]
    pub access_token: String,
    #[serde(deserialize_with = "lenient_string")]
    pub access_token_secret: String,
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
    #[serde(default = "default_twitter_upload_base")]
    pub upload_base: String,
}

impl TwitterConfig {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
            api_base: default_twitter_api_base(),
            upload_base: default_twitter_upload_base(),
        }
    }
}

/// `logging:` section; see [`LogConfig`] for what each key controls.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub stderr: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// `~` is expanded.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_retention_days")]
    pub retention_days: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            stderr: false,
            filter: default_log_filter(),
            dir: None,
            retention_days: default_retention_days(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(c: &LoggingConfig) -> Self {
        LogConfig {
            dir: c
                .dir
                .as_deref()
                .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned())),
            format: c.format,
            stderr: c.stderr,
            filter: c.filter.clone(),
            retention_days: c.retention_days,
            ..LogConfig::default()
        }
    }
}

fn default_linkedin_oauth_base() -> String {
    DEFAULT_LINKEDIN_OAUTH_BASE.into()
}
fn default_linkedin_api_base() -> String {
    DEFAULT_LINKEDIN_API_BASE.into()
}
fn default_twitter_api_base() -> String {
    DEFAULT_TWITTER_API_BASE.into()
}
fn default_twitter_upload_base() -> String {
    DEFAULT_TWITTER_UPLOAD_BASE.into()
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_retention_days() -> usize {
    LogConfig::default().retention_days
}

/// Typed env parsing turns `CROSSPOST__LINKEDIN__CLIENT_ID=12345` into a number;
/// credentials are always text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {other}"
        ))),
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct CrosspostConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for CrosspostConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosspostConfigLoader {
    /// Start empty; `CROSSPOST__` env overrides are layered on top in [`Self::load`].
    ///
    /// ```
    /// use crosspost_config::CrosspostConfigLoader;
    ///
    /// let config = CrosspostConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.linkedin.is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely on the environment alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use crosspost_config::{CrosspostConfigLoader, DEFAULT_LINKEDIN_API_BASE};
    ///
    /// let cfg = CrosspostConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// linkedin:
    ///   redirect_uri: "https://app.example.com/cb"
    ///   client_id: "id"
    ///   client_secret: "secret"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let linkedin = cfg.linkedin.expect("linkedin section");
    /// assert_eq!(linkedin.client_id, "id");
    /// assert_eq!(linkedin.api_base, DEFAULT_LINKEDIN_API_BASE);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    pub fn load(self) -> Result<CrosspostConfig, ConfigError> {
        // Later sources win, so the environment goes last.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("CROSSPOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
