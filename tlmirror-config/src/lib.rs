//! Loader for tlmirror configuration with YAML + environment overlays.
//!
//! Sources are merged in this order (later wins):
//!
//! 1. built-in defaults on the typed structs,
//! 2. an optional YAML/TOML/JSON file (`tlmirror.yaml` by convention),
//! 3. `TLMIRROR__`-prefixed environment variables, `__` separating sections
//!    (`TLMIRROR__TWITTER__BEARER_TOKEN`).
//!
//! String values may reference other environment variables as `${VAR}`; those are
//! expanded recursively before deserialization. The bare `CONSUMER_KEY`,
//! `CONSUMER_SECRET` and `BEARER_TOKEN` variables are honoured when the matching
//! `twitter.*` key is left empty.
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tlmirror_common::observability::LogFormat;

pub use tlmirror_social::twitter::ListSettings;
pub use tlmirror_social::twitter::types::ListMode;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const MIN_SESSION_SECRET_LEN: usize = 32;
const MAX_FRIENDS_PAGE_SIZE: u32 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlMirrorConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub list: ListSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    #[serde(alias = "dev")]
    Development,
    #[default]
    #[serde(alias = "prod")]
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub environment: RunEnvironment,
    /// Master secret for the encrypted session cookie. When absent every process
    /// start generates a fresh key, so sessions do not survive restarts.
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default = "default_true", deserialize_with = "lenient")]
    pub secure_cookies: bool,
    #[serde(default)]
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            environment: RunEnvironment::default(),
            session_secret: None,
            secure_cookies: true,
            public_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_friends_page_size", deserialize_with = "lenient")]
    pub friends_page_size: u32,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            bearer_token: String::new(),
            api_base: default_api_base(),
            friends_page_size: default_friends_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true", deserialize_with = "lenient")]
    pub stderr: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::default(),
            stderr: true,
            filter: default_filter(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".into()
}
fn default_api_base() -> String {
    "https://api.twitter.com".into()
}
fn default_friends_page_size() -> u32 {
    1000
}
fn default_filter() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}

/// Environment overlays arrive as strings; accept either the native type or its text form.
fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Native(T),
        Text(String),
    }

    match Raw::<T>::deserialize(d)? {
        Raw::Native(v) => Ok(v),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
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

fn is_unresolved(s: &str) -> bool {
    s.contains("${")
}

fn fill_from_env(slot: &mut String, var: &str) {
    if slot.trim().is_empty() || is_unresolved(slot) {
        if let Ok(v) = std::env::var(var) {
            *slot = v;
        }
    }
}

impl TlMirrorConfig {
    fn finalize(mut self) -> Result<Self, ConfigError> {
        fill_from_env(&mut self.twitter.consumer_key, "CONSUMER_KEY");
        fill_from_env(&mut self.twitter.consumer_secret, "CONSUMER_SECRET");
        fill_from_env(&mut self.twitter.bearer_token, "BEARER_TOKEN");

        if self
            .server
            .session_secret
            .as_deref()
            .is_some_and(|s| s.trim().is_empty() || is_unresolved(s))
        {
            self.server.session_secret = None;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the invariants the server relies on at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("twitter.consumer_key", &self.twitter.consumer_key),
            ("twitter.consumer_secret", &self.twitter.consumer_secret),
            ("twitter.bearer_token", &self.twitter.bearer_token),
        ] {
            if value.trim().is_empty() || is_unresolved(value) {
                return Err(ConfigError::Invalid(format!("{key} is not set")));
            }
        }

        if let Some(secret) = &self.server.session_secret {
            if secret.len() < MIN_SESSION_SECRET_LEN {
                return Err(ConfigError::Invalid(format!(
                    "server.session_secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
                )));
            }
        }

        if !(1..=MAX_FRIENDS_PAGE_SIZE).contains(&self.twitter.friends_page_size) {
            return Err(ConfigError::Invalid(format!(
                "twitter.friends_page_size must be within 1..={MAX_FRIENDS_PAGE_SIZE}"
            )));
        }

        if self.list.name.trim().is_empty() {
            return Err(ConfigError::Invalid("list.name must not be empty".into()));
        }

        Ok(())
    }
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct TlMirrorConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for TlMirrorConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TlMirrorConfigLoader {
    /// Start with `TLMIRROR__` env overrides only.
    ///
    /// ```
    /// use tlmirror_config::TlMirrorConfigLoader;
    ///
    /// let cfg = TlMirrorConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// twitter:
    ///   consumer_key: "ck"
    ///   consumer_secret: "cs"
    ///   bearer_token: "bt"
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.server.bind, "0.0.0.0:3000");
    /// assert_eq!(cfg.list.name, "TL再現リスト");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing, so headless deployments can rely
    /// purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into typed config.
    ///
    /// ```
    /// use tlmirror_config::{ListMode, TlMirrorConfigLoader};
    ///
    /// unsafe { std::env::set_var("DOC_BEARER", "from-env"); }
    ///
    /// let cfg = TlMirrorConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// twitter:
    ///   consumer_key: "ck"
    ///   consumer_secret: "cs"
    ///   bearer_token: "${DOC_BEARER}"
    /// list:
    ///   mode: public
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cfg.twitter.bearer_token, "from-env");
    /// assert_eq!(cfg.list.mode, ListMode::Public);
    ///
    /// unsafe { std::env::remove_var("DOC_BEARER"); }
    /// ```
    pub fn load(self) -> Result<TlMirrorConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(Environment::with_prefix("TLMIRROR").separator("__"))
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: TlMirrorConfig = serde_json::from_value(v)
            .map_err(|e| ConfigError::Source(config::ConfigError::Message(e.to_string())))?;

        typed.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${STATE}" }, 42, true, null]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST_TLMIRROR}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST_TLMIRROR}"));
    }

    #[derive(Deserialize)]
    struct Flags {
        #[serde(deserialize_with = "lenient")]
        on: bool,
        #[serde(deserialize_with = "lenient")]
        size: u32,
    }

    #[test]
    fn lenient_accepts_text_and_native_scalars() {
        let native: Flags = serde_json::from_value(json!({ "on": false, "size": 5 })).unwrap();
        assert!(!native.on);
        assert_eq!(native.size, 5);

        let text: Flags = serde_json::from_value(json!({ "on": "true", "size": " 200 " })).unwrap();
        assert!(text.on);
        assert_eq!(text.size, 200);

        assert!(serde_json::from_value::<Flags>(json!({ "on": "maybe", "size": 1 })).is_err());
    }

    fn valid() -> TlMirrorConfig {
        serde_json::from_value(json!({
            "twitter": { "consumer_key": "ck", "consumer_secret": "cs", "bearer_token": "bt" }
        }))
        .unwrap()
    }

    #[test]
    fn short_session_secret_is_rejected() {
        let mut cfg = valid();
        cfg.server.session_secret = Some("too-short".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        cfg.server.session_secret = Some("x".repeat(MIN_SESSION_SECRET_LEN));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn page_size_bounds_are_enforced() {
        let mut cfg = valid();
        cfg.twitter.friends_page_size = 0;
        assert!(cfg.validate().is_err());
        cfg.twitter.friends_page_size = MAX_FRIENDS_PAGE_SIZE + 1;
        assert!(cfg.validate().is_err());
        cfg.twitter.friends_page_size = MAX_FRIENDS_PAGE_SIZE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unresolved_placeholder_counts_as_missing() {
        let mut cfg = valid();
        cfg.twitter.bearer_token = "${NOT_EXPORTED}".into();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("twitter.bearer_token"), "{err}");
    }
}
