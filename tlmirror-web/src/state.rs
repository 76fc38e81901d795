use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::path::PathBuf;
use std::sync::Arc;
use tlmirror_config::{RunEnvironment, TlMirrorConfig};
use tlmirror_social::twitter::{ListSettings, TwitterApi, TwitterCredentials};

/// Static assets shipped with the crate.
pub const DEFAULT_PUBLIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/public");

#[derive(Clone)]
pub struct AppState {
    pub twitter: Arc<TwitterApi>,
    pub list: Arc<ListSettings>,
    pub cookie_key: Key,
    pub secure_cookies: bool,
    pub environment: RunEnvironment,
    pub public_dir: PathBuf,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(twitter: TwitterApi, list: ListSettings, cookie_key: Key) -> Self {
        Self {
            twitter: Arc::new(twitter),
            list: Arc::new(list),
            cookie_key,
            secure_cookies: true,
            environment: RunEnvironment::Production,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }

    pub fn from_config(cfg: &TlMirrorConfig) -> anyhow::Result<Self> {
        cfg.validate()?;

        let twitter = TwitterApi::with_base_url(
            TwitterCredentials {
                consumer_key: cfg.twitter.consumer_key.clone(),
                consumer_secret: cfg.twitter.consumer_secret.clone(),
                bearer_token: cfg.twitter.bearer_token.clone(),
            },
            &cfg.twitter.api_base,
        )
        .context("building twitter client")?
        .with_friends_page_size(cfg.twitter.friends_page_size);

        let cookie_key = match &cfg.server.session_secret {
            Some(secret) => Key::derive_from(secret.as_bytes()),
            None => {
                tracing::warn!("server.session_secret is not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(Self {
            secure_cookies: cfg.server.secure_cookies,
            environment: cfg.server.environment,
            public_dir: cfg
                .server
                .public_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR)),
            ..Self::new(twitter, cfg.list.clone(), cookie_key)
        })
    }

    pub fn with_environment(mut self, environment: RunEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}
