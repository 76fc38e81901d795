//! App-level wrapper around the Twitter REST API.
//!
//! Lookups run with the application bearer token; the OAuth 1.0a token handshake is
//! signed with the consumer credentials. User-context calls live in
//! [`crate::twitter::lists::UserClient`], obtained through [`TwitterApi::for_user`].
use crate::twitter::lists::UserClient;
use crate::twitter::oauth::{ConsumerCredentials, OAuthSigner, TokenCredentials};
use crate::twitter::types::{AccessToken, FriendIdsPage, RequestToken, User};
use anyhow::{Context, Result, bail, ensure};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use tlmirror_http::header::{AUTHORIZATION, HeaderValue};
use tlmirror_http::{Auth, HttpClient, RequestOpts};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const DEFAULT_FRIENDS_PAGE_SIZE: u32 = 1000;

#[derive(Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub bearer_token: String,
}

impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct TwitterApi {
    http: HttpClient,
    bearer: String,
    signer: OAuthSigner,
    friends_page_size: u32,
}

impl TwitterApi {
    pub fn new(credentials: TwitterCredentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE)
    }

    /// Point the client at another host (tests, proxies).
    pub fn with_base_url(credentials: TwitterCredentials, base: &str) -> Result<Self> {
        let http = HttpClient::new(base).with_context(|| format!("twitter base url `{base}`"))?;
        let signer = OAuthSigner::new(ConsumerCredentials {
            key: credentials.consumer_key,
            secret: credentials.consumer_secret,
        });
        Ok(Self {
            http,
            bearer: credentials.bearer_token,
            signer,
            friends_page_size: DEFAULT_FRIENDS_PAGE_SIZE,
        })
    }

    pub fn with_friends_page_size(mut self, n: u32) -> Self {
        self.friends_page_size = n.max(1);
        self
    }

    /// Look up a user by screen name.
    ///
    /// Any 4xx answer (unknown, suspended, malformed name) resolves to `Ok(None)`.
    /// Server, network and decode failures are errors.
    pub async fn users_show(&self, screen_name: &str) -> Result<Option<User>> {
        let res = self
            .http
            .get_json::<User>(
                "1.1/users/show.json",
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(vec![("screen_name", Cow::Borrowed(screen_name))]),
                    ..Default::default()
                },
            )
            .await;

        match res {
            Ok(user) => {
                tracing::debug!(screen_name, user_id = %user.id_str, "twitter.users.show");
                Ok(Some(user))
            }
            Err(e) if e.status().is_some_and(|s| s.is_client_error()) => {
                tracing::info!(screen_name, error = %e, "twitter.users.show.not_found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("looking up @{screen_name}")),
        }
    }

    /// Every account `screen_name` follows, walking the cursor until `next_cursor_str == "0"`.
    pub async fn friend_ids(&self, screen_name: &str) -> Result<Vec<String>> {
        let count = self.friends_page_size.to_string();
        let mut cursor = String::from("-1");
        let mut ids = Vec::new();
        let mut pages = 0usize;

        loop {
            let page: FriendIdsPage = self
                .http
                .get_json(
                    "1.1/friends/ids.json",
                    RequestOpts {
                        auth: Some(Auth::Bearer(&self.bearer)),
                        query: Some(vec![
                            ("screen_name", Cow::Borrowed(screen_name)),
                            ("stringify_ids", Cow::Borrowed("true")),
                            ("cursor", Cow::Borrowed(cursor.as_str())),
                            ("count", Cow::Borrowed(count.as_str())),
                        ]),
                        ..Default::default()
                    },
                )
                .await
                .with_context(|| format!("fetching friends of @{screen_name} (cursor {cursor})"))?;

            pages += 1;
            tracing::debug!(
                screen_name,
                page = pages,
                page_len = page.ids.len(),
                next_cursor = %page.next_cursor_str,
                "twitter.friends.ids.page"
            );

            let last = page.is_last();
            ids.extend(page.ids);
            if last {
                break;
            }
            ensure!(
                page.next_cursor_str != cursor,
                "friends/ids returned the same cursor twice ({cursor})"
            );
            cursor = page.next_cursor_str;
        }

        tracing::info!(screen_name, pages, total = ids.len(), "twitter.friends.ids.done");
        Ok(ids)
    }

    /// Step 1 of the handshake: obtain temporary credentials bound to `callback_url`.
    pub async fn request_token(&self, callback_url: &str) -> Result<RequestToken> {
        let url = self.signed_url("oauth/request_token", &[("oauth_callback", callback_url)])?;
        let body = self
            .http
            .post_for_text(url.as_str(), self.oauth_opts(&url, None)?)
            .await
            .context("requesting oauth request token")?;

        let token: RequestToken = parse_token_response(&body)?;
        if let Some(confirmed) = token.oauth_callback_confirmed.as_deref() {
            if confirmed != "true" {
                bail!("oauth callback was not confirmed by twitter");
            }
        }
        Ok(token)
    }

    /// Step 2: where the user is sent to approve the application.
    pub fn authorize_url(&self, oauth_token: &str) -> Result<Url> {
        let mut url = self.http.endpoint("oauth/authorize")?;
        url.query_pairs_mut().append_pair("oauth_token", oauth_token);
        Ok(url)
    }

    /// Step 3: exchange the approved request token for token credentials.
    pub async fn access_token(
        &self,
        oauth_token: &str,
        oauth_verifier: &str,
        request_token_secret: &str,
    ) -> Result<AccessToken> {
        let token = TokenCredentials {
            token: oauth_token.to_string(),
            secret: request_token_secret.to_string(),
        };
        let url = self.signed_url("oauth/access_token", &[("oauth_verifier", oauth_verifier)])?;
        let body = self
            .http
            .post_for_text(url.as_str(), self.oauth_opts(&url, Some(&token))?)
            .await
            .context("exchanging oauth access token")?;

        let access: AccessToken = parse_token_response(&body)?;
        tracing::info!(
            screen_name = access.screen_name.as_deref().unwrap_or("-"),
            "twitter.oauth.access_token"
        );
        Ok(access)
    }

    /// Client acting on behalf of the user who granted `token`.
    pub fn for_user(&self, token: &AccessToken) -> UserClient {
        UserClient::new(
            self.http.clone(),
            self.signer.clone(),
            TokenCredentials {
                token: token.oauth_token.clone(),
                secret: token.oauth_token_secret.clone(),
            },
        )
    }

    fn signed_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        signed_url(&self.http, path, params)
    }

    fn oauth_opts(&self, url: &Url, token: Option<&TokenCredentials>) -> Result<RequestOpts<'static>> {
        oauth_opts(&self.signer, url, token)
    }
}

/// Endpoint URL with `params` in its query string; the signature covers them.
pub(crate) fn signed_url(http: &HttpClient, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = http.endpoint(path)?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter().copied());
    }
    Ok(url)
}

pub(crate) fn oauth_opts(
    signer: &OAuthSigner,
    url: &Url,
    token: Option<&TokenCredentials>,
) -> Result<RequestOpts<'static>> {
    let header = signer.authorization_header("POST", url, token);
    let value = HeaderValue::from_str(&header).context("oauth header is not a valid header value")?;
    Ok(RequestOpts {
        auth: Some(Auth::Header {
            name: AUTHORIZATION,
            value,
        }),
        allow_absolute: true,
        ..Default::default()
    })
}

/// Token endpoints answer with `key1=value1&key2=value2`.
fn parse_token_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let map: serde_json::Map<String, Value> = url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    let keys: Vec<String> = map.keys().cloned().collect();
    serde_json::from_value(Value::Object(map))
        .with_context(|| format!("unexpected token response (keys: {})", keys.join(",")))
}
