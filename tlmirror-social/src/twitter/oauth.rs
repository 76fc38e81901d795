//! OAuth 1.0a request signing (HMAC-SHA1) for the Twitter REST API.
//!
//! The signer only produces the `Authorization` header value. Request parameters are
//! expected to travel in the URL query string, which is folded into the signature
//! base string together with the `oauth_*` protocol parameters.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use std::borrow::Cow;
use std::fmt;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LEN: usize = 32;

#[derive(Clone)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenCredentials {
    pub token: String,
    pub secret: String,
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// RFC 3986 percent-encoding: everything except `A-Z a-z 0-9 - . _ ~`.
pub fn percent_encode(s: &str) -> Cow<'_, str> {
    urlencoding::encode(s)
}

#[derive(Clone, Debug)]
pub struct OAuthSigner {
    consumer: ConsumerCredentials,
}

impl OAuthSigner {
    pub fn new(consumer: ConsumerCredentials) -> Self {
        Self { consumer }
    }

    /// Build the `Authorization` header for `method url`, with a fresh nonce and
    /// the current timestamp.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        token: Option<&TokenCredentials>,
    ) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
        self.authorization_header_with(method, url, &[], token, &nonce, timestamp)
    }

    /// Deterministic variant. `extra` carries form-body parameters, which take part
    /// in the signature exactly like query parameters.
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
        token: Option<&TokenCredentials>,
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let timestamp = timestamp.to_string();
        let mut oauth: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", self.consumer.key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_version", OAUTH_VERSION),
        ];
        if let Some(t) = token {
            oauth.push(("oauth_token", t.token.as_str()));
        }

        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut params: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.extend_from_slice(extra);
        params.extend(oauth.iter().copied());

        let base = signature_base_string(method, url, params);
        let signature = sign(
            &base,
            &self.consumer.secret,
            token.map(|t| t.secret.as_str()).unwrap_or(""),
        );

        oauth.push(("oauth_signature", signature.as_str()));
        oauth.sort_by(|a, b| a.0.cmp(b.0));

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }
}

/// `METHOD&enc(base_url)&enc(sorted params)`.
pub fn signature_base_string<'a>(
    method: &str,
    url: &Url,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (percent_encode(k).into_owned(), percent_encode(v).into_owned()))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&param_string)
    )
}

fn base_url(url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.to_string()
}

/// base64(HMAC-SHA1(enc(consumer_secret)&enc(token_secret), base)).
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}
