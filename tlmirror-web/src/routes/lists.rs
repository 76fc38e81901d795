use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use anyhow::Context;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use tlmirror_social::twitter::mirror_timeline;
use url::Url;

pub const UNKNOWN_USER_MESSAGE: &str = "対象ユーザーが存在しません。";

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub user_id: String,
    /// Page the form was submitted from; its origin becomes the callback host.
    pub href: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CreateListResponse {
    Redirect { url: String },
    Message { message: String },
}

impl CreateListResponse {
    pub fn unknown_user() -> Self {
        CreateListResponse::Message {
            message: UNKNOWN_USER_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    /// Set by Twitter instead of the verifier when the user refuses access.
    pub denied: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(req): Json<CreateListRequest>,
) -> Result<(PrivateCookieJar, Json<CreateListResponse>), AppError> {
    let user_id = req.user_id.trim().trim_start_matches('@');
    let origin = origin_of(&req.href)?;

    // An empty name can never resolve; answer it like any unknown account.
    let exists = !user_id.is_empty() && state.twitter.users_show(user_id).await?.is_some();
    if !exists {
        tracing::info!(user_id, "lists.create.unknown_user");
        return Ok((jar, Json(CreateListResponse::unknown_user())));
    }

    let callback = format!("{origin}/lists/callback");
    let token = state.twitter.request_token(&callback).await?;
    let url = state.twitter.authorize_url(&token.oauth_token)?;

    let session = Session {
        user_id: Some(user_id.to_string()),
        request_token_secret: Some(token.oauth_token_secret),
    };
    let jar = session.store(jar, state.secure_cookies)?;

    tracing::info!(user_id, %callback, "lists.create.authorize");
    Ok((
        jar,
        Json(CreateListResponse::Redirect {
            url: url.to_string(),
        }),
    ))
}

pub async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let mut session = Session::load(&jar);

    let (Some(token), Some(verifier), Some(user_id), Some(secret)) = (
        params.oauth_token.as_deref(),
        params.oauth_verifier.as_deref(),
        session.user_id.clone(),
        session.request_token_secret.clone(),
    ) else {
        tracing::warn!(denied = params.denied.is_some(), "lists.callback.incomplete");
        session.clear();
        return Ok((session.store(jar, state.secure_cookies)?, Redirect::to("/")));
    };

    let Some(source) = state.twitter.users_show(&user_id).await? else {
        tracing::warn!(user_id, "lists.callback.unknown_user");
        session.clear();
        return Ok((session.store(jar, state.secure_cookies)?, Redirect::to("/")));
    };

    let access = state
        .twitter
        .access_token(token, verifier, &secret)
        .await?;
    let user = state.twitter.for_user(&access);
    let report = mirror_timeline(&state.twitter, &user, &source, &state.list)
        .await
        .with_context(|| format!("mirroring the timeline of {user_id}"))?;

    tracing::info!(
        user_id,
        list_id = %report.list_id,
        members_added = report.members_added,
        "lists.callback.done"
    );

    // user_id stays so the index page can show the completion notice.
    session.request_token_secret = None;
    Ok((session.store(jar, state.secure_cookies)?, Redirect::to("/")))
}

/// `scheme://host[:port]` of an absolute http(s) URL.
pub fn origin_of(href: &str) -> Result<String, AppError> {
    let url = Url::parse(href).map_err(|e| AppError::BadRequest(format!("invalid href: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::BadRequest(format!(
            "unsupported href scheme: {}",
            url.scheme()
        )));
    }
    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_query() {
        assert_eq!(
            origin_of("https://tl.example/some/page?x=1#top").unwrap(),
            "https://tl.example"
        );
        assert_eq!(
            origin_of("http://localhost:3000/").unwrap(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn origin_rejects_relative_and_odd_schemes() {
        assert!(matches!(origin_of("/lists"), Err(AppError::BadRequest(_))));
        assert!(matches!(
            origin_of("javascript:alert(1)"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn responses_serialize_untagged() {
        let body = serde_json::to_value(CreateListResponse::unknown_user()).unwrap();
        assert_eq!(body, serde_json::json!({ "message": UNKNOWN_USER_MESSAGE }));
    }
}
