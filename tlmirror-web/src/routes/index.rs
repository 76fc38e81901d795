use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use crate::views::{IndexPage, PAGE_TITLE};
use anyhow::Context;
use askama::Template;
use axum::extract::State;
use axum::response::Html;
use axum_extra::extract::cookie::PrivateCookieJar;

/// The completion notice is shown once: the session is emptied on every visit.
pub async fn index(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Html<String>), AppError> {
    let mut session = Session::load(&jar);
    let completed_for = session.user_id.take();
    session.clear();

    let html = IndexPage {
        title: PAGE_TITLE,
        completed_for: completed_for.as_deref(),
    }
    .render()
    .context("rendering index page")?;

    let jar = session.store(jar, state.secure_cookies)?;
    Ok((jar, Html(html)))
}
