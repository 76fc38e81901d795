use crate::state::AppState;
use crate::views::ErrorView;
use askama::Template;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tlmirror_config::RunEnvironment;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

/// Carried on error responses until [`render_error_pages`] turns it into HTML.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        tracing::error!(status = status.as_u16(), error = %detail, "request.failed");

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage { status, detail });
        response
    }
}

pub async fn render_error_pages(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let view = ErrorView {
        status: page.status.as_u16(),
        message: page.status.canonical_reason().unwrap_or("Error"),
        detail: (state.environment == RunEnvironment::Development).then_some(page.detail.as_str()),
    };
    let (body, content_type) = match view.render() {
        Ok(html) => (html, "text/html; charset=utf-8"),
        Err(err) => {
            tracing::error!(error = %err, "error page template failed");
            (view.message.to_string(), "text/plain; charset=utf-8")
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    Response::from_parts(parts, Body::from(body))
}
