//! HTTP surface: the form page, the OAuth round-trip that creates the list, and
//! static assets.
//!
//! ```no_run
//! # async fn serve(state: tlmirror_web::AppState) -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, tlmirror_web::router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod routes;
pub mod security;
pub mod session;
pub mod state;
pub mod views;

pub use error::AppError;
pub use state::AppState;

use axum::Router;
use axum::handler::HandlerWithoutStateExt;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.public_dir).fallback(routes::not_found.into_service());

    Router::new()
        .route("/", get(routes::index::index))
        .route("/lists/create", post(routes::lists::create))
        .route("/lists/callback", get(routes::lists::callback))
        .fallback_service(assets)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::render_error_pages,
        ))
        .layer(middleware::from_fn(security::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
