use std::any::Any;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api::APIResponse;
use crate::handler::{self, AppState};

/// The bookmark resource, relative to the API prefix.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookmarks",
            get(handler::list_bookmarks)
                .post(handler::create_bookmark)
                .fallback(handler::method_not_allowed),
        )
        .route(
            "/bookmarks/:id",
            get(handler::get_bookmark)
                .put(handler::update_bookmark)
                .delete(handler::delete_bookmark)
                .fallback(handler::method_not_allowed),
        )
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(err.as_ref()), "handler panicked");
    APIResponse::internal_error().into_response()
}

/// Builds the whole service: the bookmark API under `api_prefix`, the
/// health check, and the tracing and panic layers.
pub fn app(state: AppState, api_prefix: &str) -> Router {
    let router = Router::new().route("/health", get(handler::healthcheck));

    let router = if api_prefix.is_empty() {
        router.merge(routes())
    } else {
        router.nest(api_prefix, routes())
    };

    router
        .fallback(handler::not_found)
        // bookmark fields have no size cap
        .layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
