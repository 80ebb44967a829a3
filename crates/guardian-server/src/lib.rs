pub mod config;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use guardian_api::auth::AppState;
use guardian_api::middleware::require_auth;
use guardian_api::{images, moderation};

/// Full HTTP surface. Everything except `/health` requires a bearer token.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/moderate", post(moderation::moderate))
        .route("/images", get(images::list_images))
        .route(
            "/images/{image_id}",
            get(images::get_image)
                .patch(images::update_image)
                .delete(images::delete_image),
        )
        .route("/images/{image_id}/content", get(images::get_image_content))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}
