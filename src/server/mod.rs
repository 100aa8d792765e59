pub mod routes;

use crate::state::AppState;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/options", post(routes::create_option).get(routes::list_options))
        .route(
            "/options/{option_id}",
            get(routes::read_option)
                .patch(routes::update_option)
                .delete(routes::delete_option),
        )
        .route("/options_black76/{option_id}", patch(routes::store_black76_price))
        .route("/black76", post(routes::quote_black76))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
