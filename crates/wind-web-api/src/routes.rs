use axum::{Router, http::Method, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::Config,
    handlers::{AppState, dispatch},
};

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Result<Vec<_>, _> = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse())
        .collect();

    match origins {
        Ok(origins) => layer.allow_origin(origins),
        Err(_) => {
            warn!(origins = ?config.cors_origins, "invalid CORS origins, falling back to allow all");
            layer.allow_origin(Any)
        }
    }
}

pub fn create_router(config: &Config, state: AppState) -> Router {
    Router::new()
        .route("/", get(dispatch).post(dispatch))
        .route("/{*path}", get(dispatch).post(dispatch))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
        .with_state(state)
}
