use axum::{
    Router,
    http::{HeaderValue, header},
    routing::get,
};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;

use super::handlers::{self, Greeter};
use super::instrument::Instrumented;
use crate::AppState;

pub const HELLO_PATH: &str = "/hello";
pub const METRICS_PATH: &str = "/metrics";

/// Layers shared by both listeners
fn common_layers(router: Router) -> Router {
    router
        .layer(axum::middleware::from_fn(super::request_id::request_id))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

/// Application listener: the instrumented greeting route.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let router = Router::new().route_service(
        HELLO_PATH,
        Instrumented::new(HELLO_PATH, state.recorder.clone(), Greeter),
    );

    common_layers(router)
}

/// Metrics listener: Prometheus exposition only.
pub fn create_metrics_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route(METRICS_PATH, get(handlers::metrics))
        .with_state(state);

    common_layers(router)
}
