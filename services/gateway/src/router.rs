use crate::handlers::{admin, health, ws};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Client-facing routes: the order socket and the health check.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/orders", get(ws::ws_handler))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Operator routes. Serve these on a listener only operators can reach.
pub fn create_admin_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/panic", post(admin::toggle_halt))
        .route("/orders", get(admin::recent_orders));

    Router::new()
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
