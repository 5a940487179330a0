use crate::models::HealthResponse;
use crate::state::AppState;
use axum::{Json, extract::State};

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "order-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        trading_halted: state.gate.is_halted(),
        connections: state.hub.len(),
        retained_orders: state.order_log.len(),
    })
}
