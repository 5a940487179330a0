use crate::error::GatewayError;
use crate::models::HaltResponse;
use crate::state::AppState;
use axum::{Json, extract::State};
use types::order::Order;

/// Flip the trading halt switch and report the new state.
pub async fn toggle_halt(State(state): State<AppState>) -> Result<Json<HaltResponse>, GatewayError> {
    let halted = state.gate.toggle().await?;
    Ok(Json(HaltResponse { halted }))
}

/// Most recently admitted orders, oldest first.
pub async fn recent_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    Json(state.order_log.snapshot())
}
