use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::bus::{FeedError, PublishError};
use crate::config::ConfigError;
use crate::hub::ConnectionError;

/// Wire reason for every `MalformedRequest`, decode and validation alike.
pub const REASON_INVALID_JSON: &str = "Invalid JSON";
/// Wire reason for submissions refused by the admission gate.
pub const REASON_TRADING_HALTED: &str = "TRADING HALTED";

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad client input. Recovered locally, connection stays open.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Policy rejection while the admission gate is closed.
    #[error("Trading halted")]
    TradingHalted,

    /// Transport failure on one connection. Ends that connection only.
    #[error("Connection failure: {0}")]
    ConnectionFailure(#[from] ConnectionError),

    /// Downstream ingestion unavailable. Logged and swallowed.
    #[error("Publish failure: {0}")]
    PublishFailure(#[from] PublishError),

    /// Execution feed ended or broke. Ends the relay only.
    #[error("Feed failure: {0}")]
    FeedFailure(#[from] FeedError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// The reason sent back to a client for rejections it is told about.
    ///
    /// `None` for errors that are never reported over the order socket.
    pub fn client_reason(&self) -> Option<&'static str> {
        match self {
            GatewayError::MalformedRequest(_) => Some(REASON_INVALID_JSON),
            GatewayError::TradingHalted => Some(REASON_TRADING_HALTED),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            GatewayError::TradingHalted => (StatusCode::SERVICE_UNAVAILABLE, "TRADING_HALTED"),
            GatewayError::PublishFailure(_) | GatewayError::FeedFailure(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            GatewayError::ConnectionFailure(_)
            | GatewayError::Serialization(_)
            | GatewayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_reasons() {
        assert_eq!(
            GatewayError::MalformedRequest("eof".into()).client_reason(),
            Some("Invalid JSON")
        );
        assert_eq!(GatewayError::TradingHalted.client_reason(), Some("TRADING HALTED"));
        assert_eq!(
            GatewayError::PublishFailure(PublishError::QueueClosed).client_reason(),
            None
        );
    }

    #[test]
    fn test_http_status_mapping() {
        let resp = GatewayError::TradingHalted.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = GatewayError::MalformedRequest("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
