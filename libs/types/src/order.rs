//! Order request and admitted order types
//!
//! An `OrderRequest` is what a client sends. An `Order` is what the gateway
//! records and forwards once it has validated the request and stamped the
//! fields clients are never trusted with: `id`, `timestamp` and `status`.

use crate::errors::OrderError;
use crate::ids::OrderId;
use crate::numeric::{Price, Quantity};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Rest at `price` or better
    Limit,
    /// Execute against the book; `price` is informational
    Market,
}

/// Status of an order as the gateway sees it
///
/// The gateway only ever admits orders; fills and cancels happen downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
}

/// Inbound order submission
///
/// Unknown fields are ignored, which is how client-supplied `id`,
/// `timestamp` and `status` values get dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Range checks on an already decoded request.
    ///
    /// Quantity must be strictly positive and price non-negative. A limit
    /// order additionally needs a non-zero price; a market order may carry 0.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.trim().is_empty() {
            return Err(OrderError::MissingField("user_id"));
        }
        if self.symbol.trim().is_empty() {
            return Err(OrderError::MissingField("symbol"));
        }
        if !self.quantity.is_positive() {
            return Err(OrderError::InvalidQuantity(format!(
                "{} is not greater than zero",
                self.quantity
            )));
        }
        if self.price.is_negative() {
            return Err(OrderError::InvalidPrice(format!("{} is negative", self.price)));
        }
        if self.order_type == OrderType::Limit && self.price.is_zero() {
            return Err(OrderError::InvalidPrice(
                "limit order requires a non-zero price".to_string(),
            ));
        }
        Ok(())
    }
}

/// An order admitted by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub order_type: OrderType,
    /// Unix nanos, server clock at admission
    pub timestamp: i64,
    pub status: OrderStatus,
}

impl Order {
    /// Validate `request` and enrich it into an open order.
    ///
    /// This is the only constructor: `id` is freshly minted and `timestamp`
    /// comes from the caller (the gateway clock), never from the request.
    pub fn admit(request: OrderRequest, timestamp: i64) -> Result<Self, OrderError> {
        request.validate()?;

        Ok(Self {
            id: OrderId::new(),
            user_id: request.user_id,
            symbol: request.symbol,
            side: request.side,
            price: request.price,
            quantity: request.quantity,
            order_type: request.order_type,
            timestamp,
            status: OrderStatus::Open,
        })
    }
}

/// Current wall clock as Unix nanos.
///
/// Saturates at `i64::MAX` past the year 2262 instead of wrapping.
pub fn unix_nanos_now() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
