//! Error types for order admission
//!
//! Validation taxonomy using thiserror

use thiserror::Error;

/// Reasons an otherwise well-formed order request is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}
