//! Types library for the order gateway
//!
//! Core type definitions shared by the gateway and the systems downstream of
//! its ingestion channel. Everything here is plain data: no I/O, no async.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId)
//! - `numeric`: Decimal types (Price, Quantity)
//! - `order`: Inbound order requests and admitted orders
//! - `errors`: Validation error taxonomy

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
