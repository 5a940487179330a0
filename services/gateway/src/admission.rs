//! Trading halt switch.
//!
//! A single process-wide flag consulted on every submission. Flipping it
//! notifies every connected client with a `{"type":"system","halted":..}`
//! broadcast, one per flip.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::error::GatewayError;
use crate::hub::ConnectionHub;
use crate::models::{SystemNotice, to_payload};

pub struct AdmissionGate {
    halted: AtomicBool,
    hub: Arc<ConnectionHub>,
}

impl AdmissionGate {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self {
            halted: AtomicBool::new(false),
            hub,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Flip the flag and broadcast the new state. Returns the new state.
    ///
    /// The flip itself is a single atomic operation, so concurrent toggles
    /// each observe a distinct transition. Notices from concurrent toggles
    /// may reach clients in either order; each carries its own value.
    pub async fn toggle(&self) -> Result<bool, GatewayError> {
        let halted = !self.halted.fetch_xor(true, Ordering::AcqRel);
        warn!(halted, "trading halt toggled");

        let notice = to_payload(&SystemNotice::halt_changed(halted))?;
        let report = self.hub.broadcast(notice).await;
        if !report.dropped.is_empty() {
            warn!(dropped = report.dropped.len(), "connections dropped while announcing halt");
        }

        Ok(halted)
    }
}
