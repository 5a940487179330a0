//! Connection registry and broadcast fan-out.
//!
//! Each live client is a `Connection`: a stable id plus the sending half of
//! a bounded outbound queue drained by that client's writer task. The hub
//! only ever touches the queue, never the socket, so a broadcast costs one
//! bounded enqueue per recipient.
//!
//! Broadcast snapshots the membership under the map's locks, then sends with
//! no lock held. Recipients that fail or exceed the write timeout are
//! disconnected once every send has settled: removed from the map and told
//! to shut down, which ends their socket task.

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub type ConnectionId = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("connection {0} did not accept a write within {1:?}")]
    Timeout(ConnectionId, Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
#[error("broadcast queue is closed")]
pub struct BroadcastClosed;

/// Handle to one client's outbound queue.
///
/// Clones share the queue and the shutdown signal.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
}

impl Connection {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            outbound,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueue `payload`, waiting at most `timeout` for queue space.
    pub async fn send(&self, payload: Bytes, timeout: Duration) -> Result<(), ConnectionError> {
        if self.shutdown.is_cancelled() {
            return Err(ConnectionError::Closed(self.id));
        }
        match self.outbound.send_timeout(payload, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(ConnectionError::Timeout(self.id, timeout)),
            Err(SendTimeoutError::Closed(_)) => Err(ConnectionError::Closed(self.id)),
        }
    }

    /// Ask the task serving this connection to shut down. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once `close` has been called on any clone.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outbound.is_closed()
    }
}

/// Outcome of a single broadcast call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

pub struct ConnectionHub {
    connections: DashMap<ConnectionId, Connection>,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl ConnectionHub {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            write_timeout,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Allocate an id and an outbound queue of depth `buffer`.
    ///
    /// The connection is not registered yet; the receiver goes to the writer.
    pub fn open(&self, buffer: usize) -> (Connection, mpsc::Receiver<Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(buffer);
        (Connection::new(id, tx), rx)
    }

    /// Make `conn` eligible for broadcasts. Returns false if its id was
    /// already registered, in which case the existing entry is kept.
    pub fn register(&self, conn: Connection) -> bool {
        let id = conn.id;
        let mut inserted = false;
        self.connections.entry(id).or_insert_with(|| {
            inserted = true;
            conn
        });
        if inserted {
            debug!(connection_id = id, "connection registered");
        }
        inserted
    }

    /// Remove `id`. Unknown or already removed ids are a no-op returning false.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!(connection_id = id, "connection deregistered");
        }
        removed
    }

    /// Remove `id` and signal its task to shut down.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, conn)) => {
                conn.close();
                debug!(connection_id = id, "connection disconnected");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Send to one connection with the hub's write timeout.
    pub async fn send_to(&self, conn: &Connection, payload: Bytes) -> Result<(), ConnectionError> {
        conn.send(payload, self.write_timeout).await
    }

    /// Deliver `payload` to every registered connection.
    ///
    /// A failing recipient is disconnected without affecting delivery to the
    /// others.
    pub async fn broadcast(&self, payload: Bytes) -> BroadcastReport {
        let targets: Vec<Connection> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let results = join_all(
            targets
                .iter()
                .map(|conn| conn.send(payload.clone(), self.write_timeout)),
        )
        .await;

        let mut report = BroadcastReport::default();
        for (conn, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(connection_id = conn.id, error = %e, "dropping connection during broadcast");
                    conn.close();
                    self.deregister(conn.id);
                    report.dropped.push(conn.id);
                }
            }
        }
        report
    }
}

/// Ordered, non-blocking front end to `ConnectionHub::broadcast`.
///
/// A single worker drains the queue, so payloads reach every connection in
/// the order they were pushed. Callers only wait while the queue is full,
/// never on a slow recipient.
#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::Sender<Bytes>,
}

impl BroadcastQueue {
    /// Start the fan-out worker. It stops once every queue handle is dropped.
    pub fn spawn(hub: Arc<ConnectionHub>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity);

        let worker = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let report = hub.broadcast(payload).await;
                trace!(
                    delivered = report.delivered,
                    dropped = report.dropped.len(),
                    "queued broadcast sent"
                );
            }
            debug!("broadcast queue stopped");
        });

        (Self { tx }, worker)
    }

    pub async fn push(&self, payload: Bytes) -> Result<(), BroadcastClosed> {
        self.tx.send(payload).await.map_err(|_| BroadcastClosed)
    }
}

/// Keeps a connection registered for as long as it is alive.
///
/// Dropping the guard deregisters, which covers every exit path of the
/// connection task including panics and cancellation.
pub struct Registration {
    hub: Arc<ConnectionHub>,
    id: ConnectionId,
}

impl Registration {
    pub fn new(hub: Arc<ConnectionHub>, conn: Connection) -> Self {
        let id = conn.id();
        hub.register(conn);
        Self { hub, id }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn connect(hub: &ConnectionHub, buffer: usize) -> (Connection, mpsc::Receiver<Bytes>) {
        let (conn, rx) = hub.open(buffer);
        assert!(hub.register(conn.clone()));
        (conn, rx)
    }

    #[test]
    fn test_register_is_idempotent() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (conn, _rx) = hub.open(4);

        assert!(hub.register(conn.clone()));
        assert!(!hub.register(conn.clone()));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (conn, _rx) = connect(&hub, 4);

        assert!(hub.deregister(conn.id()));
        assert!(!hub.deregister(conn.id()));
        assert!(!hub.deregister(9999));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_open_allocates_distinct_ids() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (a, _ra) = hub.open(1);
        let (b, _rb) = hub.open(1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_registration_guard_deregisters_on_drop() {
        let hub = Arc::new(ConnectionHub::new(TIMEOUT));
        let (conn, _rx) = hub.open(4);
        let id = conn.id();

        let guard = Registration::new(hub.clone(), conn);
        assert!(hub.contains(id));
        drop(guard);
        assert!(!hub.contains(id));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (_a, mut ra) = connect(&hub, 4);
        let (_b, mut rb) = connect(&hub, 4);

        let report = hub.broadcast(Bytes::from_static(b"hello")).await;

        assert_eq!(report.delivered, 2);
        assert!(report.dropped.is_empty());
        assert_eq!(ra.recv().await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(rb.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_broadcast_with_no_connections() {
        let hub = ConnectionHub::new(TIMEOUT);
        assert_eq!(hub.broadcast(Bytes::from_static(b"x")).await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_failed_peer_is_isolated_and_dropped() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (_a, mut ra) = connect(&hub, 4);
        let (b, rb) = connect(&hub, 4);
        let (_c, mut rc) = connect(&hub, 4);

        // peer b goes away: its writer (the receiver) is gone
        drop(rb);

        let report = hub.broadcast(Bytes::from_static(b"one")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, vec![b.id()]);
        assert!(!hub.contains(b.id()));
        assert_eq!(ra.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(rc.recv().await.unwrap(), Bytes::from_static(b"one"));

        let report = hub.broadcast(Bytes::from_static(b"two")).await;
        assert_eq!(report.delivered, 2);
        assert!(report.dropped.is_empty());
        assert_eq!(hub.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_peer_is_told_to_shut_down() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (slow, _slow_rx) = connect(&hub, 1);
        slow.send(Bytes::from_static(b"backlog"), TIMEOUT).await.unwrap();

        let report = hub.broadcast(Bytes::from_static(b"tick")).await;
        assert_eq!(report.dropped, vec![slow.id()]);

        // the socket task waits on this signal
        assert!(slow.is_closed());
        tokio::time::timeout(Duration::from_secs(1), slow.closed())
            .await
            .expect("dropped peer never received the shutdown signal");

        // and cannot be written to afterwards, even with queue space
        assert_eq!(
            hub.send_to(&slow, Bytes::from_static(b"late")).await,
            Err(ConnectionError::Closed(slow.id()))
        );
    }

    #[test]
    fn test_disconnect_removes_and_signals() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (conn, _rx) = connect(&hub, 4);

        assert!(hub.disconnect(conn.id()));
        assert!(!hub.contains(conn.id()));
        assert!(conn.is_closed());
        assert!(!hub.disconnect(conn.id()));
    }

    #[tokio::test]
    async fn test_broadcast_queue_preserves_order() {
        let hub = Arc::new(ConnectionHub::new(TIMEOUT));
        let (_a, mut ra) = connect(&hub, 8);
        let (queue, _worker) = BroadcastQueue::spawn(hub.clone(), 8);

        for payload in [&b"1"[..], b"2", b"3"] {
            queue.push(Bytes::copy_from_slice(payload)).await.unwrap();
        }

        for expected in [&b"1"[..], b"2", b"3"] {
            assert_eq!(ra.recv().await.unwrap(), Bytes::copy_from_slice(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_queue_does_not_wait_on_slow_peers() {
        let hub = Arc::new(ConnectionHub::new(Duration::from_secs(30)));
        let (slow, _slow_rx) = connect(&hub, 1);
        slow.send(Bytes::from_static(b"backlog"), TIMEOUT).await.unwrap();
        let (queue, _worker) = BroadcastQueue::spawn(hub.clone(), 8);

        // the worker is stuck on the slow peer; pushes still return at once
        let pushed = tokio::time::timeout(Duration::from_millis(10), async {
            for _ in 0..4 {
                queue.push(Bytes::from_static(b"x")).await.unwrap();
            }
        })
        .await;
        assert!(pushed.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_queue_closed_with_worker() {
        let hub = Arc::new(ConnectionHub::new(TIMEOUT));
        let (queue, worker) = BroadcastQueue::spawn(hub, 1);
        worker.abort();
        let _ = worker.await;

        assert!(queue.push(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_peer_times_out_without_blocking_others() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (slow, _slow_rx) = connect(&hub, 1);
        let (_fast, mut fast_rx) = connect(&hub, 8);

        // fill the slow peer's queue; nobody drains it
        slow.send(Bytes::from_static(b"backlog"), TIMEOUT).await.unwrap();

        let report = hub.broadcast(Bytes::from_static(b"tick")).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, vec![slow.id()]);
        assert!(!hub.contains(slow.id()));
        assert_eq!(fast_rx.recv().await.unwrap(), Bytes::from_static(b"tick"));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection() {
        let hub = ConnectionHub::new(TIMEOUT);
        let (conn, rx) = hub.open(1);
        drop(rx);

        assert!(conn.is_closed());
        assert_eq!(
            hub.send_to(&conn, Bytes::from_static(b"x")).await,
            Err(ConnectionError::Closed(conn.id()))
        );
    }

    proptest! {
        #[test]
        fn prop_membership_is_exact(ops in proptest::collection::vec((any::<bool>(), 0u64..8), 0..64)) {
            let hub = ConnectionHub::new(TIMEOUT);
            let mut model = HashSet::new();
            // keep receivers alive so nothing is closed underneath us
            let mut receivers = Vec::new();

            for (register, id) in ops {
                if register {
                    let (tx, rx) = mpsc::channel(1);
                    receivers.push(rx);
                    let inserted = hub.register(Connection::new(id, tx));
                    prop_assert_eq!(inserted, model.insert(id));
                } else {
                    prop_assert_eq!(hub.deregister(id), model.remove(&id));
                }
            }

            let mut ids = hub.connection_ids();
            ids.sort_unstable();
            let mut expected: Vec<u64> = model.into_iter().collect();
            expected.sort_unstable();
            prop_assert_eq!(ids, expected);
        }
    }
}
