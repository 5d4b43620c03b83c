// =============================================================================
// Central Application State
// =============================================================================
//
// Shared between the chart driver and the API layer. The driver is the only
// writer of the chart snapshot; the API reads the latest published snapshot
// and forwards user commands to the driver over a channel.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the published snapshot and product list.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::driver::{Command, CommandAck, CommandError, CommandRequest};
use crate::feeds::Product;
use crate::runtime_config::RuntimeConfig;
use crate::session::ChartSnapshot;

// =============================================================================
// State Snapshot (serialised for the API / WebSocket)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub chart: Option<Arc<ChartSnapshot>>,
}

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    // ── Versioning ──────────────────────────────────────────────────────
    /// Incremented on every publication. WebSocket clients compare it to
    /// decide whether to push.
    pub state_version: AtomicU64,

    /// Messages sent over all WebSocket connections.
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Published chart ─────────────────────────────────────────────────
    chart: RwLock<Option<Arc<ChartSnapshot>>>,
    products: RwLock<Vec<Product>>,

    // ── Driver ──────────────────────────────────────────────────────────
    commands: mpsc::UnboundedSender<CommandRequest>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, commands: mpsc::UnboundedSender<CommandRequest>) -> Self {
        Self {
            state_version: AtomicU64::new(0),
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            chart: RwLock::new(None),
            products: RwLock::new(Vec::new()),
            commands,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Versioning ──────────────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::Release) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Acquire)
    }

    // ── Publication ─────────────────────────────────────────────────────

    /// Replace the published chart and return the new version.
    pub fn publish(&self, snapshot: ChartSnapshot) -> u64 {
        *self.chart.write() = Some(Arc::new(snapshot));
        self.increment_version()
    }

    pub fn chart(&self) -> Option<Arc<ChartSnapshot>> {
        self.chart.read().clone()
    }

    pub fn set_products(&self, products: Vec<Product>) {
        *self.products.write() = products;
        self.increment_version();
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.read().clone()
    }

    pub fn build_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            chart: self.chart(),
        }
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Send a command to the driver without waiting for it.
    pub fn submit(&self, command: Command) -> Result<(), CommandError> {
        self.commands
            .send(CommandRequest { command, reply: None })
            .map_err(|_| CommandError::DriverStopped)
    }

    /// Send a command and wait for the driver's answer.
    pub async fn execute(&self, command: Command) -> Result<CommandAck, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(CommandRequest {
                command,
                reply: Some(reply),
            })
            .map_err(|_| CommandError::DriverStopped)?;
        let result = rx.await.map_err(|_| CommandError::DriverStopped)?;
        Ok(result?)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("state_version", &self.current_state_version())
            .field("ws_sequence_number", &self.ws_sequence_number.load(Ordering::Relaxed))
            .field("has_chart", &self.chart.read().is_some())
            .field("products", &self.products.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::catalog::Catalog;
    use crate::session::{ChartSession, SessionConfig};

    fn state() -> (AppState, mpsc::UnboundedReceiver<CommandRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AppState::new(RuntimeConfig::default(), tx), rx)
    }

    #[test]
    fn publish_bumps_version() {
        let (state, _rx) = state();
        assert_eq!(state.current_state_version(), 0);
        assert!(state.build_snapshot().chart.is_none());

        let session = ChartSession::new(SessionConfig::default(), Catalog::with_defaults(&[]));
        assert_eq!(state.publish(session.snapshot()), 1);
        state.set_products(session.catalog().products().to_vec());
        assert_eq!(state.current_state_version(), 2);

        let snapshot = state.build_snapshot();
        assert_eq!(snapshot.state_version, 2);
        assert_eq!(snapshot.chart.unwrap().generation, 0);
        assert_eq!(state.products().len(), 1);
    }

    #[tokio::test]
    async fn execute_without_driver_reports_stopped() {
        let (state, rx) = state();
        drop(rx);
        let err = state.execute(Command::ResetToLatest).await.unwrap_err();
        assert_eq!(err, CommandError::DriverStopped);
        assert_eq!(state.submit(Command::ResetToLatest), Err(CommandError::DriverStopped));
    }

    #[tokio::test]
    async fn dropped_reply_reports_stopped() {
        let (state, mut rx) = state();
        tokio::spawn(async move {
            // Receive and drop the request without answering.
            let _ = rx.recv().await;
        });
        let err = state.execute(Command::ResetToLatest).await.unwrap_err();
        assert_eq!(err, CommandError::DriverStopped);
    }
}
