// =============================================================================
// Chart Driver: the task that owns the session
// =============================================================================
//
// Every reaction runs to completion on this task: API commands, historic
// results and stream events are multiplexed with `tokio::select!` and applied
// to the session one at a time. Feed I/O runs on spawned tasks that report
// back over channels, tagged with the session generation.
//
// Snapshot publication is paced by a trailing `Throttle`: any number of
// mutations within one frame interval produce a single publication.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ChartError, FeedError};
use crate::feeds::{Feeds, Product, StreamHandle, StreamMessage};
use crate::indicators::{PrimaryOverlay, SecondaryPane};
use crate::schedule::Throttle;
use crate::session::{ChartSession, GestureTarget, SessionEffect};
use crate::types::{DateRange, SeriesPoint, Timestamp};
use crate::view::GestureOutcome;

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug)]
pub enum Command {
    ChangeProduct { product: String, period: Option<String> },
    ChangePeriod { period: String },
    ResetToLatest,
    Pan { target: GestureTarget, dx: f64 },
    Zoom { target: GestureTarget, factor: f64, anchor: f64 },
    Brush { extent: DateRange, ended: bool },
    Crosshair { date: Option<Timestamp> },
    ToggleOverlay(PrimaryOverlay),
    TogglePane(SecondaryPane),
    DismissNotification(Uuid),
    /// Result of the startup product-list fetch.
    ProductsLoaded(Result<Vec<Product>, FeedError>),
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandAck {
    /// Gestures: the view changed. Toggles: now enabled. Dismiss: removed.
    pub applied: bool,
    pub generation: u64,
    pub view: Option<DateRange>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("chart driver is not running")]
    DriverStopped,
}

#[derive(Debug)]
pub struct CommandRequest {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Result<CommandAck, ChartError>>>,
}

type HistoricResult = (u64, Result<Vec<SeriesPoint>, FeedError>);

// =============================================================================
// Driver
// =============================================================================

pub struct Driver {
    session: ChartSession,
    feeds: Feeds,
    state: Arc<AppState>,
    commands: mpsc::UnboundedReceiver<CommandRequest>,
    historic_tx: mpsc::UnboundedSender<HistoricResult>,
    historic_rx: mpsc::UnboundedReceiver<HistoricResult>,
    stream_tx: mpsc::UnboundedSender<StreamMessage>,
    stream_rx: mpsc::UnboundedReceiver<StreamMessage>,
    stream: Option<StreamHandle>,
    throttle: Throttle,
}

impl Driver {
    pub fn new(
        session: ChartSession,
        feeds: Feeds,
        state: Arc<AppState>,
        commands: mpsc::UnboundedReceiver<CommandRequest>,
        frame_interval: Duration,
    ) -> Self {
        let (historic_tx, historic_rx) = mpsc::unbounded_channel();
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        Self {
            session,
            feeds,
            state,
            commands,
            historic_tx,
            historic_rx,
            stream_tx,
            stream_rx,
            stream: None,
            throttle: Throttle::new(frame_interval),
        }
    }

    pub fn session(&self) -> &ChartSession {
        &self.session
    }

    /// Select the initial product, falling back to the first catalog entry.
    pub fn start(&mut self, product: &str, period: &str) {
        self.state.set_products(self.session.catalog().products().to_vec());
        let effects = match self.session.change_product(product, Some(period)) {
            Ok(effects) => effects,
            Err(e) => {
                warn!(product, period, error = %e, "initial selection unavailable, using first product");
                let Some(first) = self.session.catalog().products().first().map(|p| p.id.clone()) else {
                    return;
                };
                match self.session.change_product(&first, None) {
                    Ok(effects) => effects,
                    Err(e) => {
                        warn!(error = %e, "no product could be selected");
                        return;
                    }
                }
            }
        };
        self.execute(effects);
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    fn execute(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::CloseStream => {
                    if let Some(mut handle) = self.stream.take() {
                        handle.close();
                        info!("live stream closed");
                    }
                }
                SessionEffect::Fetch(plan) => {
                    let tx = self.historic_tx.clone();
                    let Some(feed) = self.feeds.historic(plan.source) else {
                        let err = FeedError::UnsupportedProduct(format!("no historic feed for {:?}", plan.source));
                        let _ = tx.send((plan.generation, Err(err)));
                        continue;
                    };
                    let request = plan.request(chrono::Utc::now().timestamp_millis());
                    debug!(generation = plan.generation, product = %plan.product, "historic fetch started");
                    tokio::spawn(async move {
                        let result = feed.fetch(&request).await;
                        let _ = tx.send((plan.generation, result));
                    });
                }
                SessionEffect::OpenStream {
                    generation,
                    source,
                    product,
                } => match self.feeds.streaming(source) {
                    Some(feed) => {
                        self.stream = Some(feed.connect(&product, generation, self.stream_tx.clone()));
                    }
                    None => warn!(?source, "no streaming feed configured"),
                },
            }
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn ack(&self, applied: bool) -> CommandAck {
        CommandAck {
            applied,
            generation: self.session.generation(),
            view: self.session.view(),
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Result<CommandAck, ChartError> {
        let view_changed = |o: GestureOutcome| matches!(o, GestureOutcome::ViewChange(_));
        match command {
            Command::ChangeProduct { product, period } => {
                let effects = self.session.change_product(&product, period.as_deref())?;
                self.execute(effects);
                Ok(self.ack(true))
            }
            Command::ChangePeriod { period } => {
                let effects = self.session.change_period(&period)?;
                self.execute(effects);
                Ok(self.ack(true))
            }
            Command::ResetToLatest => {
                self.session.reset_to_latest();
                Ok(self.ack(true))
            }
            Command::Pan { target, dx } => {
                let outcome = self.session.pan(target, dx);
                Ok(self.ack(view_changed(outcome)))
            }
            Command::Zoom { target, factor, anchor } => {
                let outcome = self.session.zoom(target, factor, anchor);
                Ok(self.ack(view_changed(outcome)))
            }
            Command::Brush { extent, ended } => {
                let applied = self.session.brush(extent, ended).is_some();
                Ok(self.ack(applied))
            }
            Command::Crosshair { date } => {
                let applied = self.session.crosshair(date).is_some();
                Ok(self.ack(applied))
            }
            Command::ToggleOverlay(overlay) => {
                let enabled = self.session.toggle_overlay(overlay);
                Ok(self.ack(enabled))
            }
            Command::TogglePane(pane) => {
                let enabled = self.session.toggle_pane(pane);
                Ok(self.ack(enabled))
            }
            Command::DismissNotification(id) => {
                let removed = self.session.dismiss_notification(id);
                Ok(self.ack(removed))
            }
            Command::ProductsLoaded(result) => {
                match result {
                    Ok(products) => {
                        self.session.add_products(products);
                        self.state.set_products(self.session.catalog().products().to_vec());
                    }
                    Err(e) => self.session.on_products_error(&e),
                }
                Ok(self.ack(true))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Publication
    // -------------------------------------------------------------------------

    fn publish(&mut self) {
        let version = self.state.publish(self.session.snapshot());
        debug!(version, "snapshot published");
    }

    fn after_reaction(&mut self) {
        if self.session.take_render_request() && self.throttle.call(Instant::now()) {
            self.publish();
        }
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    /// Run until every command sender is dropped.
    pub async fn run(mut self) {
        info!("chart driver running");
        loop {
            let deadline = self.throttle.deadline();
            tokio::select! {
                request = self.commands.recv() => {
                    let Some(request) = request else {
                        info!("command channel closed, chart driver stopping");
                        break;
                    };
                    let result = self.handle_command(request.command);
                    if let Err(e) = &result {
                        debug!(error = %e, "command rejected");
                    }
                    if let Some(reply) = request.reply {
                        let _ = reply.send(result);
                    }
                }
                Some((generation, result)) = self.historic_rx.recv() => {
                    let effects = self.session.on_historic_result(generation, result);
                    self.execute(effects);
                }
                Some(message) = self.stream_rx.recv() => {
                    self.session.on_stream_event(message.generation, message.event);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.throttle.poll(Instant::now()) {
                        self.publish();
                    }
                }
            }
            self.after_reaction();
        }

        if let Some(mut handle) = self.stream.take() {
            handle.close();
        }
        self.publish();
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("session", &self.session)
            .field("feeds", &self.feeds)
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}
