// =============================================================================
// Chart Session: the single owner of chart state
// =============================================================================
//
// The session is synchronous. It never performs I/O itself: operations that
// need the network return `SessionEffect`s for the driver to execute, and the
// driver feeds results back tagged with the generation they were requested
// under. Any result whose generation is not the current one is dropped.
//
// Product/period changes bump the generation. The displayed series is only
// replaced when the matching historic result succeeds, so a failed load
// leaves the previous chart usable.
// =============================================================================

use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ChartError, FeedError};
use crate::events::{ChartEvent, EventBus, SubscriptionId};
use crate::feeds::catalog::{Catalog, Period, Product, SourceKind};
use crate::feeds::notify::{self, Notification, Notifications};
use crate::feeds::{HistoricRequest, StreamEvent};
use crate::indicators::{pane_axis, IndicatorSet, IndicatorSettings, PaneAxis, PrimaryOverlay, SecondaryPane};
use crate::market_data::OhlcBucketer;
use crate::types::{DateRange, SeriesPoint, SeriesStyle, Timestamp};
use crate::view::extent::{y_extent, Padding};
use crate::view::window::visible_range;
use crate::view::{
    date_extent, move_to_latest, move_to_latest_scaled, responsive_tick_count, tracking_latest_data,
    DateScale, Discontinuity, DiscontinuityKind, GestureContext, GestureOutcome, Navigator,
    PanZoomController, TickSelection, TickSelector, ZoomTransform,
};

pub const LOAD_FAILED_MESSAGE: &str =
    "Error loading data. Please make your selection again, or refresh the page.";

const PRIMARY_Y_PADDING: f64 = 0.08;

// ---------------------------------------------------------------------------
// Configuration & effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub candles_of_data: u32,
    pub proportion_of_data_to_display: f64,
    pub chart_width_px: f64,
    pub x_tick_spacing_px: f64,
    pub navigator_samples: usize,
    pub series_style: SeriesStyle,
    pub indicators: IndicatorSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            candles_of_data: 400,
            proportion_of_data_to_display: 0.2,
            chart_width_px: 1000.0,
            x_tick_spacing_px: 100.0,
            navigator_samples: crate::view::navigator::DEFAULT_SAMPLES,
            series_style: SeriesStyle::default(),
            indicators: IndicatorSettings::default(),
        }
    }
}

/// A historic fetch the driver should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub generation: u64,
    pub source: SourceKind,
    pub product: String,
    pub granularity: u32,
    pub candles: u32,
}

impl FetchPlan {
    pub fn request(&self, end: Timestamp) -> HistoricRequest {
        HistoricRequest {
            end,
            granularity: self.granularity,
            candles: self.candles,
            product: Some(self.product.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    CloseStream,
    Fetch(FetchPlan),
    OpenStream {
        generation: u64,
        source: SourceKind,
        product: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureTarget {
    #[default]
    Primary,
    Navigator,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub date: String,
    pub point: SeriesPoint,
    pub price_decimals: u8,
    pub volume_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigatorSnapshot {
    pub points: Vec<SeriesPoint>,
    pub y_domain: Option<(f64, f64)>,
}

/// Everything a renderer needs to draw the chart once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSnapshot {
    pub generation: u64,
    pub product: Option<String>,
    pub period: Option<String>,
    pub source: Option<SourceKind>,
    pub discontinuity: DiscontinuityKind,
    pub loading: LoadingState,
    pub view: Option<DateRange>,
    pub data_extent: Option<DateRange>,
    pub tracking_latest: bool,
    pub series_style: SeriesStyle,
    pub visible: Vec<SeriesPoint>,
    pub y_domain: Option<(f64, f64)>,
    pub x_ticks: Option<TickSelection>,
    pub x_labels: Vec<String>,
    pub crosshair: Option<SeriesPoint>,
    pub legend: Option<Legend>,
    pub overlays: Vec<PrimaryOverlay>,
    pub panes: Vec<SecondaryPane>,
    pub indicators: IndicatorSet,
    pub pane_axes: Vec<PaneAxis>,
    pub navigator: NavigatorSnapshot,
    pub zoom: ZoomTransform,
    pub notifications: Vec<Notification>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct ChartSession {
    config: SessionConfig,
    catalog: Catalog,
    product: Option<Product>,
    period: Option<Period>,
    /// Source of the series currently held in `data`.
    loaded_source: Option<SourceKind>,
    generation: u64,
    data: Vec<SeriesPoint>,
    discontinuity: Arc<dyn Discontinuity>,
    view: Option<DateRange>,
    visible: Range<usize>,
    tracking: bool,
    crosshair: Option<SeriesPoint>,
    bucketer: OhlcBucketer,
    zoom: PanZoomController,
    navigator: Navigator,
    ticks: TickSelector,
    overlays: Vec<PrimaryOverlay>,
    panes: Vec<SecondaryPane>,
    notifications: Notifications,
    loading: LoadingState,
    events: EventBus,
    render_requested: bool,
}

impl ChartSession {
    pub fn new(config: SessionConfig, catalog: Catalog) -> Self {
        let tick_count = responsive_tick_count(config.chart_width_px, config.x_tick_spacing_px, 1);
        Self {
            navigator: Navigator::new(config.navigator_samples),
            ticks: TickSelector::new().with_count(tick_count),
            config,
            catalog,
            product: None,
            period: None,
            loaded_source: None,
            generation: 0,
            data: Vec::new(),
            discontinuity: DiscontinuityKind::Identity.provider(),
            view: None,
            visible: 0..0,
            tracking: false,
            crosshair: None,
            bucketer: OhlcBucketer::default(),
            zoom: PanZoomController::new(),
            overlays: Vec::new(),
            panes: Vec::new(),
            notifications: Notifications::new(),
            loading: LoadingState::Idle,
            events: EventBus::new(),
            render_requested: false,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn data(&self) -> &[SeriesPoint] {
        &self.data
    }

    pub fn view(&self) -> Option<DateRange> {
        self.view
    }

    pub fn tracking_latest(&self) -> bool {
        self.tracking
    }

    pub fn loading(&self) -> &LoadingState {
        &self.loading
    }

    pub fn product(&self) -> Option<&Product> {
        self.product.as_ref()
    }

    pub fn period(&self) -> Option<&Period> {
        self.period.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&ChartEvent) + Send + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// True once since the last call if anything visible changed.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }

    fn emit(&mut self, event: ChartEvent) {
        self.events.emit(&event);
        self.render_requested = true;
    }

    fn data_extent(&self) -> Option<DateRange> {
        date_extent(&self.data)
    }

    fn visible_points(&self) -> &[SeriesPoint] {
        self.data.get(self.visible.clone()).unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Product & period selection
    // -------------------------------------------------------------------------

    /// Select `product_id`, at `period_id` or else the current period when the
    /// product offers it, or else its first period.
    pub fn change_product(
        &mut self,
        product_id: &str,
        period_id: Option<&str>,
    ) -> Result<Vec<SessionEffect>, ChartError> {
        let product = self.catalog.find(product_id)?.clone();
        let period = match period_id {
            Some(id) => product.period(id)?.clone(),
            None => self
                .period
                .as_ref()
                .and_then(|current| product.period(&current.id).ok())
                .or_else(|| product.periods.first())
                .cloned()
                .ok_or_else(|| ChartError::InvalidConfiguration(format!("{} has no periods", product.id)))?,
        };
        self.select(product, period)
    }

    pub fn change_period(&mut self, period_id: &str) -> Result<Vec<SessionEffect>, ChartError> {
        let product = self.product.clone().ok_or(ChartError::NoProductSelected)?;
        let period = product.period(period_id)?.clone();
        self.select(product, period)
    }

    fn select(&mut self, product: Product, period: Period) -> Result<Vec<SessionEffect>, ChartError> {
        let tick_count = responsive_tick_count(self.config.chart_width_px, self.config.x_tick_spacing_px, 1);
        self.ticks = TickSelector::new()
            .with_count(tick_count)
            .with_minimum_interval(period.tick_unit, period.tick_step)?;

        self.generation += 1;
        self.zoom.end_gesture();
        self.navigator.zoom_mut().end_gesture();
        self.loading = LoadingState::Loading;
        self.render_requested = true;

        info!(
            product = %product.id,
            period = %period.id,
            generation = self.generation,
            "chart selection changed"
        );

        let plan = FetchPlan {
            generation: self.generation,
            source: product.source,
            product: product.id.clone(),
            granularity: period.seconds,
            candles: self.config.candles_of_data,
        };
        self.product = Some(product);
        self.period = Some(period);
        Ok(vec![SessionEffect::CloseStream, SessionEffect::Fetch(plan)])
    }

    /// Add products discovered at runtime, e.g. the GDAX product list.
    pub fn add_products(&mut self, products: Vec<Product>) -> usize {
        let added = self.catalog.extend(products);
        if added > 0 {
            info!(added, total = self.catalog.products().len(), "catalog extended");
            self.render_requested = true;
        }
        added
    }

    pub fn on_products_error(&mut self, err: &FeedError) {
        warn!(error = %err, "product list unavailable");
        self.notifications.push(notify::products_error_message(err));
        self.render_requested = true;
    }

    // -------------------------------------------------------------------------
    // Feed results
    // -------------------------------------------------------------------------

    pub fn on_historic_result(
        &mut self,
        generation: u64,
        result: Result<Vec<SeriesPoint>, FeedError>,
    ) -> Vec<SessionEffect> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "stale historic result dropped");
            return Vec::new();
        }
        let (Some(product), Some(period)) = (self.product.clone(), self.period.clone()) else {
            return Vec::new();
        };

        match result {
            Ok(mut data) => {
                data.sort_by_key(|p| p.date);
                info!(product = %product.id, period = %period.id, points = data.len(), "historic data loaded");

                self.data = data;
                self.crosshair = None;
                self.loaded_source = Some(product.source);
                self.discontinuity = product.source.discontinuity().provider();
                self.bucketer.set_granularity(period.seconds);
                self.loading = LoadingState::Loaded;
                self.view = None;
                self.visible = 0..0;
                self.reset_to_latest();
                if self.data.is_empty() && self.tracking {
                    self.tracking = false;
                    self.emit(ChartEvent::TrackingLatestChange { tracking: false });
                }
                self.emit(ChartEvent::HistoricDataLoaded {
                    product: product.id.clone(),
                    points: self.data.len(),
                });

                if product.source.has_streaming() {
                    vec![SessionEffect::OpenStream {
                        generation,
                        source: product.source,
                        product: product.id,
                    }]
                } else {
                    Vec::new()
                }
            }
            Err(err) => {
                warn!(product = %product.id, error = %err, "historic data request failed");
                let message = notify::historic_error_message(product.source, &err);
                self.loading = LoadingState::Failed(LOAD_FAILED_MESSAGE.to_string());
                self.notifications.push(message.clone());
                self.emit(ChartEvent::HistoricFeedError { message });
                Vec::new()
            }
        }
    }

    pub fn on_stream_event(&mut self, generation: u64, event: StreamEvent) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "stale stream event dropped");
            return;
        }
        match event {
            StreamEvent::Open => info!(generation, "live stream open"),
            StreamEvent::Trade(trade) => {
                let update = self.bucketer.apply(&mut self.data, &trade);
                let point = self.data[update.index()];
                self.emit(ChartEvent::NewTrade { trade, point });

                match (self.view, self.data_extent()) {
                    (Some(view), Some(extent)) if self.tracking => {
                        let next = move_to_latest(self.discontinuity.as_ref(), view, extent);
                        self.on_view_change(next);
                    }
                    (None, Some(_)) => self.reset_to_latest(),
                    (Some(view), Some(_)) => {
                        self.visible = visible_range(view, &self.data);
                    }
                    _ => {}
                }
            }
            other => {
                if let Some(message) = notify::stream_event_message(&other) {
                    warn!(message = %message, "live stream problem");
                    self.notifications.push(message.clone());
                    self.emit(ChartEvent::StreamingFeedNotice { message });
                } else {
                    debug!(event = ?other, "live stream event");
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // View domain
    // -------------------------------------------------------------------------

    /// Show the latest slice of the data, `proportion_of_data_to_display` of
    /// its width.
    pub fn reset_to_latest(&mut self) {
        let Some(extent) = self.data_extent() else {
            return;
        };
        let domain = move_to_latest_scaled(
            self.discontinuity.as_ref(),
            extent,
            extent,
            self.config.proportion_of_data_to_display,
        );
        self.on_view_change(domain);
    }

    pub fn on_view_change(&mut self, domain: DateRange) {
        if self.data.is_empty() {
            return;
        }
        let domain = domain.sorted();
        self.view = Some(domain);
        self.visible = visible_range(domain, &self.data);
        debug!(%domain, "view changed");
        self.emit(ChartEvent::ViewChange { domain });

        let tracking = tracking_latest_data(domain, &self.data);
        if tracking != self.tracking {
            self.tracking = tracking;
            self.emit(ChartEvent::TrackingLatestChange { tracking });
        }
    }

    // -------------------------------------------------------------------------
    // Gestures
    // -------------------------------------------------------------------------

    fn gesture_context(&self) -> Option<GestureContext> {
        let view = self.view?;
        Some(GestureContext {
            view: DateScale::new(view, (0.0, self.config.chart_width_px), Arc::clone(&self.discontinuity)),
            data_extent: self.data_extent()?,
            tracking_latest: self.tracking,
        })
    }

    fn controller(&mut self, target: GestureTarget) -> &mut PanZoomController {
        match target {
            GestureTarget::Primary => &mut self.zoom,
            GestureTarget::Navigator => self.navigator.zoom_mut(),
        }
    }

    pub fn begin_pan(&mut self, target: GestureTarget) {
        if let Some(ctx) = self.gesture_context() {
            self.controller(target).begin_pan(ctx);
        }
    }

    pub fn begin_zoom(&mut self, target: GestureTarget) {
        if let Some(ctx) = self.gesture_context() {
            self.controller(target).begin_zoom(ctx);
        }
    }

    pub fn pan_by(&mut self, target: GestureTarget, dx: f64) -> GestureOutcome {
        let outcome = self.controller(target).pan_by(dx);
        self.apply_outcome(outcome)
    }

    pub fn zoom_by(&mut self, target: GestureTarget, factor: f64, anchor: f64) -> GestureOutcome {
        let outcome = self.controller(target).zoom_by(factor, anchor);
        self.apply_outcome(outcome)
    }

    pub fn end_gesture(&mut self, target: GestureTarget) {
        self.controller(target).end_gesture();
    }

    /// A complete pan in one call.
    pub fn pan(&mut self, target: GestureTarget, dx: f64) -> GestureOutcome {
        self.begin_pan(target);
        let outcome = self.pan_by(target, dx);
        self.end_gesture(target);
        outcome
    }

    /// A complete zoom in one call.
    pub fn zoom(&mut self, target: GestureTarget, factor: f64, anchor: f64) -> GestureOutcome {
        self.begin_zoom(target);
        let outcome = self.zoom_by(target, factor, anchor);
        self.end_gesture(target);
        outcome
    }

    fn apply_outcome(&mut self, outcome: GestureOutcome) -> GestureOutcome {
        debug!(?outcome, "gesture applied");
        if let GestureOutcome::ViewChange(domain) = outcome {
            self.on_view_change(domain);
        }
        outcome
    }

    /// A navigator brush update. `ended` marks the release.
    pub fn brush(&mut self, extent: DateRange, ended: bool) -> Option<DateRange> {
        let data_extent = self.data_extent()?;
        let view = self.view?;
        let domain = if ended {
            self.navigator
                .brush_ended(extent, view, &self.data, &self.discontinuity)
                .or_else(|| self.navigator.brush_moved(extent, data_extent))
        } else {
            self.navigator.brush_moved(extent, data_extent)
        }?;
        self.on_view_change(domain);
        Some(domain)
    }

    /// Snap the crosshair to the visible point nearest `date`; `None` clears it.
    pub fn crosshair(&mut self, date: Option<Timestamp>) -> Option<SeriesPoint> {
        let point = date.and_then(|date| {
            self.visible_points()
                .iter()
                .min_by_key(|p| (p.date - date).abs())
                .copied()
        });
        if point != self.crosshair {
            self.crosshair = point;
            self.emit(ChartEvent::CrosshairChange { point });
        }
        point
    }

    // -------------------------------------------------------------------------
    // Panes, overlays & notifications
    // -------------------------------------------------------------------------

    /// Returns whether the overlay is now shown.
    pub fn toggle_overlay(&mut self, overlay: PrimaryOverlay) -> bool {
        self.render_requested = true;
        toggle(&mut self.overlays, overlay)
    }

    /// Returns whether the pane is now shown.
    pub fn toggle_pane(&mut self, pane: SecondaryPane) -> bool {
        self.render_requested = true;
        toggle(&mut self.panes, pane)
    }

    pub fn dismiss_notification(&mut self, id: Uuid) -> bool {
        let removed = self.notifications.dismiss(id);
        self.render_requested |= removed;
        removed
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> ChartSnapshot {
        let visible = self.visible_points().to_vec();
        let indicators = IndicatorSet::compute(&self.data, &self.config.indicators, &self.overlays, &self.panes);
        let pane_axes = self
            .panes
            .iter()
            .map(|&pane| pane_axis(pane, &visible, &indicators.slice(self.visible.clone())))
            .collect();
        let x_ticks = self
            .view
            .map(|view| self.ticks.select(view, self.discontinuity.as_ref()));
        let navigator_points = self.navigator.sample(&self.data);

        let legend = match (&self.period, &self.product) {
            (Some(period), Some(product)) => self.crosshair.or_else(|| self.data.last().copied()).map(|point| Legend {
                date: chrono::DateTime::<chrono::Utc>::from_timestamp_millis(point.date)
                    .map(|dt| dt.format(&period.time_format).to_string())
                    .unwrap_or_default(),
                point,
                price_decimals: product.price_decimals,
                volume_decimals: product.volume_decimals,
            }),
            _ => None,
        };

        ChartSnapshot {
            generation: self.generation,
            product: self.product.as_ref().map(|p| p.id.clone()),
            period: self.period.as_ref().map(|p| p.id.clone()),
            source: self.loaded_source,
            discontinuity: self.discontinuity.kind(),
            loading: self.loading.clone(),
            view: self.view,
            data_extent: self.data_extent(),
            tracking_latest: self.tracking,
            series_style: self.config.series_style,
            y_domain: y_extent(
                &visible,
                self.config.series_style.extent_fields(),
                Padding::symmetric(PRIMARY_Y_PADDING),
            ),
            x_labels: x_ticks.as_ref().map(TickSelection::labels).unwrap_or_default(),
            x_ticks,
            visible,
            crosshair: self.crosshair,
            legend,
            overlays: self.overlays.clone(),
            panes: self.panes.clone(),
            indicators: indicators.slice(self.visible.clone()),
            pane_axes,
            navigator: NavigatorSnapshot {
                y_domain: self.navigator.y_domain(&navigator_points),
                points: navigator_points,
            },
            zoom: self.zoom.transform(),
            notifications: self.notifications.messages().to_vec(),
        }
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if let Some(pos) = items.iter().position(|i| *i == item) {
        items.remove(pos);
        false
    } else {
        items.push(item);
        true
    }
}

impl std::fmt::Debug for ChartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartSession")
            .field("product", &self.product.as_ref().map(|p| &p.id))
            .field("period", &self.period.as_ref().map(|p| &p.id))
            .field("generation", &self.generation)
            .field("points", &self.data.len())
            .field("view", &self.view)
            .field("tracking", &self.tracking)
            .field("loading", &self.loading)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::catalog::{default_periods, GENERATOR_PRODUCT};
    use crate::types::{Trade, MILLIS_PER_DAY, MILLIS_PER_MINUTE};
    use std::sync::Mutex;

    fn day(n: i64) -> Timestamp {
        n * MILLIS_PER_DAY
    }

    fn daily(from: i64, to: i64) -> Vec<SeriesPoint> {
        (from..=to)
            .map(|d| SeriesPoint::new(day(d), 10.0, 12.0, 9.0, 11.0, 100.0))
            .collect()
    }

    fn minutes(n: i64) -> Vec<SeriesPoint> {
        (0..n)
            .map(|m| SeriesPoint::new(m * MILLIS_PER_MINUTE, 10.0, 12.0, 9.0, 11.0, 1.0))
            .collect()
    }

    fn session() -> ChartSession {
        let mut catalog = Catalog::with_defaults(&["GOOG".to_string()]);
        catalog.extend([Product::new("BTC-USD", SourceKind::Gdax, default_periods())]);
        ChartSession::new(SessionConfig::default(), catalog)
    }

    fn loaded(product: &str, period: &str, data: Vec<SeriesPoint>) -> ChartSession {
        let mut s = session();
        s.change_product(product, Some(period)).unwrap();
        let generation = s.generation();
        s.on_historic_result(generation, Ok(data));
        s
    }

    fn http_error() -> FeedError {
        FeedError::Http {
            status: 404,
            status_text: "Not Found".into(),
            body: Some(serde_json::json!({"message": "NotFound"})),
        }
    }

    #[test]
    fn change_product_closes_stream_and_fetches() {
        let mut s = session();
        let effects = s.change_product("BTC-USD", Some("minute5")).unwrap();
        assert_eq!(effects[0], SessionEffect::CloseStream);
        match &effects[1] {
            SessionEffect::Fetch(plan) => {
                assert_eq!(plan.generation, 1);
                assert_eq!(plan.granularity, 300);
                assert_eq!(plan.candles, 400);
                assert_eq!(plan.request(day(1)).product.as_deref(), Some("BTC-USD"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*s.loading(), LoadingState::Loading);
    }

    #[test]
    fn change_product_keeps_period_when_offered() {
        let mut s = session();
        s.change_product(GENERATOR_PRODUCT, Some("day1")).unwrap();
        s.change_product("GOOG", None).unwrap();
        assert_eq!(s.period().unwrap().id, "day1");
        s.change_product(GENERATOR_PRODUCT, Some("minute1")).unwrap();
        s.change_product("GOOG", None).unwrap();
        assert_eq!(s.period().unwrap().id, "week1");
    }

    #[test]
    fn unknown_selection_is_an_error() {
        let mut s = session();
        assert!(matches!(s.change_product("MSFT", None), Err(ChartError::UnknownProduct(_))));
        assert!(matches!(s.change_period("day1"), Err(ChartError::NoProductSelected)));
        s.change_product("GOOG", None).unwrap();
        assert!(matches!(s.change_period("minute1"), Err(ChartError::UnknownPeriod { .. })));
        assert_eq!(s.generation(), 1);
    }

    #[test]
    fn historic_success_shows_latest_fifth() {
        let s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        assert_eq!(s.view(), Some(DateRange::new(day(16), day(20))));
        assert!(s.tracking_latest());
        assert_eq!(*s.loading(), LoadingState::Loaded);
    }

    #[test]
    fn historic_success_emits_loaded_event() {
        let mut s = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        s.subscribe(move |e| log.lock().unwrap().push(e.clone()));
        s.change_product(GENERATOR_PRODUCT, Some("day1")).unwrap();
        s.on_historic_result(1, Ok(daily(0, 20)));
        let events = seen.lock().unwrap();
        assert!(events.contains(&ChartEvent::HistoricDataLoaded {
            product: GENERATOR_PRODUCT.into(),
            points: 21
        }));
        assert!(events.contains(&ChartEvent::TrackingLatestChange { tracking: true }));
    }

    #[test]
    fn unsorted_results_are_sorted() {
        let mut data = daily(0, 5);
        data.reverse();
        let s = loaded(GENERATOR_PRODUCT, "day1", data);
        assert!(s.data().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn stale_historic_result_is_ignored() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        s.change_product(GENERATOR_PRODUCT, Some("hour1")).unwrap();
        let effects = s.on_historic_result(1, Ok(daily(100, 110)));
        assert!(effects.is_empty());
        assert_eq!(s.data().len(), 21);
        assert_eq!(s.data()[0].date, day(0));
    }

    #[test]
    fn historic_failure_leaves_chart_untouched() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        let view = s.view();
        s.change_product("BTC-USD", Some("day1")).unwrap();
        let effects = s.on_historic_result(2, Err(http_error()));
        assert!(effects.is_empty());
        assert_eq!(s.data().len(), 21);
        assert_eq!(s.view(), view);
        assert_eq!(*s.loading(), LoadingState::Failed(LOAD_FAILED_MESSAGE.into()));
        assert_eq!(
            s.notifications().messages()[0].message,
            "Error getting historic data: Not Found. NotFound"
        );
    }

    #[test]
    fn streaming_source_opens_stream_after_load() {
        let mut s = session();
        s.change_product("BTC-USD", Some("minute1")).unwrap();
        let effects = s.on_historic_result(1, Ok(minutes(100)));
        assert_eq!(
            effects,
            vec![SessionEffect::OpenStream {
                generation: 1,
                source: SourceKind::Gdax,
                product: "BTC-USD".into()
            }]
        );
    }

    #[test]
    fn trade_while_tracking_follows_latest() {
        let mut s = loaded("BTC-USD", "minute1", minutes(100));
        let before = s.view().unwrap();
        let last = s.data().last().unwrap().date;
        s.on_stream_event(
            1,
            StreamEvent::Trade(Trade {
                time: last + MILLIS_PER_MINUTE + 5,
                price: 13.0,
                size: 2.0,
            }),
        );
        let after = s.view().unwrap();
        assert_eq!(s.data().len(), 101);
        assert_eq!(after.end, last + MILLIS_PER_MINUTE);
        assert_eq!(after.width(), before.width());
        assert!(s.tracking_latest());
    }

    #[test]
    fn trade_while_panned_keeps_view() {
        let mut s = loaded("BTC-USD", "minute1", minutes(100));
        s.pan(GestureTarget::Primary, 300.0);
        assert!(!s.tracking_latest());
        let view = s.view();
        let last = s.data().last().unwrap().date;
        s.on_stream_event(1, StreamEvent::Trade(Trade { time: last + 10, price: 20.0, size: 1.0 }));
        assert_eq!(s.view(), view);
        let merged = s.data().last().unwrap();
        assert_eq!((merged.high, merged.close, merged.volume), (20.0, 20.0, 2.0));
    }

    #[test]
    fn stale_stream_events_are_ignored() {
        let mut s = loaded("BTC-USD", "minute1", minutes(10));
        s.change_product("BTC-USD", Some("minute5")).unwrap();
        s.on_stream_event(1, StreamEvent::Trade(Trade { time: 0, price: 99.0, size: 1.0 }));
        assert_eq!(s.data()[0].high, 12.0);
    }

    #[test]
    fn unclean_close_adds_notification() {
        let mut s = loaded("BTC-USD", "minute1", minutes(10));
        s.on_stream_event(1, StreamEvent::Close { code: 1011, reason: String::new(), clean: false });
        s.on_stream_event(1, StreamEvent::Close { code: 1006, reason: String::new(), clean: false });
        assert_eq!(s.notifications().len(), 1);
        assert_eq!(
            s.notifications().messages()[0].message,
            "Disconnected from live stream: 1011 Unkown reason."
        );
    }

    #[test]
    fn pan_moves_view_and_stops_tracking() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        let outcome = s.pan(GestureTarget::Primary, 250.0);
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(day(15), day(19))));
        assert!(!s.tracking_latest());
        s.reset_to_latest();
        assert!(s.tracking_latest());
    }

    #[test]
    fn navigator_refuses_to_pan() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        assert_eq!(s.pan(GestureTarget::Navigator, 250.0), GestureOutcome::Ignored);
        assert_eq!(s.view(), Some(DateRange::new(day(16), day(20))));
    }

    #[test]
    fn brush_sets_and_centres_view() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        assert_eq!(s.brush(DateRange::new(day(2), day(6)), false), Some(DateRange::new(day(2), day(6))));
        let click = DateRange::new(day(10), day(10));
        assert_eq!(s.brush(click, true), Some(DateRange::new(day(8), day(12))));
    }

    #[test]
    fn crosshair_snaps_to_nearest_visible_point() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        let point = s.crosshair(Some(day(17) + MILLIS_PER_DAY / 3)).unwrap();
        assert_eq!(point.date, day(17));
        assert!(s.crosshair(None).is_none());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = loaded("GOOG", "day1", daily(0, 20));
        s.toggle_pane(SecondaryPane::Rsi);
        assert!(s.toggle_overlay(PrimaryOverlay::MovingAverage));
        let snap = s.snapshot();
        assert_eq!(snap.product.as_deref(), Some("GOOG"));
        assert_eq!(snap.source, Some(SourceKind::Quandl));
        assert_eq!(snap.discontinuity, DiscontinuityKind::SkipWeekends);
        assert_eq!(snap.visible.len(), snap.indicators.moving_average.as_ref().unwrap().len());
        assert_eq!(snap.pane_axes.len(), 1);
        assert!(snap.x_ticks.is_some());
        assert!(snap.legend.is_some());
        assert!(!snap.navigator.points.is_empty());
        assert!(!s.toggle_overlay(PrimaryOverlay::MovingAverage));
    }

    #[test]
    fn dismiss_notification_by_id() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 5));
        s.change_product(GENERATOR_PRODUCT, Some("day1")).unwrap();
        s.on_historic_result(2, Err(http_error()));
        let id = s.notifications().messages()[0].id;
        assert!(s.dismiss_notification(id));
        assert!(s.notifications().is_empty());
    }

    #[test]
    fn render_requests_are_coalesced() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        assert!(s.take_render_request());
        assert!(!s.take_render_request());
        s.pan(GestureTarget::Primary, 10.0);
        s.pan(GestureTarget::Primary, 10.0);
        assert!(s.take_render_request());
        assert!(!s.take_render_request());
    }

    #[test]
    fn empty_reload_clears_visible_slice() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 20));
        assert!(s.tracking_latest());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        s.subscribe(move |e| log.lock().unwrap().push(e.clone()));

        s.change_period("hour1").unwrap();
        let generation = s.generation();
        s.on_historic_result(generation, Ok(Vec::new()));

        assert!(s.data().is_empty());
        assert_eq!(s.view(), None);
        assert!(!s.tracking_latest());
        let snap = s.snapshot();
        assert!(snap.visible.is_empty());
        assert_eq!(snap.data_extent, None);
        assert_eq!(s.crosshair(Some(day(3))), None);
        assert!(seen
            .lock()
            .unwrap()
            .contains(&ChartEvent::TrackingLatestChange { tracking: false }));
    }

    #[test]
    fn shorter_reload_keeps_snapshot_in_bounds() {
        let mut s = loaded(GENERATOR_PRODUCT, "day1", daily(0, 100));
        s.change_period("week1").unwrap();
        let generation = s.generation();
        s.on_historic_result(generation, Ok(daily(0, 4)));
        let snap = s.snapshot();
        assert!(!snap.visible.is_empty());
        assert!(snap.visible.len() <= 5);
        assert_eq!(s.crosshair(Some(day(4))).map(|p| p.date), Some(day(4)));
    }
}
