// =============================================================================
// Product & period catalog
// =============================================================================
//
// A product names a data source and the periods it can be charted at. The
// source kind decides which historic feed fetches it, whether a live trade
// stream follows, how feed errors are worded and which discontinuity
// provider shapes its x axis.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ChartError;
use crate::view::discontinuity::DiscontinuityKind;
use crate::view::ticks::TickUnit;

pub const GENERATOR_PRODUCT: &str = "Data Generator";

/// A candle period: its bucket width and the finest axis ticks it allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub display: String,
    pub seconds: u32,
    pub tick_unit: TickUnit,
    pub tick_step: u32,
    /// strftime pattern for the legend's date.
    pub time_format: String,
}

impl Period {
    fn new(id: &str, display: &str, seconds: u32, tick_unit: TickUnit, tick_step: u32, time_format: &str) -> Self {
        Self {
            id: id.to_string(),
            display: display.to_string(),
            seconds,
            tick_unit,
            tick_step,
            time_format: time_format.to_string(),
        }
    }
}

/// The five standard periods, coarsest first.
pub fn default_periods() -> Vec<Period> {
    vec![
        Period::new("week1", "Weekly", 60 * 60 * 24 * 7, TickUnit::Week, 1, "%b %d"),
        Period::new("day1", "Daily", 60 * 60 * 24, TickUnit::Day, 1, "%b %d"),
        Period::new("hour1", "1 Hr", 60 * 60, TickUnit::Hour, 1, "%b %d %Hh"),
        Period::new("minute5", "5 Min", 60 * 5, TickUnit::Minute, 5, "%H:%M"),
        Period::new("minute1", "1 Min", 60, TickUnit::Minute, 1, "%H:%M"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Generated,
    Gdax,
    Quandl,
}

impl SourceKind {
    pub fn discontinuity(&self) -> DiscontinuityKind {
        match self {
            Self::Quandl => DiscontinuityKind::SkipWeekends,
            Self::Generated | Self::Gdax => DiscontinuityKind::Identity,
        }
    }

    pub fn has_streaming(&self) -> bool {
        matches!(self, Self::Gdax)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub display: String,
    pub periods: Vec<Period>,
    pub source: SourceKind,
    pub price_decimals: u8,
    pub volume_decimals: u8,
}

impl Product {
    pub fn new(id: impl Into<String>, source: SourceKind, periods: Vec<Period>) -> Self {
        let id = id.into();
        Self {
            display: id.clone(),
            id,
            periods,
            source,
            price_decimals: 2,
            volume_decimals: 3,
        }
    }

    pub fn period(&self, id: &str) -> Result<&Period, ChartError> {
        self.periods
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ChartError::UnknownPeriod {
                product: self.id.clone(),
                period: id.to_string(),
            })
    }
}

/// Every product the chart can show. Order is menu order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// The generator plus one Quandl product per configured dataset.
    pub fn with_defaults(quandl_datasets: &[String]) -> Self {
        let mut products = vec![Product::new(GENERATOR_PRODUCT, SourceKind::Generated, default_periods())];
        let daily_and_weekly: Vec<Period> = default_periods()
            .into_iter()
            .filter(|p| p.id == "week1" || p.id == "day1")
            .collect();
        products.extend(
            quandl_datasets
                .iter()
                .map(|id| Product::new(id.clone(), SourceKind::Quandl, daily_and_weekly.clone())),
        );
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find(&self, id: &str) -> Result<&Product, ChartError> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ChartError::UnknownProduct(id.to_string()))
    }

    /// Add products, skipping ids already present. Returns how many were new.
    pub fn extend(&mut self, products: impl IntoIterator<Item = Product>) -> usize {
        let before = self.products.len();
        for product in products {
            if !self.products.iter().any(|p| p.id == product.id) {
                self.products.push(product);
            }
        }
        self.products.len() - before
    }
}
