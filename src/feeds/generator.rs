// =============================================================================
// Random financial data generator
// =============================================================================
//
// Candles come from a geometric Brownian motion sampled `steps` times per
// candle: open is the first sample, close the last, high/low the extremes.
// Volume follows its own driftless walk with `volume_noise` as volatility.
// Candle dates are aligned to the granularity and the last candle starts at
// `end` floored to the granularity.
// =============================================================================

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{catalog::GENERATOR_PRODUCT, HistoricFeed, HistoricRequest};
use crate::error::FeedError;
use crate::types::{SeriesPoint, MILLIS_PER_SECOND};

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone)]
pub struct DataGenerator {
    pub mu: f64,
    pub sigma: f64,
    pub start_price: f64,
    pub start_volume: f64,
    pub steps: u32,
    pub volume_noise: f64,
    seed: Option<u64>,
}

impl DataGenerator {
    /// A generator with the standard walk parameters. `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            mu: 0.1,
            sigma: 0.1,
            start_price: 100.0,
            start_volume: 100_000.0,
            steps: 50,
            volume_noise: 0.3,
            seed,
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate `candles` candles of `granularity` seconds ending at `end`.
    pub fn generate(&self, end: i64, granularity: u32, candles: u32) -> Vec<SeriesPoint> {
        if candles == 0 || granularity == 0 {
            return Vec::new();
        }
        let step_ms = i64::from(granularity) * MILLIS_PER_SECOND;
        let last = end.div_euclid(step_ms) * step_ms;
        let first = last - i64::from(candles - 1) * step_ms;

        let steps = self.steps.max(1);
        let dt = f64::from(granularity) / SECONDS_PER_YEAR / f64::from(steps);
        let price_drift = (self.mu - self.sigma * self.sigma / 2.0) * dt;
        let price_shock = self.sigma * dt.sqrt();
        let volume_drift = -(self.volume_noise * self.volume_noise / 2.0) * dt;
        let volume_shock = self.volume_noise * dt.sqrt();

        let mut rng = self.rng();
        let mut price = self.start_price;
        let mut volume = self.start_volume;
        let mut out = Vec::with_capacity(candles as usize);

        for i in 0..i64::from(candles) {
            let open = price;
            let (mut high, mut low) = (open, open);
            for _ in 0..steps {
                price *= (price_drift + price_shock * standard_normal(&mut rng)).exp();
                volume *= (volume_drift + volume_shock * standard_normal(&mut rng)).exp();
                high = high.max(price);
                low = low.min(price);
            }
            out.push(SeriesPoint::new(first + i * step_ms, open, high, low, price, volume.round()));
        }
        out
    }
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Box-Muller transform over two uniform samples.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[async_trait]
impl HistoricFeed for DataGenerator {
    async fn fetch(&self, request: &HistoricRequest) -> Result<Vec<SeriesPoint>, FeedError> {
        match request.product.as_deref() {
            None | Some(GENERATOR_PRODUCT) => {}
            Some(other) => {
                return Err(FeedError::UnsupportedProduct(format!(
                    "the data generator cannot produce {other}"
                )))
            }
        }
        let data = self.generate(request.end, request.granularity, request.candles);
        debug!(count = data.len(), granularity = request.granularity, "generated candles");
        Ok(data)
    }
}
