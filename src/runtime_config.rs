// =============================================================================
// Runtime Configuration: chart defaults, feed endpoints and server settings
// =============================================================================
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// Environment variables override the file: FLUXCHART_BIND_ADDR,
// FLUXCHART_PRODUCT, FLUXCHART_PERIOD and QUANDL_API_KEY.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::feeds::catalog::GENERATOR_PRODUCT;
use crate::feeds::{gdax, gdax_stream, quandl};
use crate::indicators::IndicatorSettings;
use crate::session::SessionConfig;
use crate::types::SeriesStyle;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3002".to_string()
}

fn default_product() -> String {
    GENERATOR_PRODUCT.to_string()
}

fn default_period() -> String {
    "day1".to_string()
}

fn default_candles_of_data() -> u32 {
    400
}

fn default_proportion_of_data_to_display() -> f64 {
    0.2
}

fn default_chart_width_px() -> f64 {
    1000.0
}

fn default_navigator_samples() -> usize {
    crate::view::navigator::DEFAULT_SAMPLES
}

fn default_x_tick_spacing_px() -> f64 {
    100.0
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_ws_push_interval_ms() -> u64 {
    500
}

fn default_gdax_rest_url() -> String {
    gdax::DEFAULT_REST_URL.to_string()
}

fn default_gdax_ws_url() -> String {
    gdax_stream::DEFAULT_WS_URL.to_string()
}

fn default_gdax_request_interval_ms() -> u64 {
    1000
}

fn default_quandl_url() -> String {
    quandl::DEFAULT_URL.to_string()
}

fn default_quandl_products() -> Vec<String> {
    vec!["GOOG".to_string()]
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Server -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// How often each WebSocket client is checked for a newer snapshot.
    #[serde(default = "default_ws_push_interval_ms")]
    pub ws_push_interval_ms: u64,

    // --- Initial selection --------------------------------------------------

    #[serde(default = "default_product")]
    pub default_product: String,

    #[serde(default = "default_period")]
    pub default_period: String,

    // --- Chart --------------------------------------------------------------

    /// Candles requested per historic load.
    #[serde(default = "default_candles_of_data")]
    pub candles_of_data: u32,

    /// Fraction of the data shown after a load or reset.
    #[serde(default = "default_proportion_of_data_to_display")]
    pub proportion_of_data_to_display: f64,

    #[serde(default = "default_chart_width_px")]
    pub chart_width_px: f64,

    #[serde(default = "default_navigator_samples")]
    pub navigator_samples: usize,

    #[serde(default = "default_x_tick_spacing_px")]
    pub x_tick_spacing_px: f64,

    /// Minimum spacing between snapshot publications.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default)]
    pub series_style: SeriesStyle,

    #[serde(default)]
    pub indicators: IndicatorSettings,

    // --- Feeds --------------------------------------------------------------

    #[serde(default = "default_gdax_rest_url")]
    pub gdax_rest_url: String,

    #[serde(default = "default_gdax_ws_url")]
    pub gdax_ws_url: String,

    #[serde(default = "default_gdax_request_interval_ms")]
    pub gdax_request_interval_ms: u64,

    /// Add the GDAX product list to the catalog at startup.
    #[serde(default)]
    pub fetch_gdax_products: bool,

    #[serde(default = "default_quandl_url")]
    pub quandl_url: String,

    #[serde(default)]
    pub quandl_api_key: Option<String>,

    /// WIKI dataset codes offered as products.
    #[serde(default = "default_quandl_products")]
    pub quandl_products: Vec<String>,

    /// Fixed seed for the data generator; random when unset.
    #[serde(default)]
    pub generator_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ws_push_interval_ms: default_ws_push_interval_ms(),
            default_product: default_product(),
            default_period: default_period(),
            candles_of_data: default_candles_of_data(),
            proportion_of_data_to_display: default_proportion_of_data_to_display(),
            chart_width_px: default_chart_width_px(),
            navigator_samples: default_navigator_samples(),
            x_tick_spacing_px: default_x_tick_spacing_px(),
            frame_interval_ms: default_frame_interval_ms(),
            series_style: SeriesStyle::default(),
            indicators: IndicatorSettings::default(),
            gdax_rest_url: default_gdax_rest_url(),
            gdax_ws_url: default_gdax_ws_url(),
            gdax_request_interval_ms: default_gdax_request_interval_ms(),
            fetch_gdax_products: false,
            quandl_url: default_quandl_url(),
            quandl_api_key: None,
            quandl_products: default_quandl_products(),
            generator_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            product = %config.default_product,
            period = %config.default_period,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// `load`, falling back to defaults with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default runtime config");
                Self::default()
            }
        }
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(addr) = get("FLUXCHART_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(product) = get("FLUXCHART_PRODUCT") {
            self.default_product = product;
        }
        if let Some(period) = get("FLUXCHART_PERIOD") {
            self.default_period = period;
        }
        if let Some(key) = get("QUANDL_API_KEY") {
            self.quandl_api_key = Some(key);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            candles_of_data: self.candles_of_data,
            proportion_of_data_to_display: self.proportion_of_data_to_display,
            chart_width_px: self.chart_width_px,
            x_tick_spacing_px: self.x_tick_spacing_px,
            navigator_samples: self.navigator_samples,
            series_style: self.series_style,
            indicators: self.indicators,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3002");
        assert_eq!(cfg.default_product, "Data Generator");
        assert_eq!(cfg.default_period, "day1");
        assert_eq!(cfg.candles_of_data, 400);
        assert_eq!(cfg.navigator_samples, 200);
        assert_eq!(cfg.frame_interval_ms, 16);
        assert_eq!(cfg.quandl_products, vec!["GOOG"]);
        assert!(!cfg.fetch_gdax_products);
        assert!((cfg.proportion_of_data_to_display - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_period": "hour1", "indicators": { "rsi_period": 7 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_period, "hour1");
        assert_eq!(cfg.indicators.rsi_period, 7);
        assert_eq!(cfg.indicators.macd_slow, 26);
        assert_eq!(cfg.candles_of_data, 400);
    }

    #[test]
    fn overrides_replace_non_empty_values() {
        let vars: HashMap<&str, &str> = [
            ("FLUXCHART_BIND_ADDR", "127.0.0.1:9000"),
            ("FLUXCHART_PERIOD", " "),
            ("QUANDL_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.default_period, "day1");
        assert_eq!(cfg.quandl_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let path = std::env::temp_dir().join(format!("fluxchart-{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.generator_seed = Some(9);
        cfg.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = RuntimeConfig::load_or_default("/nonexistent/fluxchart.json");
        assert_eq!(cfg, RuntimeConfig::default());
    }
}
