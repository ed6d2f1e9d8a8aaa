//! Evaluator and strategy configuration.
//!
//! `StrategyConfig` is internally tagged by `id`, so a TOML table
//! `[strategy]` with `id = "fcb"` selects the Fractal Chaos Bands pipeline and
//! every omitted parameter takes its default.

use serde::{Deserialize, Serialize};

/// Which candidate pipeline to run, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Fractal Chaos Bands breakout.
    Fcb(FcbParams),
    /// Heikin-Ashi Supertrend crossing a fast EMA inside an EMA regime.
    SupertrendEma(SupertrendEmaParams),
    /// Triple SMA crossover.
    SmaCross(SmaCrossParams),
    /// Heikin-Ashi Bollinger breakout with MACD confirmation.
    BollingerMacd(BollingerMacdParams),
}

impl StrategyConfig {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Fcb(_) => "fcb",
            Self::SupertrendEma(_) => "supertrend_ema",
            Self::SmaCross(_) => "sma_cross",
            Self::BollingerMacd(_) => "bollinger_macd",
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Fcb(FcbParams::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FcbParams {
    /// Candles on each side of a swing point.
    pub fractal_period: usize,
    /// Band width = fractal range × this.
    pub band_multiplier: f64,
    /// Bands are pushed out by band width × volatility × this.
    pub volatility_scale: f64,
    pub atr_period: usize,
}

impl Default for FcbParams {
    fn default() -> Self {
        Self {
            fractal_period: 5,
            band_multiplier: 1.5,
            volatility_scale: 10.0,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupertrendEmaParams {
    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,
    pub fast_ema: usize,
    pub slow_ema: usize,
}

impl Default for SupertrendEmaParams {
    fn default() -> Self {
        Self {
            supertrend_period: 13,
            supertrend_multiplier: 1.3,
            fast_ema: 16,
            slow_ema: 165,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossParams {
    pub fast: usize,
    pub mid: usize,
    pub slow: usize,
}

impl Default for SmaCrossParams {
    fn default() -> Self {
        Self {
            fast: 7,
            mid: 9,
            slow: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerMacdParams {
    pub bb_period: usize,
    pub bb_stds: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// How many recent candles (including the latest) a MACD cross may lie in.
    pub cross_window: usize,
}

impl Default for BollingerMacdParams {
    fn default() -> Self {
        Self {
            bb_period: 6,
            bb_stds: 1.3,
            macd_fast: 6,
            macd_slow: 19,
            macd_signal: 6,
            cross_window: 3,
        }
    }
}

/// Volatility gate: ATR / close must reach `min_threshold` (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityFilter {
    pub enabled: bool,
    pub min_threshold: f64,
    pub atr_period: usize,
}

impl Default for VolatilityFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_threshold: 0.0001,
            atr_period: 14,
        }
    }
}

impl VolatilityFilter {
    pub fn passes(&self, volatility: f64) -> bool {
        volatility >= self.min_threshold
    }
}

/// Trend-strength gate: ADX must reach `min_threshold` (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFilter {
    pub enabled: bool,
    pub min_threshold: f64,
    pub adx_period: usize,
}

impl Default for TrendFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_threshold: 25.0,
            adx_period: 20,
        }
    }
}

impl TrendFilter {
    pub fn passes(&self, adx: f64) -> bool {
        adx >= self.min_threshold
    }
}

/// Everything the evaluator needs besides the candles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub strategy: StrategyConfig,
    pub min_history: usize,
    pub confirmation_bars: usize,
    pub volatility_filter: VolatilityFilter,
    pub trend_filter: TrendFilter,
    /// Require the latest candle body to be larger than the previous one.
    pub body_expansion: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            min_history: 50,
            confirmation_bars: 2,
            volatility_filter: VolatilityFilter::default(),
            trend_filter: TrendFilter::default(),
            body_expansion: false,
        }
    }
}
