use super::config::EvaluatorConfig;
use super::factory::{create_rule, FactoryError};
use super::{BreakoutLevels, CandidateRule, Features, Signal, Verdict};
use crate::aggregate::CandleSeries;
use crate::domain::{Candle, Direction};
use crate::indicators::{last_valid, Adx, Atr, Indicator};

/// Strategy pipeline plus the shared confirmation gates.
///
/// Evaluation is pure: the same candles always give the same `Signal`.
pub struct SignalEvaluator {
    config: EvaluatorConfig,
    rule: Box<dyn CandidateRule>,
    atr: Atr,
    adx: Adx,
}

impl std::fmt::Debug for SignalEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEvaluator")
            .field("strategy", &self.rule.name())
            .field("config", &self.config)
            .finish()
    }
}

impl SignalEvaluator {
    pub fn new(config: EvaluatorConfig) -> Result<Self, FactoryError> {
        let rule = create_rule(&config.strategy)?;
        if config.volatility_filter.atr_period == 0 {
            return Err(FactoryError::InvalidParam {
                strategy: config.strategy.id(),
                param: "volatility_filter.atr_period",
                reason: "must be >= 1",
            });
        }
        if config.trend_filter.adx_period == 0 {
            return Err(FactoryError::InvalidParam {
                strategy: config.strategy.id(),
                param: "trend_filter.adx_period",
                reason: "must be >= 1",
            });
        }
        let atr = Atr::new(config.volatility_filter.atr_period);
        let adx = Adx::new(config.trend_filter.adx_period);
        Ok(Self {
            config,
            rule,
            atr,
            adx,
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn strategy(&self) -> &str {
        self.rule.name()
    }

    pub fn evaluate(&self, series: &CandleSeries) -> Signal {
        self.evaluate_candles(series.instrument(), series.candles())
    }

    /// Run the candidate rule, then every enabled gate, in order:
    /// momentum → trend → volatility → body expansion → persistence.
    pub fn evaluate_candles(&self, instrument: &str, candles: &[Candle]) -> Signal {
        let need = self.config.min_history;
        if candles.len() < need {
            return Signal::rejected(
                instrument,
                Verdict::InsufficientHistory {
                    have: candles.len(),
                    need,
                },
                Features::new(),
            );
        }

        let candidate = self.rule.candidate(candles);
        let mut features = candidate.features;
        if let Some(missing) = candidate.unavailable {
            return Signal::rejected(instrument, Verdict::FeatureUnavailable(missing), features);
        }

        let Some(last) = candles.last() else {
            return Signal::rejected(instrument, Verdict::NoCandidate, features);
        };
        features.insert("close".into(), last.close);

        let volatility = last_valid(&self.atr.compute(candles)).map(|atr| {
            if last.close > 0.0 {
                atr / last.close
            } else {
                0.0
            }
        });
        let trend_strength = last_valid(&self.adx.compute(candles));
        if let Some(v) = volatility {
            features.insert("volatility".into(), v);
        }
        if let Some(t) = trend_strength {
            features.insert("trend_strength".into(), t);
        }

        let direction = candidate.direction;
        if direction.is_flat() {
            return Signal::rejected(instrument, Verdict::NoCandidate, features);
        }

        if let Some(momentum) = candidate.momentum {
            if momentum * direction.sign() <= 0.0 {
                return Signal::rejected(instrument, Verdict::MomentumMismatch, features);
            }
        }

        let trend = &self.config.trend_filter;
        if trend.enabled {
            match trend_strength {
                Some(t) if trend.passes(t) => {}
                Some(_) => return Signal::rejected(instrument, Verdict::TrendTooWeak, features),
                None => {
                    return Signal::rejected(
                        instrument,
                        Verdict::FeatureUnavailable(self.adx.name().to_string()),
                        features,
                    )
                }
            }
        }

        let vol = &self.config.volatility_filter;
        if vol.enabled {
            match volatility {
                Some(v) if vol.passes(v) => {}
                Some(_) => {
                    return Signal::rejected(instrument, Verdict::VolatilityTooLow, features)
                }
                None => {
                    return Signal::rejected(
                        instrument,
                        Verdict::FeatureUnavailable(self.atr.name().to_string()),
                        features,
                    )
                }
            }
        }

        if self.config.body_expansion && !body_expanding(candles) {
            return Signal::rejected(instrument, Verdict::BodyNotExpanding, features);
        }

        if let Some(levels) = candidate.levels {
            let required = self.config.confirmation_bars;
            let confirmations = confirmations(candles, direction, levels, required);
            features.insert("confirmations".into(), confirmations as f64);
            if confirmations < required {
                return Signal::rejected(
                    instrument,
                    Verdict::NotConfirmed {
                        confirmations,
                        required,
                    },
                    features,
                );
            }
        }

        Signal::fired(instrument, direction, features)
    }
}

/// Latest candle body strictly larger than the previous one.
fn body_expanding(candles: &[Candle]) -> bool {
    match candles {
        [.., prev, last] => last.body() > prev.body(),
        _ => false,
    }
}

/// How many of the latest `bars` candles (the current one included) closed
/// beyond the raw breakout level.
fn confirmations(
    candles: &[Candle],
    direction: Direction,
    levels: BreakoutLevels,
    bars: usize,
) -> usize {
    candles
        .iter()
        .rev()
        .take(bars)
        .filter(|c| match direction {
            Direction::Long => c.close > levels.upper,
            Direction::Short => c.close < levels.lower,
            Direction::Flat => false,
        })
        .count()
}
