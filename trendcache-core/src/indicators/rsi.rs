//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of gains and losses between consecutive values.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period + 1.
//! Edge cases: avg_loss == 0 → RSI = 100 (0 if avg_gain is also 0).

use super::begin_index;
use super::mma::Mma;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, CachedIndicator, Formula, Indicator};
use std::sync::Arc;

/// Positive change from the previous value, else 0.
pub struct Gain {
    source: Arc<dyn Indicator>,
}

/// Magnitude of a negative change from the previous value, else 0.
pub struct Loss {
    source: Arc<dyn Indicator>,
}

fn change(source: &dyn Indicator, this: &dyn Indicator, index: usize) -> Result<Option<f64>> {
    if index <= begin_index(this) {
        return Ok(None);
    }
    Ok(Some(source.value(index)? - source.value(index - 1)?))
}

impl Gain {
    pub fn new(source: Arc<dyn Indicator>) -> Self {
        Self { source }
    }
}

impl Loss {
    pub fn new(source: Arc<dyn Indicator>) -> Self {
        Self { source }
    }
}

impl Formula for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], 1)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        Ok(match change(self.source.as_ref(), this, index)? {
            Some(delta) if delta.is_nan() => f64::NAN,
            Some(delta) => delta.max(0.0),
            None => 0.0,
        })
    }
}

impl Formula for Loss {
    fn name(&self) -> &str {
        "loss"
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], 1)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        Ok(match change(self.source.as_ref(), this, index)? {
            Some(delta) if delta.is_nan() => f64::NAN,
            Some(delta) => (-delta).max(0.0),
            None => 0.0,
        })
    }
}

pub struct Rsi {
    avg_gain: Arc<dyn Indicator>,
    avg_loss: Arc<dyn Indicator>,
    name: String,
}

impl Rsi {
    pub fn new(source: Arc<dyn Indicator>, period: usize, config: &EngineConfig) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        let window = Arc::clone(source.window());
        let gain: Arc<dyn Indicator> = Arc::new(CachedIndicator::with_config(
            Arc::clone(&window),
            Gain::new(Arc::clone(&source)),
            config,
        ));
        let loss: Arc<dyn Indicator> = Arc::new(CachedIndicator::with_config(
            Arc::clone(&window),
            Loss::new(source),
            config,
        ));
        Self {
            avg_gain: Arc::new(Mma::build(gain, period, config)),
            avg_loss: Arc::new(Mma::build(loss, period, config)),
            name: format!("rsi_{period}"),
        }
    }

    pub fn build(
        source: Arc<dyn Indicator>,
        period: usize,
        config: &EngineConfig,
    ) -> CachedIndicator<Self> {
        let window = Arc::clone(source.window());
        CachedIndicator::with_config(window, Self::new(source, period, config), config)
    }
}

impl Formula for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(
            &[self.avg_gain.unstable_bars(), self.avg_loss.unstable_bars()],
            0,
        )
    }

    fn calculate(&self, _this: &dyn Indicator, index: usize) -> Result<f64> {
        let gain = self.avg_gain.value(index)?;
        let loss = self.avg_loss.value(index)?;
        if gain.is_nan() || loss.is_nan() {
            return Ok(f64::NAN);
        }
        if loss == 0.0 {
            return Ok(if gain == 0.0 { 0.0 } else { 100.0 });
        }
        Ok(100.0 - 100.0 / (1.0 + gain / loss))
    }
}
