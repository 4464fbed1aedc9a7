//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = EMA[t-1] + alpha * (source[t] - EMA[t-1]),
//! alpha = 2 / (period + 1).
//! Seed: EMA[begin] = source[begin].
//! Lookback: period.

use super::begin_index;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, Formula, Indicator, RecursiveCachedIndicator};
use std::sync::Arc;

pub struct Ema {
    source: Arc<dyn Indicator>,
    period: usize,
    alpha: f64,
    name: String,
}

impl Ema {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            source,
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            name: format!("ema_{period}"),
        }
    }

    pub fn build(
        source: Arc<dyn Indicator>,
        period: usize,
        config: &EngineConfig,
    ) -> RecursiveCachedIndicator<Self> {
        let window = Arc::clone(source.window());
        RecursiveCachedIndicator::with_config(window, Self::new(source, period), config)
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Formula for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], self.period)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        let current = self.source.value(index)?;
        if index <= begin_index(this) {
            return Ok(current);
        }
        let prev = this.value(index - 1)?;
        Ok(prev + self.alpha * (current - prev))
    }
}
