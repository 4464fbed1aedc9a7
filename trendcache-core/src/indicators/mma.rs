//! Modified Moving Average (Wilder smoothing).
//!
//! Like EMA with alpha = 1 / period. Used by ATR and RSI.
//! Lookback: period.

use super::begin_index;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, Formula, Indicator, RecursiveCachedIndicator};
use std::sync::Arc;

pub struct Mma {
    source: Arc<dyn Indicator>,
    period: usize,
    name: String,
}

impl Mma {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "MMA period must be >= 1");
        Self {
            source,
            period,
            name: format!("mma_{period}"),
        }
    }

    /// Replaces the default `mma_{period}` name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build(
        source: Arc<dyn Indicator>,
        period: usize,
        config: &EngineConfig,
    ) -> RecursiveCachedIndicator<Self> {
        let window = Arc::clone(source.window());
        RecursiveCachedIndicator::with_config(window, Self::new(source, period), config)
    }
}

impl Formula for Mma {
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
        Ok(prev + (current - prev) / self.period as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, close_series, DEFAULT_EPSILON};

    #[test]
    fn mma_4_basic() {
        let (_series, close) = close_series(&[8.0, 12.0, 4.0]);
        let mma = Mma::build(close, 4, &EngineConfig::default());
        assert_approx(mma.value(0).unwrap(), 8.0, DEFAULT_EPSILON);
        assert_approx(mma.value(1).unwrap(), 9.0, DEFAULT_EPSILON);
        assert_approx(mma.value(2).unwrap(), 7.75, DEFAULT_EPSILON);
    }

    #[test]
    fn named_overrides_name() {
        let (_series, close) = close_series(&[1.0]);
        let mma = Mma::new(close, 14).named("avg_gain_14");
        assert_eq!(Formula::name(&mma), "avg_gain_14");
    }
}
