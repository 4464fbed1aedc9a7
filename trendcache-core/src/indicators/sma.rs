//! Simple Moving Average (SMA).
//!
//! SMA[t] = mean of source[t-period+1..=t].
//! Near the start of the window the average covers only the values present
//! (index - begin + 1 of them), so early values are partial means.
//! Lookback: period - 1.

use super::begin_index;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, CachedIndicator, Formula, Indicator};
use std::sync::Arc;

pub struct Sma {
    source: Arc<dyn Indicator>,
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            source,
            period,
            name: format!("sma_{period}"),
        }
    }

    /// A cached SMA over `source`, bound to the source's window.
    pub fn build(
        source: Arc<dyn Indicator>,
        period: usize,
        config: &EngineConfig,
    ) -> CachedIndicator<Self> {
        let window = Arc::clone(source.window());
        CachedIndicator::with_config(window, Self::new(source, period), config)
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Formula for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], self.period - 1)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        let start = (index + 1)
            .saturating_sub(self.period)
            .max(begin_index(this))
            .min(index);
        let mut sum = 0.0;
        for i in start..=index {
            sum += self.source.value(i)?;
        }
        Ok(sum / (index - start + 1) as f64)
    }
}
