//! Rate of Change (ROC).
//!
//! Percentage change over N bars.
//! ROC[t] = (source[t] - source[t-period]) / source[t-period] * 100
//! NaN while `t - period` lies before the window begin, or when the
//! earlier value is 0.
//! Lookback: period.

use super::momentum::lookback_index;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, CachedIndicator, Formula, Indicator};
use std::sync::Arc;

pub struct Roc {
    source: Arc<dyn Indicator>,
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            source,
            period,
            name: format!("roc_{period}"),
        }
    }

    pub fn build(
        source: Arc<dyn Indicator>,
        period: usize,
        config: &EngineConfig,
    ) -> CachedIndicator<Self> {
        let window = Arc::clone(source.window());
        CachedIndicator::with_config(window, Self::new(source, period), config)
    }
}

impl Formula for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], self.period)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        let Some(prev_index) = lookback_index(this, index, self.period) else {
            return Ok(f64::NAN);
        };
        let prev = self.source.value(prev_index)?;
        if prev == 0.0 {
            return Ok(f64::NAN);
        }
        Ok((self.source.value(index)? - prev) / prev * 100.0)
    }
}
