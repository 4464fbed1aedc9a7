//! Momentum: simple lookback difference (not percentage).
//!
//! momentum[t] = source[t] - source[t-period]
//! NaN while `t - period` lies before the window begin.
//! Lookback: period.

use super::begin_index;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{combined_unstable_bars, CachedIndicator, Formula, Indicator};
use std::sync::Arc;

pub struct Momentum {
    source: Arc<dyn Indicator>,
    period: usize,
    name: String,
}

impl Momentum {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "Momentum period must be >= 1");
        Self {
            source,
            period,
            name: format!("momentum_{period}"),
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

/// `index - period` if it is still inside the window.
pub(crate) fn lookback_index(this: &dyn Indicator, index: usize, period: usize) -> Option<usize> {
    index
        .checked_sub(period)
        .filter(|&prev| prev >= begin_index(this))
}

impl Formula for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn unstable_bars(&self) -> usize {
        combined_unstable_bars(&[self.source.unstable_bars()], self.period)
    }

    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        let Some(prev) = lookback_index(this, index, self.period) else {
            return Ok(f64::NAN);
        };
        Ok(self.source.value(index)? - self.source.value(prev)?)
    }
}
