//! True Range and Average True Range (ATR).
//!
//! TR[begin] = high - low (no previous close).
//! TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
//! ATR = Wilder smoothing (MMA) of TR.
//! Lookback: period + 1.

use super::mma::Mma;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::indicator::{CachedIndicator, Formula, Indicator, RecursiveCachedIndicator};
use crate::series::{BarSeries, SeriesWindow};
use std::sync::Arc;

pub struct TrueRange {
    series: Arc<BarSeries>,
}

impl TrueRange {
    pub fn new(series: &Arc<BarSeries>) -> Self {
        Self {
            series: Arc::clone(series),
        }
    }

    pub fn build(series: &Arc<BarSeries>, config: &EngineConfig) -> CachedIndicator<Self> {
        let window: Arc<dyn SeriesWindow> = series.clone();
        CachedIndicator::with_config(window, Self::new(series), config)
    }
}

impl Formula for TrueRange {
    fn name(&self) -> &str {
        "true_range"
    }

    fn unstable_bars(&self) -> usize {
        1
    }

    fn calculate(&self, _this: &dyn Indicator, index: usize) -> Result<f64> {
        let bar = self.series.bar(index)?;
        let range = bar.high - bar.low;
        let first = self.series.begin_index().unwrap_or(0);
        if index <= first {
            return Ok(range);
        }
        let prev_close = self.series.bar(index - 1)?.close;
        // f64::max ignores NaN operands; propagate explicitly.
        if range.is_nan() || prev_close.is_nan() {
            return Ok(f64::NAN);
        }
        Ok(range
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs()))
    }
}

/// ATR over `series`: a recursive MMA of a cached true range.
pub fn atr(
    series: &Arc<BarSeries>,
    period: usize,
    config: &EngineConfig,
) -> RecursiveCachedIndicator<Mma> {
    let tr: Arc<dyn Indicator> = Arc::new(TrueRange::build(series, config));
    let window = Arc::clone(tr.window());
    let mma = Mma::new(tr, period).named(format!("atr_{period}"));
    RecursiveCachedIndicator::with_config(window, mma, config)
}
