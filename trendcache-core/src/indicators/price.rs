//! Bar field accessors.
//!
//! Reading a bar is already O(1), so these are plain `Indicator`s with no
//! cache in front of them.

use crate::domain::Bar;
use crate::error::Result;
use crate::indicator::Indicator;
use crate::series::{BarSeries, SeriesWindow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// (high + low + close) / 3
    Typical,
}

impl PriceField {
    pub fn of(self, bar: &Bar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
            PriceField::Typical => (bar.high + bar.low + bar.close) / 3.0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
            PriceField::Typical => "typical",
        }
    }
}

pub struct PriceIndicator {
    series: Arc<BarSeries>,
    window: Arc<dyn SeriesWindow>,
    field: PriceField,
}

impl PriceIndicator {
    pub fn new(series: &Arc<BarSeries>, field: PriceField) -> Self {
        let window: Arc<dyn SeriesWindow> = series.clone();
        Self {
            series: Arc::clone(series),
            window,
            field,
        }
    }

    pub fn close(series: &Arc<BarSeries>) -> Self {
        Self::new(series, PriceField::Close)
    }

    pub fn field(&self) -> PriceField {
        self.field
    }
}

impl Indicator for PriceIndicator {
    fn name(&self) -> &str {
        self.field.label()
    }

    fn value(&self, index: usize) -> Result<f64> {
        let bar = self.series.bar(index)?;
        Ok(self.field.of(&bar))
    }

    fn unstable_bars(&self) -> usize {
        0
    }

    fn window(&self) -> &Arc<dyn SeriesWindow> {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndicatorError;
    use crate::indicators::make_bars;

    #[test]
    fn reads_each_field() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[10.0, 12.0])).unwrap());
        let high = PriceIndicator::new(&series, PriceField::High);
        assert_eq!(high.value(1).unwrap(), 13.0);
        assert_eq!(high.name(), "high");
        let typical = PriceIndicator::new(&series, PriceField::Typical);
        // high 13, low 9, close 12
        assert_eq!(typical.value(1).unwrap(), 34.0 / 3.0);
        assert_eq!(PriceIndicator::close(&series).unstable_bars(), 0);
    }

    #[test]
    fn past_end_is_out_of_range() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[10.0])).unwrap());
        let close = PriceIndicator::close(&series);
        assert!(matches!(
            close.value(1),
            Err(IndicatorError::OutOfRange { index: 1, .. })
        ));
    }
}
