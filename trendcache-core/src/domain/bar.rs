//! Bar: one time-ordered OHLCV record of a series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar, addressed by its position in a `BarSeries`.
///
/// `time` is the bar's end time; a series requires it to be strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    /// Returns a copy with close (and high/low, if exceeded) moved to `price`.
    ///
    /// Models an in-progress bar receiving a new trade.
    pub fn with_price(&self, price: f64) -> Self {
        Self {
            close: price,
            high: self.high.max(price),
            low: self.low.min(price),
            ..*self
        }
    }
}
