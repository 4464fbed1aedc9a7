//! Concrete indicators built on the caching engine.
//!
//! Each indicator is a `Formula` wrapped in a `CachedIndicator`, or a
//! `RecursiveCachedIndicator` when its value at `i` reads its own value at
//! `i - 1` (EMA, Wilder MMA). Price accessors read bars directly and are not
//! cached. Upstream indicators are held as `Arc<dyn Indicator>` handles, so
//! one SMA can feed several consumers and is computed once per index.
//!
//! Unstable bars: `max(upstream unstable bars) + own lookback`.

pub mod atr;
pub mod ema;
pub mod mma;
pub mod momentum;
pub mod price;
pub mod roc;
pub mod rsi;
pub mod sma;

pub use atr::{atr, TrueRange};
pub use ema::Ema;
pub use mma::Mma;
pub use momentum::Momentum;
pub use price::{PriceField, PriceIndicator};
pub use roc::Roc;
pub use rsi::{Gain, Loss, Rsi};
pub use sma::Sma;

use crate::indicator::Indicator;

/// First index of the window `indicator` is evaluated against.
pub(crate) fn begin_index(indicator: &dyn Indicator) -> usize {
    let window = indicator.window();
    window
        .begin_index()
        .unwrap_or_else(|| window.removed_bars_count())
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
/// Bar times are one day apart.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(16, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

/// A shared unbounded series over `closes`, plus its close-price indicator.
#[cfg(test)]
pub fn close_series(
    closes: &[f64],
) -> (
    std::sync::Arc<crate::series::BarSeries>,
    std::sync::Arc<dyn Indicator>,
) {
    use crate::series::BarSeries;
    use std::sync::Arc;
    let series = Arc::new(BarSeries::from_bars("test", make_bars(closes)).unwrap());
    let close: Arc<dyn Indicator> = Arc::new(PriceIndicator::close(&series));
    (series, close)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
