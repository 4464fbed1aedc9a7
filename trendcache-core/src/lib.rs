//! TrendCache Core: lazy, memoized, thread-safe indicator evaluation over bar series.
//!
//! This crate contains:
//! - `BoundedIndexCache`: ring-buffer memoization keyed by index, with
//!   per-index single-flight, prefill and invalidation
//! - `CachedIndicator` / `RecursiveCachedIndicator`: formulas bound to a
//!   series window, with a stack-depth guard for self-referential formulas
//! - `BarSeries`: the growing, optionally front-trimmed bar sequence
//! - Concrete indicators (SMA, EMA, MMA, ATR, RSI, momentum, ROC)
//! - Precompute helpers and engine configuration

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod indicator;
pub mod indicators;
pub mod precompute;
pub mod series;

pub use cache::{BoundedIndexCache, CacheStats, Capacity};
pub use config::{ConfigError, EngineConfig};
pub use domain::Bar;
pub use error::{IndicatorError, Result, SeriesError};
pub use indicator::{CachedIndicator, Formula, Indicator, RecursiveCachedIndicator};
pub use series::{BarSeries, SeriesWindow};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across query threads is Send + Sync.
    ///
    /// Indicators are handed out as `Arc<dyn Indicator>` and queried from
    /// worker threads; if any of these stops being thread-safe the build
    /// breaks here rather than at a distant call site.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<BarSeries>();
        require_sync::<BarSeries>();
        require_send::<BoundedIndexCache<f64>>();
        require_sync::<BoundedIndexCache<f64>>();
        require_send::<CacheStats>();
        require_sync::<CacheStats>();
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<IndicatorError>();
        require_sync::<IndicatorError>();

        require_send::<CachedIndicator<indicators::Sma>>();
        require_sync::<CachedIndicator<indicators::Sma>>();
        require_send::<RecursiveCachedIndicator<indicators::Ema>>();
        require_sync::<RecursiveCachedIndicator<indicators::Ema>>();
        require_send::<indicators::PriceIndicator>();
        require_sync::<indicators::PriceIndicator>();
        require_send::<precompute::IndicatorValues>();
        require_sync::<precompute::IndicatorValues>();
    }

    /// `Formula::calculate` receives the owning indicator as a trait object,
    /// so both wrappers must be usable as `dyn Indicator`.
    #[test]
    fn wrappers_are_object_safe() {
        fn _as_dyn<F: Formula + 'static>(
            cached: CachedIndicator<F>,
            recursive: RecursiveCachedIndicator<F>,
        ) -> (Box<dyn Indicator>, Box<dyn Indicator>) {
            (Box::new(cached), Box::new(recursive))
        }
    }
}
