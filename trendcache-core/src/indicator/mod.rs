//! Indicator traits and the lazy caching wrappers.
//!
//! An indicator is a pure function from bar index to value. Formulas only
//! describe `calculate(index)`; `CachedIndicator` and
//! `RecursiveCachedIndicator` turn a formula into a memoized, thread-safe
//! indicator bound to a series window.
//!
//! Indicators form a DAG: a formula holds its upstream indicators as
//! `Arc<dyn Indicator>` handles and calls `value` on them, and a recursive
//! formula may call `value` on itself (through `this`) for smaller indices.

pub mod cached;
pub mod recursive;

pub use cached::CachedIndicator;
pub use recursive::RecursiveCachedIndicator;

use crate::cache::CacheStats;
use crate::error::Result;
use crate::series::SeriesWindow;
use std::sync::Arc;

/// Query interface shared by every indicator.
///
/// `value` returns a number, possibly `f64::NAN` when no meaningful value
/// exists yet, or an error for indices past the end of the series.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    fn value(&self, index: usize) -> Result<f64>;

    /// Number of leading indices whose values are computable but still
    /// warming up. Metadata only; never cached.
    fn unstable_bars(&self) -> usize;

    /// The series window this indicator is evaluated against.
    fn window(&self) -> &Arc<dyn SeriesWindow>;

    /// Statistics of the backing cache; `None` for uncached indicators.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// The extension point indicator implementers provide.
pub trait Formula: Send + Sync {
    fn name(&self) -> &str;

    fn unstable_bars(&self) -> usize;

    /// Computes the value at `index`.
    ///
    /// `this` is the caching indicator that owns the formula. Recursive
    /// formulas read their own earlier values through `this.value(..)`;
    /// they must only reach for smaller indices.
    fn calculate(&self, this: &dyn Indicator, index: usize) -> Result<f64>;
}

/// Unstable-bar count of an indicator with the given upstream counts and its
/// own additional lookback: the worst upstream warm-up plus its own.
pub fn combined_unstable_bars(upstream: &[usize], own: usize) -> usize {
    upstream.iter().copied().max().unwrap_or(0) + own
}
