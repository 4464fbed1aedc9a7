//! The bar sequence the engine caches against.
//!
//! The cache and indicator layer only consumes `SeriesWindow`: the current
//! index bounds, the count of bars trimmed from the front, the maximum bar
//! count used to size caches, and a counter of in-place mutations of the
//! newest bar. `BarSeries` is the concrete in-memory implementation.

pub mod bar_series;

pub use bar_series::BarSeries;

/// Bounds of a growing, optionally front-trimmed sequence.
///
/// Indices are never renumbered or reused: growth extends `end_index`, and
/// trimming advances `begin_index` together with `removed_bars_count`.
pub trait SeriesWindow: Send + Sync {
    /// First index still held, or `None` while empty.
    fn begin_index(&self) -> Option<usize>;

    /// Last index held, or `None` while empty.
    fn end_index(&self) -> Option<usize>;

    /// Number of indices permanently trimmed from the front. Never decreases.
    fn removed_bars_count(&self) -> usize;

    /// Maximum retained length, or `None` when unbounded.
    fn maximum_bar_count(&self) -> Option<usize>;

    /// Incremented whenever the newest bar is modified in place.
    fn mutation_count(&self) -> u64 {
        0
    }
}
