//! Memoizing indicator over a series window.

use super::{Formula, Indicator};
use crate::cache::{BoundedIndexCache, CacheStats, Capacity};
use crate::config::EngineConfig;
use crate::error::{IndicatorError, Result};
use crate::series::SeriesWindow;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Window state as of the last query, used to detect trims and mutations.
#[derive(Debug, Clone, Copy)]
struct WindowMarks {
    removed: usize,
    mutations: u64,
    end: Option<usize>,
}

/// Window bounds observed by one query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds {
    pub(crate) begin: Option<usize>,
    pub(crate) end: Option<usize>,
    pub(crate) removed: usize,
}

/// A formula bound to a series window and memoized in a `BoundedIndexCache`.
///
/// The cache holds as many entries as the series' maximum bar count at the
/// time the indicator is built (unbounded series get an unbounded cache).
/// Later changes to the maximum do not resize it.
///
/// # Index handling
/// - Past the end of the series: `IndicatorError::OutOfRange`.
/// - Older than the window: the oldest still-cached value. This is an
///   approximation for callers holding indices across a trim. With nothing
///   cached, the formula is evaluated at index 0, which the series maps to
///   its first remaining bar, so a recurrence's base case ends the chain.
/// - Otherwise: `get_or_compute` with the formula.
pub struct CachedIndicator<F> {
    formula: F,
    window: Arc<dyn SeriesWindow>,
    cache: BoundedIndexCache<f64>,
    marks: Mutex<WindowMarks>,
    /// First-bar value and the removed count it was computed under.
    first_bar: Mutex<Option<(usize, f64)>>,
}

impl<F: Formula> CachedIndicator<F> {
    pub fn new(window: Arc<dyn SeriesWindow>, formula: F) -> Self {
        Self::with_config(window, formula, &EngineConfig::default())
    }

    pub fn with_config(window: Arc<dyn SeriesWindow>, formula: F, config: &EngineConfig) -> Self {
        let capacity = Capacity::from_maximum_bar_count(window.maximum_bar_count());
        let marks = WindowMarks {
            removed: window.removed_bars_count(),
            mutations: window.mutation_count(),
            end: window.end_index(),
        };
        Self {
            formula,
            cache: BoundedIndexCache::with_initial_capacity(
                capacity,
                config.unbounded_initial_capacity,
            ),
            window,
            marks: Mutex::new(marks),
            first_bar: Mutex::new(None),
        }
    }

    pub fn formula(&self) -> &F {
        &self.formula
    }

    pub fn cache(&self) -> &BoundedIndexCache<f64> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops cached values at or after `index`.
    pub fn invalidate_from(&self, index: usize) {
        self.cache.invalidate_from(index);
        self.reset_first_bar();
    }

    /// Drops every cached value.
    pub fn invalidate(&self) {
        self.cache.clear();
        self.reset_first_bar();
    }

    /// Reconciles the cache with the series window and returns its bounds.
    ///
    /// A trim evicts cached values below the new removed count. A mutation of
    /// the newest bar invalidates from the end index seen by the previous
    /// query, since that bar may have been computed before it changed.
    pub(crate) fn sync_window(&self) -> Bounds {
        let removed = self.window.removed_bars_count();
        let mutations = self.window.mutation_count();
        let begin = self.window.begin_index();
        let end = self.window.end_index();

        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        if removed > marks.removed {
            debug!(
                indicator = self.formula.name(),
                removed,
                previous = marks.removed,
                "series window trimmed"
            );
            self.cache.evict_before(removed);
            marks.removed = removed;
        }
        if mutations != marks.mutations {
            let from = marks.end.unwrap_or(0);
            debug!(
                indicator = self.formula.name(),
                from, "last bar changed, invalidating cached tail"
            );
            self.cache.invalidate_from(from);
            self.reset_first_bar();
            marks.mutations = mutations;
        }
        marks.end = end;

        Bounds {
            begin,
            end,
            removed,
        }
    }

    /// Resolves `index`, handing `this` to the formula as the owning indicator.
    pub(crate) fn value_with(&self, this: &dyn Indicator, index: usize) -> Result<f64> {
        let bounds = self.sync_window();
        let end = bounds.end.ok_or(IndicatorError::OutOfRange { index, end: None })?;
        if index > end {
            return Err(IndicatorError::OutOfRange {
                index,
                end: Some(end),
            });
        }

        let begin = bounds.begin.unwrap_or(bounds.removed);
        if index < begin {
            if let Some((cached, value)) = self.cache.oldest() {
                trace!(
                    indicator = self.formula.name(),
                    index,
                    cached,
                    "index precedes window, returning oldest cached value"
                );
                return Ok(value);
            }
            trace!(
                indicator = self.formula.name(),
                index,
                begin,
                "index precedes window, using first bar value"
            );
            return self.first_bar_value(this, bounds.removed);
        }

        self.cache
            .get_or_compute(index, |i| self.formula.calculate(this, i))
    }
}

impl<F: Formula> CachedIndicator<F> {
    /// Value at the first remaining bar, memoized per removed count.
    ///
    /// Computed outside the index cache: a recurrence evaluating its first
    /// in-window index may itself land here, and that index's flight is
    /// already owned by the calling thread.
    fn first_bar_value(&self, this: &dyn Indicator, removed: usize) -> Result<f64> {
        if let Some((seen, value)) = *self.first_bar.lock().unwrap_or_else(PoisonError::into_inner)
        {
            if seen == removed {
                return Ok(value);
            }
        }

        let value = self.formula.calculate(this, 0)?;
        if self.window.removed_bars_count() != removed {
            return Ok(value);
        }
        let mut first_bar = self.first_bar.lock().unwrap_or_else(PoisonError::into_inner);
        match *first_bar {
            Some((seen, cached)) if seen == removed => Ok(cached),
            _ => {
                *first_bar = Some((removed, value));
                Ok(value)
            }
        }
    }

    /// Forgets the memoized first-bar value.
    fn reset_first_bar(&self) {
        *self.first_bar.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<F: Formula> Indicator for CachedIndicator<F> {
    fn name(&self) -> &str {
        self.formula.name()
    }

    fn value(&self, index: usize) -> Result<f64> {
        self.value_with(self, index)
    }

    fn unstable_bars(&self) -> usize {
        self.formula.unstable_bars()
    }

    fn window(&self) -> &Arc<dyn SeriesWindow> {
        &self.window
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::series::BarSeries;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Close price times ten, counting calls.
    struct Scaled {
        series: Arc<BarSeries>,
        calls: AtomicUsize,
    }

    impl Formula for Scaled {
        fn name(&self) -> &str {
            "scaled"
        }

        fn unstable_bars(&self) -> usize {
            2
        }

        fn calculate(&self, _this: &dyn Indicator, index: usize) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.series.bar(index)?.close * 10.0)
        }
    }

    fn scaled(series: &Arc<BarSeries>) -> CachedIndicator<Scaled> {
        let window: Arc<dyn SeriesWindow> = series.clone();
        CachedIndicator::new(
            window,
            Scaled {
                series: Arc::clone(series),
                calls: AtomicUsize::new(0),
            },
        )
    }

    #[test]
    fn values_are_computed_once() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[1.0, 2.0, 3.0])).unwrap());
        let ind = scaled(&series);
        assert_eq!(ind.value(2).unwrap(), 30.0);
        assert_eq!(ind.value(2).unwrap(), 30.0);
        assert_eq!(ind.formula().calls.load(Ordering::SeqCst), 1);
        assert_eq!(ind.unstable_bars(), 2);
        assert_eq!(ind.name(), "scaled");
    }

    #[test]
    fn past_end_is_out_of_range() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[1.0, 2.0])).unwrap());
        let ind = scaled(&series);
        assert_eq!(
            ind.value(5),
            Err(IndicatorError::OutOfRange {
                index: 5,
                end: Some(1)
            })
        );

        let empty = Arc::new(BarSeries::new("empty"));
        assert_eq!(
            scaled(&empty).value(0),
            Err(IndicatorError::OutOfRange {
                index: 0,
                end: None
            })
        );
    }

    #[test]
    fn capacity_follows_maximum_bar_count_at_construction() {
        let series = Arc::new(BarSeries::with_maximum_bar_count("s", 4).unwrap());
        let ind = scaled(&series);
        assert_eq!(ind.cache().capacity(), Capacity::Bounded(4));
        series.set_maximum_bar_count(10).unwrap();
        assert_eq!(ind.cache().capacity(), Capacity::Bounded(4));

        let unbounded = Arc::new(BarSeries::new("u"));
        assert_eq!(scaled(&unbounded).cache().capacity(), Capacity::Unbounded);
    }

    #[test]
    fn too_old_index_returns_oldest_cached_value() {
        let series = Arc::new(BarSeries::with_maximum_bar_count("s", 3).unwrap());
        for bar in make_bars(&[1.0, 2.0, 3.0]) {
            series.add_bar(bar).unwrap();
        }
        let ind = scaled(&series);
        for i in 0..3 {
            ind.value(i).unwrap();
        }

        for bar in make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]).into_iter().skip(3) {
            series.add_bar(bar).unwrap();
        }
        assert_eq!(series.begin_index(), Some(2));

        // Index 0 was trimmed; the oldest value still cached is index 2's.
        assert_eq!(ind.value(0).unwrap(), 30.0);
        assert_eq!(ind.value(1).unwrap(), 30.0);
        assert_eq!(ind.cache().first_cached_index(), Some(2));
    }

    #[test]
    fn too_old_index_with_empty_cache_uses_first_bar_value() {
        let series = Arc::new(BarSeries::with_maximum_bar_count("s", 2).unwrap());
        for bar in make_bars(&[1.0, 2.0, 3.0, 4.0]) {
            series.add_bar(bar).unwrap();
        }
        let ind = scaled(&series);
        // Index 0 maps to the first remaining bar (index 2, close 3.0).
        assert_eq!(ind.value(0).unwrap(), 30.0);
        assert_eq!(ind.value(1).unwrap(), 30.0);
        assert_eq!(ind.formula().calls.load(Ordering::SeqCst), 1);
        assert_eq!(ind.stats().retained, 0);

        // A further trim computes it again for the new first bar.
        series.add_bar(make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0])[4]).unwrap();
        assert_eq!(ind.value(0).unwrap(), 40.0);
        assert_eq!(ind.formula().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn last_bar_mutation_invalidates_tip() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[1.0, 2.0, 3.0])).unwrap());
        let ind = scaled(&series);
        assert_eq!(ind.value(1).unwrap(), 20.0);
        assert_eq!(ind.value(2).unwrap(), 30.0);

        series.add_price(3.5).unwrap();
        assert_eq!(ind.value(2).unwrap(), 35.0);
        assert_eq!(ind.cache().get(1), Some(20.0));
        assert_eq!(ind.formula().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn explicit_invalidation_forces_recompute() {
        let series = Arc::new(BarSeries::from_bars("s", make_bars(&[1.0, 2.0, 3.0])).unwrap());
        let ind = scaled(&series);
        for i in 0..3 {
            ind.value(i).unwrap();
        }
        ind.invalidate_from(1);
        assert_eq!(ind.cache().highest_result_index(), Some(0));
        ind.invalidate();
        assert_eq!(ind.stats().retained, 0);
        ind.value(2).unwrap();
        assert_eq!(ind.formula().calls.load(Ordering::SeqCst), 4);
    }
}
