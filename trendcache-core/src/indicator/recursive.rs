//! Recursion-guarded memoizing indicator.
//!
//! A formula whose value at `i` reads its own value at `i - 1` recurses as
//! deep as the distance to the nearest cached index. On a cold cache with
//! tens of thousands of bars that overflows the stack. When the requested
//! index is more than `threshold` past the cache's high-water mark, the gap
//! is filled in ascending order first, so every step finds its predecessor
//! cached and the final request recurses at most one level.

use super::cached::CachedIndicator;
use super::{Formula, Indicator};
use crate::cache::{BoundedIndexCache, CacheStats};
use crate::config::{EngineConfig, DEFAULT_RECURSION_THRESHOLD};
use crate::error::Result;
use crate::series::SeriesWindow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::debug;

/// Threads currently running a prefill loop on one indicator.
#[derive(Default)]
struct PrefillThreads(Mutex<Vec<ThreadId>>);

impl PrefillThreads {
    fn lock(&self) -> MutexGuard<'_, Vec<ThreadId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contains_current(&self) -> bool {
        self.lock().contains(&thread::current().id())
    }

    fn enter(&self) -> PrefillScope<'_> {
        let id = thread::current().id();
        self.lock().push(id);
        PrefillScope { threads: self, id }
    }
}

/// Marks the current thread as prefilling until dropped.
struct PrefillScope<'a> {
    threads: &'a PrefillThreads,
    id: ThreadId,
}

impl Drop for PrefillScope<'_> {
    fn drop(&mut self) {
        let mut threads = self.threads.lock();
        if let Some(pos) = threads.iter().position(|id| *id == self.id) {
            threads.swap_remove(pos);
        }
    }
}

/// A `CachedIndicator` for self-referential formulas.
///
/// The guard only protects backward recurrences. A formula that asks for a
/// much larger index than the one being computed recurses without bound,
/// exactly as an unguarded indicator would.
pub struct RecursiveCachedIndicator<F> {
    inner: CachedIndicator<F>,
    threshold: usize,
    prefilling: PrefillThreads,
}

impl<F: Formula> RecursiveCachedIndicator<F> {
    pub fn new(window: Arc<dyn SeriesWindow>, formula: F) -> Self {
        Self::with_config(window, formula, &EngineConfig::default())
    }

    pub fn with_config(window: Arc<dyn SeriesWindow>, formula: F, config: &EngineConfig) -> Self {
        Self {
            inner: CachedIndicator::with_config(window, formula, config),
            threshold: config.recursion_threshold,
            prefilling: PrefillThreads::default(),
        }
    }

    /// Overrides the prefill threshold. Any value is correct; zero prefills
    /// on every miss past the high-water mark.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn formula(&self) -> &F {
        self.inner.formula()
    }

    pub fn cache(&self) -> &BoundedIndexCache<f64> {
        self.inner.cache()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn invalidate_from(&self, index: usize) {
        self.inner.invalidate_from(index);
    }

    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    fn prefill(&self, start: usize, index: usize) -> Result<()> {
        debug!(
            indicator = self.inner.formula().name(),
            start,
            index,
            gap = index - start,
            threshold = self.threshold,
            "prefilling recursive indicator"
        );
        let _scope = self.prefilling.enter();
        let formula = self.inner.formula();
        self.inner
            .cache()
            .prefill_until(start, index, |i| formula.calculate(self, i))
    }
}

impl<F: Formula> Indicator for RecursiveCachedIndicator<F> {
    fn name(&self) -> &str {
        self.inner.formula().name()
    }

    fn value(&self, index: usize) -> Result<f64> {
        let bounds = self.inner.sync_window();
        if bounds.end.is_some_and(|end| index <= end) {
            let highest = self.inner.cache().highest_result_index().unwrap_or(0);
            let start = bounds.removed.max(highest);
            // A nested request from this thread's own prefill loop resolves
            // directly; re-entering the loop would recurse once per step.
            if index > start.saturating_add(self.threshold) && !self.prefilling.contains_current() {
                self.prefill(start, index)?;
            }
        }
        self.inner.value_with(self, index)
    }

    fn unstable_bars(&self) -> usize {
        self.inner.formula().unstable_bars()
    }

    fn window(&self) -> &Arc<dyn SeriesWindow> {
        self.inner.window()
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}

impl<F> RecursiveCachedIndicator<F> {
    /// Default prefill threshold.
    pub const DEFAULT_THRESHOLD: usize = DEFAULT_RECURSION_THRESHOLD;
}
