//! In-memory bar series with optional front trimming.
//!
//! Interior mutability lets one `Arc<BarSeries>` be shared by every
//! indicator built on it while bars keep arriving.

use super::SeriesWindow;
use crate::domain::Bar;
use crate::error::{IndicatorError, Result, SeriesError};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

#[derive(Debug, Default)]
struct SeriesState {
    bars: VecDeque<Bar>,
    removed: usize,
    maximum: Option<usize>,
    mutations: u64,
}

impl SeriesState {
    fn trim(&mut self) {
        let Some(maximum) = self.maximum else {
            return;
        };
        if self.bars.len() > maximum {
            let excess = self.bars.len() - maximum;
            self.bars.drain(..excess);
            self.removed += excess;
            trace!(excess, removed = self.removed, "trimmed bar series");
        }
    }

    fn end_index(&self) -> Option<usize> {
        (!self.bars.is_empty()).then(|| self.removed + self.bars.len() - 1)
    }
}

/// A named, append-only bar sequence.
#[derive(Debug)]
pub struct BarSeries {
    name: String,
    state: RwLock<SeriesState>,
}

impl BarSeries {
    /// An empty, unbounded series.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(SeriesState::default()),
        }
    }

    /// An empty series that keeps at most `maximum` bars.
    pub fn with_maximum_bar_count(
        name: impl Into<String>,
        maximum: usize,
    ) -> std::result::Result<Self, SeriesError> {
        let series = Self::new(name);
        series.set_maximum_bar_count(maximum)?;
        Ok(series)
    }

    /// An unbounded series holding `bars`, which must be in time order.
    pub fn from_bars(
        name: impl Into<String>,
        bars: impl IntoIterator<Item = Bar>,
    ) -> std::result::Result<Self, SeriesError> {
        let series = Self::new(name);
        for bar in bars {
            series.add_bar(bar)?;
        }
        Ok(series)
    }

    fn read(&self) -> RwLockReadGuard<'_, SeriesState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SeriesState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bars currently held.
    pub fn bar_count(&self) -> usize {
        self.read().bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().bars.is_empty()
    }

    /// Appends a bar, trimming the oldest bars beyond the maximum bar count.
    pub fn add_bar(&self, bar: Bar) -> std::result::Result<(), SeriesError> {
        let mut state = self.write();
        if let Some(last) = state.bars.back() {
            if bar.time <= last.time {
                return Err(SeriesError::NonIncreasingTime {
                    new: bar.time,
                    last: last.time,
                });
            }
        }
        state.bars.push_back(bar);
        state.trim();
        Ok(())
    }

    /// Replaces the newest bar in place; its index does not change.
    pub fn replace_last_bar(&self, bar: Bar) -> std::result::Result<(), SeriesError> {
        let mut state = self.write();
        let last = state.bars.back_mut().ok_or(SeriesError::Empty)?;
        *last = bar;
        state.mutations += 1;
        Ok(())
    }

    /// Feeds a trade price into the newest bar.
    pub fn add_price(&self, price: f64) -> std::result::Result<(), SeriesError> {
        let mut state = self.write();
        let last = state.bars.back_mut().ok_or(SeriesError::Empty)?;
        *last = last.with_price(price);
        state.mutations += 1;
        Ok(())
    }

    /// Sets the maximum bar count and trims immediately.
    ///
    /// Caches sized from this value read it once, when the indicator is built.
    pub fn set_maximum_bar_count(&self, maximum: usize) -> std::result::Result<(), SeriesError> {
        if maximum == 0 {
            return Err(SeriesError::ZeroMaximumBarCount);
        }
        let mut state = self.write();
        state.maximum = Some(maximum);
        state.trim();
        Ok(())
    }

    /// Bar at a series index.
    ///
    /// An index older than the window maps to the first remaining bar; an
    /// index past the end is `OutOfRange`.
    pub fn bar(&self, index: usize) -> Result<Bar> {
        let state = self.read();
        let Some(end) = state.end_index() else {
            return Err(IndicatorError::OutOfRange { index, end: None });
        };
        if index > end {
            return Err(IndicatorError::OutOfRange {
                index,
                end: Some(end),
            });
        }
        match index.checked_sub(state.removed) {
            Some(inner) => Ok(state.bars[inner]),
            None => {
                trace!(
                    series = %self.name,
                    index,
                    removed = state.removed,
                    "bar already removed, using first remaining bar"
                );
                Ok(state.bars[0])
            }
        }
    }

    pub fn last_bar(&self) -> Option<Bar> {
        self.read().bars.back().copied()
    }
}

impl SeriesWindow for BarSeries {
    fn begin_index(&self) -> Option<usize> {
        let state = self.read();
        (!state.bars.is_empty()).then_some(state.removed)
    }

    fn end_index(&self) -> Option<usize> {
        self.read().end_index()
    }

    fn removed_bars_count(&self) -> usize {
        self.read().removed
    }

    fn maximum_bar_count(&self) -> Option<usize> {
        self.read().maximum
    }

    fn mutation_count(&self) -> u64 {
        self.read().mutations
    }
}
