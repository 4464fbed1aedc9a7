//! Materializing indicators over the current window.
//!
//! Indicators are lazy; `precompute` walks each one over `[begin, end]` in
//! ascending order (which keeps recursive indicators on their shallow path)
//! and copies the results into an `IndicatorValues` container keyed by name.

use crate::error::Result;
use crate::indicator::Indicator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Container for precomputed indicator values.
///
/// Values are addressed by absolute series index; `begin` is the index of
/// the first stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorValues {
    begin: usize,
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new(begin: usize) -> Self {
        Self {
            begin,
            series: HashMap::new(),
        }
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Insert a named indicator series starting at `begin`.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the indicator value at a series index.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        let offset = index.checked_sub(self.begin)?;
        self.series.get(name).and_then(|v| v.get(offset).copied())
    }

    /// Get the full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Evaluate every indicator over its window's current `[begin, end]`.
///
/// All indicators are expected to share one window; bounds are taken from
/// the first. An empty window yields an empty container.
pub fn precompute(indicators: &[Arc<dyn Indicator>]) -> Result<IndicatorValues> {
    let Some(first) = indicators.first() else {
        return Ok(IndicatorValues::default());
    };
    let window = first.window();
    let (Some(begin), Some(end)) = (window.begin_index(), window.end_index()) else {
        return Ok(IndicatorValues::default());
    };

    let mut values = IndicatorValues::new(begin);
    for indicator in indicators {
        let series = (begin..=end)
            .map(|index| indicator.value(index))
            .collect::<Result<Vec<_>>>()?;
        values.insert(indicator.name(), series);
    }
    Ok(values)
}

/// Compute the warmup length from a set of indicators.
///
/// The warmup is the maximum unstable-bar count across all indicators.
pub fn compute_warmup(indicators: &[Arc<dyn Indicator>]) -> usize {
    indicators
        .iter()
        .map(|i| i.unstable_bars())
        .max()
        .unwrap_or(0)
}
