//! Ring storage behind `BoundedIndexCache`.
//!
//! Not synchronized; the owning cache wraps it in a lock. Slots use absolute
//! mapping (`index % capacity` when bounded, `index` when unbounded), so a
//! retained index always lives in the same slot regardless of eviction.
//!
//! Invariants: a slot holds `Some` only if its index lies inside
//! `[first, highest]`, and both `first` and `highest` are present entries.
//! Every eviction and invalidation clears the slots it drops, so a hit can
//! never return a value written for a different index.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// How many entries a cache may retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    /// At most this many of the most recently written indices.
    Bounded(usize),
    /// Never evicts; slots grow to the highest index seen.
    Unbounded,
}

impl Capacity {
    /// A bounded capacity. Zero is raised to one.
    pub fn bounded(limit: usize) -> Self {
        Capacity::Bounded(limit.max(1))
    }

    /// Capacity matching a series' maximum bar count (`None` = unbounded).
    pub fn from_maximum_bar_count(maximum: Option<usize>) -> Self {
        match maximum {
            Some(limit) => Capacity::bounded(limit),
            None => Capacity::Unbounded,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Bounded(limit) => Some(*limit),
            Capacity::Unbounded => None,
        }
    }
}

pub(crate) struct Ring<V> {
    slots: Vec<Option<V>>,
    capacity: Capacity,
    first: Option<usize>,
    highest: Option<usize>,
    /// Stores below this index are dropped (set by `evict_before`).
    floor: usize,
    /// Bumped by every invalidation; in-flight computations compare against it.
    generation: u64,
}

impl<V> Ring<V> {
    pub(crate) fn new(capacity: Capacity, initial_unbounded: usize) -> Self {
        let reserve = match capacity {
            Capacity::Bounded(limit) => limit.min(initial_unbounded),
            Capacity::Unbounded => initial_unbounded,
        };
        Self {
            slots: Vec::with_capacity(reserve),
            capacity,
            first: None,
            highest: None,
            floor: 0,
            generation: 0,
        }
    }

    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn first(&self) -> Option<usize> {
        self.first
    }

    pub(crate) fn highest(&self) -> Option<usize> {
        self.highest
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn slot(&self, index: usize) -> usize {
        match self.capacity {
            Capacity::Bounded(limit) => index % limit,
            Capacity::Unbounded => index,
        }
    }

    pub(crate) fn in_range(&self, index: usize) -> bool {
        match (self.first, self.highest) {
            (Some(first), Some(highest)) => first <= index && index <= highest,
            _ => false,
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&V> {
        if !self.in_range(index) {
            return None;
        }
        self.slots.get(self.slot(index)).and_then(Option::as_ref)
    }

    /// Oldest present entry.
    pub(crate) fn oldest(&self) -> Option<(usize, &V)> {
        let first = self.first?;
        self.get(first).map(|value| (first, value))
    }

    pub(crate) fn retained(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn clear_slot(&mut self, index: usize) {
        let slot = self.slot(index);
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = None;
        }
    }

    fn present(&self, index: usize) -> bool {
        self.slots
            .get(self.slot(index))
            .is_some_and(Option::is_some)
    }

    /// Lowest present index in `range`.
    fn first_present(&self, mut range: std::ops::RangeInclusive<usize>) -> Option<usize> {
        range.find(|&index| self.present(index))
    }

    /// Highest present index in `range`.
    fn last_present(&self, range: std::ops::RangeInclusive<usize>) -> Option<usize> {
        range.rev().find(|&index| self.present(index))
    }

    /// Stores a value. A bounded ring keeps at most `capacity` consecutive
    /// indices: a store past the newest entry evicts from the oldest end, a
    /// store before the oldest entry evicts from the newest end.
    ///
    /// Returns `false` only when the index is below the trim floor.
    pub(crate) fn store(&mut self, index: usize, value: V) -> bool {
        if index < self.floor {
            trace!(index, floor = self.floor, "dropping store below trimmed window");
            return false;
        }

        match (self.first, self.highest) {
            (Some(first), Some(highest)) if index > highest => {
                if let Capacity::Bounded(limit) = self.capacity {
                    if index - first + 1 > limit {
                        let new_first = index + 1 - limit;
                        let evict_end = new_first.min(highest + 1);
                        for evicted in first..evict_end {
                            self.clear_slot(evicted);
                        }
                        let kept = (new_first <= highest)
                            .then(|| self.first_present(new_first..=highest))
                            .flatten();
                        trace!(evicted_from = first, new_first, "ring eviction");
                        self.first = Some(kept.unwrap_or(index));
                    }
                }
                self.highest = Some(index);
            }
            (Some(first), Some(highest)) if index < first => {
                if let Capacity::Bounded(limit) = self.capacity {
                    if highest - index + 1 > limit {
                        let new_highest = index + limit - 1;
                        for evicted in (new_highest + 1).max(first)..=highest {
                            self.clear_slot(evicted);
                        }
                        let kept = (first <= new_highest)
                            .then(|| self.last_present(first..=new_highest))
                            .flatten();
                        trace!(index, evicted_above = new_highest, "ring eviction from newest end");
                        self.highest = Some(kept.unwrap_or(index));
                    }
                }
                self.first = Some(index);
            }
            (Some(_), Some(_)) => {}
            _ => {
                self.first = Some(index);
                self.highest = Some(index);
            }
        }

        let slot = self.slot(index);
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(value);
        true
    }

    /// Drops every entry with index >= `index`.
    pub(crate) fn invalidate_from(&mut self, index: usize) {
        self.generation += 1;
        let (Some(first), Some(highest)) = (self.first, self.highest) else {
            return;
        };
        if index > highest {
            return;
        }
        if index <= first {
            self.reset();
            return;
        }
        for dropped in index..=highest {
            self.clear_slot(dropped);
        }
        match self.last_present(first..=index - 1) {
            Some(kept) => self.highest = Some(kept),
            None => self.reset(),
        }
    }

    /// Drops every entry with index < `index` and refuses later stores below it.
    pub(crate) fn evict_before(&mut self, index: usize) {
        self.floor = self.floor.max(index);
        let (Some(first), Some(highest)) = (self.first, self.highest) else {
            return;
        };
        if index <= first {
            return;
        }
        if index > highest {
            self.reset();
            return;
        }
        for evicted in first..index {
            self.clear_slot(evicted);
        }
        match self.first_present(index..=highest) {
            Some(kept) => self.first = Some(kept),
            None => self.reset(),
        }
    }

    /// Full reset, including the trim floor.
    pub(crate) fn clear(&mut self) {
        self.reset();
        self.floor = 0;
    }

    fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.first = None;
        self.highest = None;
        self.generation += 1;
    }
}
