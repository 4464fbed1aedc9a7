//! Bounded, thread-safe, index-keyed memoization cache.
//!
//! `BoundedIndexCache` maps a non-negative index to a computed value. It knows
//! nothing about bars or indicators: it provides get-or-compute with
//! per-index single-flight, ring-buffer eviction, prefill, and invalidation.
//!
//! # Locking
//! - The ring (slots, `first_cached_index`, `highest_result_index`) sits behind
//!   one `RwLock`. It is only held for slot reads and writes, never while a
//!   value is being computed.
//! - In-flight computations are registered in a map of `Flight`s keyed by
//!   index. Callers for the same index wait on that flight; callers for other
//!   indices never block on it.
//! - Lock order is flights -> ring. Nothing acquires them the other way round.

mod flight;
mod ring;

pub use ring::Capacity;

use crate::error::{IndicatorError, Result};
use flight::Flight;
use ring::Ring;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// Default slot reservation for unbounded caches.
pub const DEFAULT_UNBOUNDED_CAPACITY: usize = 512;

/// Snapshot of a cache's bookkeeping and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub capacity: Option<usize>,
    pub retained: usize,
    pub first_cached_index: Option<usize>,
    pub highest_result_index: Option<usize>,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0, 1]`; 0 when nothing was requested.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Ring-buffer backed memoization cache keyed by index.
pub struct BoundedIndexCache<V> {
    ring: RwLock<Ring<V>>,
    flights: Mutex<HashMap<usize, Arc<Flight<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Unregisters a flight on every exit path. If the leader unwinds before
/// publishing, waiters are released with `IndicatorError::Abandoned`.
struct FlightGuard<'a, V: Clone> {
    flights: &'a Mutex<HashMap<usize, Arc<Flight<V>>>>,
    flight: Arc<Flight<V>>,
    index: usize,
    finished: bool,
}

impl<V: Clone> FlightGuard<'_, V> {
    fn unregister(&self) {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.index);
    }

    fn finish(mut self, outcome: Result<V>) {
        self.unregister();
        self.flight.finish(outcome);
        self.finished = true;
    }
}

impl<V: Clone> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if !self.finished {
            self.unregister();
            self.flight.abandon(self.index);
        }
    }
}

impl<V: Clone + Send + Sync> BoundedIndexCache<V> {
    pub fn new(capacity: Capacity) -> Self {
        Self::with_initial_capacity(capacity, DEFAULT_UNBOUNDED_CAPACITY)
    }

    /// Like `new`, with an explicit initial slot reservation.
    pub fn with_initial_capacity(capacity: Capacity, initial: usize) -> Self {
        Self {
            ring: RwLock::new(Ring::new(capacity, initial)),
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ring<V>> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ring<V>> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<usize, Arc<Flight<V>>>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> Capacity {
        self.read().capacity()
    }

    /// Non-computing lookup. `None` if never stored, evicted, or invalidated.
    pub fn get(&self, index: usize) -> Option<V> {
        self.read().get(index).cloned()
    }

    /// Returns the cached value for `index`, computing it at most once.
    ///
    /// Concurrent callers for the same index share one computation and all
    /// observe its outcome, including failures. A failed computation stores
    /// nothing, so a later call retries. A computation that started before an
    /// invalidation returns its value but does not store it.
    ///
    /// If `compute` re-requests the index it is computing on the same thread,
    /// that inner call fails with `IndicatorError::Reentrant`.
    pub fn get_or_compute<F>(&self, index: usize, compute: F) -> Result<V>
    where
        F: FnOnce(usize) -> Result<V>,
    {
        if let Some(value) = self.get(index) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let (guard, generation) = {
            let mut flights = self.flights();
            if let Some(flight) = flights.get(&index) {
                let flight = Arc::clone(flight);
                drop(flights);
                if flight.is_owned_by_current_thread() {
                    return Err(IndicatorError::Reentrant { index });
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                return flight.wait();
            }

            // Double-check under the flights lock: a leader stores into the
            // ring before it unregisters its flight.
            let ring = self.read();
            if let Some(value) = ring.get(index) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value.clone());
            }
            let generation = ring.generation();
            drop(ring);

            let flight = Arc::new(Flight::new());
            flights.insert(index, Arc::clone(&flight));
            let guard = FlightGuard {
                flights: &self.flights,
                flight,
                index,
                finished: false,
            };
            (guard, generation)
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = compute(index);
        if let Ok(value) = &outcome {
            let mut ring = self.write();
            if ring.generation() == generation {
                ring.store(index, value.clone());
            } else {
                trace!(index, "cache invalidated during computation; result not stored");
            }
        }
        guard.finish(outcome.clone());
        outcome
    }

    /// Stores a value. A bounded cache makes room by evicting from the far
    /// end: the oldest entries for a newer index, the newest entries for an
    /// index more than `capacity` behind the highest.
    ///
    /// Returns `false`, storing nothing, only for an index below the floor
    /// set by `evict_before`.
    pub fn put(&self, index: usize, value: V) -> bool {
        self.write().store(index, value)
    }

    /// Computes and stores every missing index in `[from, to)` in ascending
    /// order. Indices already present are skipped, so overlapping calls do no
    /// redundant work. Stops at the first failure.
    pub fn prefill_until<F>(&self, from: usize, to: usize, mut compute: F) -> Result<()>
    where
        F: FnMut(usize) -> Result<V>,
    {
        for index in from..to {
            if self.read().get(index).is_some() {
                continue;
            }
            self.get_or_compute(index, &mut compute)?;
        }
        Ok(())
    }

    /// Drops every entry with index >= `index`. `invalidate_from(0)` clears
    /// everything; an index beyond the highest entry changes nothing.
    pub fn invalidate_from(&self, index: usize) {
        self.write().invalidate_from(index);
    }

    /// Drops every entry with index < `index`, and refuses later stores below
    /// it until `clear`. Used when the series window is trimmed.
    pub fn evict_before(&self, index: usize) {
        self.write().evict_before(index);
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// True iff `index` lies inside `[first_cached_index, highest_result_index]`.
    pub fn is_in_range(&self, index: usize) -> bool {
        self.read().in_range(index)
    }

    pub fn first_cached_index(&self) -> Option<usize> {
        self.read().first()
    }

    pub fn highest_result_index(&self) -> Option<usize> {
        self.read().highest()
    }

    /// The oldest retained entry, read under a single lock.
    pub fn oldest(&self) -> Option<(usize, V)> {
        self.read()
            .oldest()
            .map(|(index, value)| (index, value.clone()))
    }

    pub fn stats(&self) -> CacheStats {
        let ring = self.read();
        CacheStats {
            capacity: ring.capacity().limit(),
            retained: ring.retained(),
            first_cached_index: ring.first(),
            highest_result_index: ring.highest(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
