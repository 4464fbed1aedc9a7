//! Concurrency tests for per-index single-flight.
//!
//! 1. N concurrent callers for one index → exactly one computation
//! 2. Callers for different indices never wait on each other
//! 3. A failing computation is observed by every waiter and not cached
//! 4. A panicking leader releases its waiters
//! 5. Concurrent indicator queries agree with a sequential evaluation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use trendcache_core::indicators::{Ema, PriceIndicator};
use trendcache_core::{
    Bar, BarSeries, BoundedIndexCache, Capacity, EngineConfig, Indicator, IndicatorError,
};

const THREADS: usize = 8;

fn make_series(n: usize) -> Arc<BarSeries> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = (0..n).map(|i| {
        let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
        Bar::new(
            base + chrono::Duration::minutes(i as i64),
            close - 0.3,
            close + 1.5,
            close - 1.5,
            close,
            1_000.0,
        )
    });
    Arc::new(BarSeries::from_bars("bench", bars).unwrap())
}

#[test]
fn eight_callers_one_computation() {
    let cache = Arc::new(BoundedIndexCache::<f64>::new(Capacity::Unbounded));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_compute(42, |i| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(100));
                    Ok(i as f64 * 1.5)
                })
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result, Ok(63.0));
    }
    assert_eq!(cache.get(42), Some(63.0));
}

#[test]
fn different_indices_do_not_block_each_other() {
    let cache = Arc::new(BoundedIndexCache::<f64>::new(Capacity::Unbounded));
    let (tx, rx) = mpsc::channel::<()>();

    // Index 1's computation only finishes once index 2's has run, so a cache
    // that serialized unrelated indices would time out here.
    let slow = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            cache.get_or_compute(1, |_| {
                rx.recv_timeout(Duration::from_secs(5))
                    .map(|_| 1.0)
                    .map_err(|e| IndicatorError::Calculation(e.to_string()))
            })
        })
    };

    thread::sleep(Duration::from_millis(50));
    let fast = cache.get_or_compute(2, |_| {
        tx.send(()).unwrap();
        Ok(2.0)
    });

    assert_eq!(fast, Ok(2.0));
    assert_eq!(slow.join().unwrap(), Ok(1.0));
}

#[test]
fn failure_reaches_every_waiter() {
    let cache = Arc::new(BoundedIndexCache::<f64>::new(Capacity::Unbounded));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_compute(7, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(200));
                    Err(IndicatorError::Calculation("feed unavailable".into()))
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            Err(IndicatorError::Calculation("feed unavailable".into()))
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(7), None);

    // Not poisoned: a later call retries.
    assert_eq!(cache.get_or_compute(7, |_| Ok(7.0)), Ok(7.0));
}

#[test]
fn panicking_leader_releases_waiters() {
    let cache = Arc::new(BoundedIndexCache::<f64>::new(Capacity::Unbounded));
    let (started_tx, started_rx) = mpsc::channel::<()>();

    let leader = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            cache.get_or_compute(3, |_| -> trendcache_core::Result<f64> {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(200));
                panic!("formula bug");
            })
        })
    };

    started_rx.recv().unwrap();
    let waited = cache.get_or_compute(3, |_| Ok(0.0));
    assert_eq!(waited, Err(IndicatorError::Abandoned { index: 3 }));
    assert!(leader.join().is_err());

    // The flight is gone; the index can be computed normally.
    assert_eq!(cache.get_or_compute(3, |_| Ok(3.0)), Ok(3.0));
}

#[test]
fn concurrent_indicator_queries_match_sequential() {
    let series = make_series(5_000);
    let config = EngineConfig::default();
    let build = || -> Arc<dyn Indicator> {
        let close: Arc<dyn Indicator> = Arc::new(PriceIndicator::close(&series));
        Arc::new(Ema::build(close, 20, &config))
    };

    let reference = build();
    let expected: Vec<f64> = (0..5_000).map(|i| reference.value(i).unwrap()).collect();

    let shared = build();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let shared = Arc::clone(&shared);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Each thread walks the indices from a different offset.
                (0..5_000)
                    .map(|k| (k * 7 + t * 613) % 5_000)
                    .map(|i| (i, shared.value(i).unwrap()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (i, value) in handle.join().unwrap() {
            assert_eq!(value, expected[i], "index {i}");
        }
    }
}
