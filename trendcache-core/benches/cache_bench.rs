//! Criterion benchmarks for TrendCache hot paths.
//!
//! Benchmarks:
//! 1. Cache hit / miss (`get_or_compute` on a warm and a cold cache)
//! 2. Ring eviction under sequential writes to a bounded cache
//! 3. Recursive prefill (cold EMA queried at the last bar)
//! 4. Indicator stack precompute over a fresh series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use trendcache_core::indicators::{atr, Ema, PriceIndicator, Rsi, Sma};
use trendcache_core::precompute::precompute;
use trendcache_core::{Bar, BarSeries, BoundedIndexCache, Capacity, EngineConfig, Indicator};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> Arc<BarSeries> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
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
            1_000_000.0,
        )
    });
    Arc::new(BarSeries::from_bars("BENCH", bars).unwrap())
}

// ── 1. Hit / miss ────────────────────────────────────────────────────

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_cache");

    let warm = BoundedIndexCache::new(Capacity::Unbounded);
    for i in 0..1_000 {
        warm.put(i, i as f64);
    }
    group.bench_function("hit_1000", |b| {
        b.iter(|| {
            for i in 0..1_000 {
                black_box(warm.get_or_compute(i, |i| Ok(i as f64)).unwrap());
            }
        });
    });

    group.bench_function("miss_1000", |b| {
        b.iter(|| {
            let cold = BoundedIndexCache::new(Capacity::Unbounded);
            for i in 0..1_000 {
                black_box(cold.get_or_compute(i, |i| Ok(i as f64)).unwrap());
            }
        });
    });

    // ── 2. Eviction ──
    for &capacity in &[16, 256, 4_096] {
        group.bench_with_input(
            BenchmarkId::new("bounded_put_10000", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let cache = BoundedIndexCache::new(Capacity::bounded(capacity));
                    for i in 0..10_000 {
                        cache.put(i, i as f64);
                    }
                    black_box(cache.first_cached_index())
                });
            },
        );
    }

    group.finish();
}

// ── 3. Recursive prefill ─────────────────────────────────────────────

fn bench_recursive(c: &mut Criterion) {
    let mut group = c.benchmark_group("recursive_prefill");
    let config = EngineConfig::default();

    for &bar_count in &[1_000, 10_000, 50_000] {
        let series = make_series(bar_count);
        group.bench_with_input(
            BenchmarkId::new("ema_20_cold_tip", bar_count),
            &bar_count,
            |b, &bar_count| {
                b.iter(|| {
                    let close: Arc<dyn Indicator> = Arc::new(PriceIndicator::close(&series));
                    let ema = Ema::build(close, 20, &config);
                    black_box(ema.value(bar_count - 1).unwrap())
                });
            },
        );
    }

    group.finish();
}

// ── 4. Precompute ────────────────────────────────────────────────────

fn bench_precompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_precompute");
    let config = EngineConfig::default();

    for &bar_count in &[252, 1_260, 2_520] {
        let series = make_series(bar_count);
        group.bench_with_input(
            BenchmarkId::new("stack_5", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    let close: Arc<dyn Indicator> = Arc::new(PriceIndicator::close(&series));
                    let stack: Vec<Arc<dyn Indicator>> = vec![
                        Arc::new(Sma::build(Arc::clone(&close), 20, &config)),
                        Arc::new(Sma::build(Arc::clone(&close), 50, &config)),
                        Arc::new(Ema::build(Arc::clone(&close), 10, &config)),
                        Arc::new(Rsi::build(close, 14, &config)),
                        Arc::new(atr(&series, 14, &config)),
                    ];
                    black_box(precompute(&stack).unwrap())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cache, bench_recursive, bench_precompute);
criterion_main!(benches);
