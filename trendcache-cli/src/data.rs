//! Bar sources for the CLI: a seeded random walk or a CSV file.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::path::Path;
use trendcache_core::Bar;

/// Generate `count` synthetic daily bars.
///
/// A random walk from a starting price of 100.0, weekdays only, fully
/// determined by `seed`.
pub fn synthetic_bars(count: usize, seed: u64) -> Result<Vec<Bar>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut current = NaiveDate::from_ymd_opt(2015, 1, 2).context("invalid synthetic start date")?;

    while bars.len() < count {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar::new(
            current.and_time(chrono::NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
        ));

        price = close;
        current += chrono::Duration::days(1);
    }

    Ok(bars)
}

/// Nudge a price by up to ±0.2%, as an intrabar trade would.
pub fn tick(rng: &mut StdRng, price: f64) -> f64 {
    price * (1.0 + rng.gen_range(-0.002..0.002))
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    for format in DATETIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(time);
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unrecognized bar time '{raw}'"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

/// Load bars from a CSV file with a header row:
/// `time,open,high,low,close[,volume]`.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut bars = Vec::new();
    for (row, record) in reader.deserialize::<CsvBar>().enumerate() {
        let record = record.with_context(|| format!("{}: bad row {}", path.display(), row + 1))?;
        let time = parse_time(record.time.trim())?;
        bars.push(Bar::new(
            time,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }
    if bars.is_empty() {
        bail!("{} contains no bars", path.display());
    }
    Ok(bars)
}
