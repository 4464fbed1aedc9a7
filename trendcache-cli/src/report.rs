//! Indicator selection and result output.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use trendcache_core::indicators::{atr, Ema, Momentum, PriceIndicator, Roc, Rsi, Sma};
use trendcache_core::indicators::Mma;
use trendcache_core::precompute::IndicatorValues;
use trendcache_core::{BarSeries, CacheStats, EngineConfig, Indicator};

/// One `--indicators` entry, e.g. `sma:20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSpec {
    Sma(usize),
    Ema(usize),
    Mma(usize),
    Rsi(usize),
    Atr(usize),
    Momentum(usize),
    Roc(usize),
}

impl FromStr for IndicatorSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, period) = s
            .split_once(':')
            .with_context(|| format!("indicator '{s}' must look like kind:period"))?;
        let period: usize = period
            .trim()
            .parse()
            .with_context(|| format!("bad period in '{s}'"))?;
        if period == 0 {
            bail!("period must be >= 1 in '{s}'");
        }
        Ok(match kind.trim().to_ascii_lowercase().as_str() {
            "sma" => IndicatorSpec::Sma(period),
            "ema" => IndicatorSpec::Ema(period),
            "mma" => IndicatorSpec::Mma(period),
            "rsi" => IndicatorSpec::Rsi(period),
            "atr" => IndicatorSpec::Atr(period),
            "momentum" | "mom" => IndicatorSpec::Momentum(period),
            "roc" => IndicatorSpec::Roc(period),
            other => bail!(
                "unknown indicator '{other}'. Valid: sma, ema, mma, rsi, atr, momentum, roc"
            ),
        })
    }
}

impl IndicatorSpec {
    pub fn build(
        self,
        series: &Arc<BarSeries>,
        close: &Arc<dyn Indicator>,
        config: &EngineConfig,
    ) -> Arc<dyn Indicator> {
        let source = Arc::clone(close);
        match self {
            IndicatorSpec::Sma(n) => Arc::new(Sma::build(source, n, config)),
            IndicatorSpec::Ema(n) => Arc::new(Ema::build(source, n, config)),
            IndicatorSpec::Mma(n) => Arc::new(Mma::build(source, n, config)),
            IndicatorSpec::Rsi(n) => Arc::new(Rsi::build(source, n, config)),
            IndicatorSpec::Atr(n) => Arc::new(atr(series, n, config)),
            IndicatorSpec::Momentum(n) => Arc::new(Momentum::build(source, n, config)),
            IndicatorSpec::Roc(n) => Arc::new(Roc::build(source, n, config)),
        }
    }
}

/// Parse a comma-separated indicator list.
pub fn parse_specs(list: &str) -> Result<Vec<IndicatorSpec>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Build the close-price source and every requested indicator on `series`.
pub fn build_all(
    series: &Arc<BarSeries>,
    specs: &[IndicatorSpec],
    config: &EngineConfig,
) -> Vec<Arc<dyn Indicator>> {
    let close: Arc<dyn Indicator> = Arc::new(PriceIndicator::close(series));
    specs
        .iter()
        .map(|spec| spec.build(series, &close, config))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct IndicatorReport {
    pub name: String,
    pub unstable_bars: usize,
    pub last: Option<f64>,
    pub cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
pub struct ComputeReport {
    pub series: String,
    pub bar_count: usize,
    pub begin_index: Option<usize>,
    pub end_index: Option<usize>,
    pub warmup: usize,
    pub parallel: bool,
    pub elapsed_ms: f64,
    pub indicators: Vec<IndicatorReport>,
}

pub fn indicator_reports(
    indicators: &[Arc<dyn Indicator>],
    values: &IndicatorValues,
    end: Option<usize>,
) -> Vec<IndicatorReport> {
    indicators
        .iter()
        .map(|ind| IndicatorReport {
            name: ind.name().to_string(),
            unstable_bars: ind.unstable_bars(),
            last: end.and_then(|end| values.get(ind.name(), end)),
            cache: ind.cache_stats(),
        })
        .collect()
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_nan() => "NaN".to_string(),
        Some(v) => format!("{v:.4}"),
        None => "-".to_string(),
    }
}

/// Print the last `tail` rows of the computed values and a cache summary.
pub fn print_table(report: &ComputeReport, values: &IndicatorValues, tail: usize) {
    println!();
    println!("=== {} ===", report.series);
    println!(
        "Bars:      {} (indices {} to {}, {} warmup)",
        report.bar_count,
        report.begin_index.map_or("-".into(), |i| i.to_string()),
        report.end_index.map_or("-".into(), |i| i.to_string()),
        report.warmup
    );
    println!(
        "Evaluated: {:.2} ms ({})",
        report.elapsed_ms,
        if report.parallel { "parallel" } else { "sequential" }
    );
    println!();

    if let (Some(begin), Some(end)) = (report.begin_index, report.end_index) {
        let first = end.saturating_sub(tail.saturating_sub(1)).max(begin);
        print!("{:>8}", "index");
        for ind in &report.indicators {
            print!(" {:>14}", ind.name);
        }
        println!();
        println!("{}", "-".repeat(8 + 15 * report.indicators.len()));
        for index in first..=end {
            print!("{index:>8}");
            for ind in &report.indicators {
                print!(" {:>14}", format_value(values.get(&ind.name, index)));
            }
            println!();
        }
        println!();
    }

    println!(
        "{:<14} {:>8} {:>10} {:>10} {:>10} {:>8}",
        "Indicator", "Unstable", "Retained", "Hits", "Misses", "Hit %"
    );
    println!("{}", "-".repeat(65));
    for ind in &report.indicators {
        match &ind.cache {
            Some(stats) => println!(
                "{:<14} {:>8} {:>10} {:>10} {:>10} {:>7.1}%",
                ind.name,
                ind.unstable_bars,
                stats.retained,
                stats.hits,
                stats.misses,
                stats.hit_rate() * 100.0
            ),
            None => println!("{:<14} {:>8} {:>10}", ind.name, ind.unstable_bars, "uncached"),
        }
    }
    println!();
}

/// Render precomputed values as CSV: `index,time,close,<indicator...>`.
pub fn export_values_csv(
    series: &BarSeries,
    indicators: &[Arc<dyn Indicator>],
    values: &IndicatorValues,
) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["index".to_string(), "time".to_string(), "close".to_string()];
    header.extend(indicators.iter().map(|ind| ind.name().to_string()));
    wtr.write_record(&header)?;

    let names: Vec<&str> = indicators.iter().map(|ind| ind.name()).collect();
    let len = values
        .get_series(names.first().copied().unwrap_or_default())
        .map_or(0, <[f64]>::len);
    for index in values.begin()..values.begin() + len {
        let bar = series.bar(index)?;
        let mut row = vec![
            index.to_string(),
            bar.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.4}", bar.close),
        ];
        for name in &names {
            row.push(values.get(name, index).map_or(String::new(), |v| {
                if v.is_nan() {
                    String::new()
                } else {
                    format!("{v:.6}")
                }
            }));
        }
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_export(path: &Path, csv: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_bars;
    use trendcache_core::precompute::precompute;

    #[test]
    fn parse_specs_accepts_list() {
        let specs = parse_specs("sma:20, EMA:50,rsi:14,").unwrap();
        assert_eq!(
            specs,
            vec![
                IndicatorSpec::Sma(20),
                IndicatorSpec::Ema(50),
                IndicatorSpec::Rsi(14)
            ]
        );
    }

    #[test]
    fn parse_specs_rejects_unknown_and_zero() {
        assert!(parse_specs("macd:12").is_err());
        assert!(parse_specs("sma:0").is_err());
        assert!(parse_specs("sma").is_err());
    }

    #[test]
    fn export_has_header_and_one_row_per_bar() {
        let series = Arc::new(BarSeries::from_bars("t", synthetic_bars(30, 3).unwrap()).unwrap());
        let specs = parse_specs("sma:5,momentum:3").unwrap();
        let indicators = build_all(&series, &specs, &EngineConfig::default());
        let values = precompute(&indicators).unwrap();
        let csv = export_values_csv(&series, &indicators, &values).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("index,time,close,sma_5,momentum_3"));
        assert_eq!(lines.count(), 30);
    }

    #[test]
    fn reports_carry_cache_stats() {
        let series = Arc::new(BarSeries::from_bars("t", synthetic_bars(40, 9).unwrap()).unwrap());
        let indicators = build_all(&series, &parse_specs("ema:10").unwrap(), &EngineConfig::default());
        let values = precompute(&indicators).unwrap();
        let reports = indicator_reports(&indicators, &values, Some(39));
        assert_eq!(reports[0].name, "ema_10");
        assert!(reports[0].last.is_some());
        assert_eq!(reports[0].cache.as_ref().unwrap().retained, 40);
    }
}
