// src/data.rs

use std::error::Error;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;

use crate::error::{ForecastError, Result};

/// Single daily OHLCV bar. Only `close` is consumed by the forecast
/// core; the rest ride along from ingestion.
#[derive(Debug, Clone)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Dated log-return series: first difference of log close, one element
/// shorter than the price series. The leading undefined element is
/// dropped, never imputed, so the series carries no NaNs.
#[derive(Debug, Clone)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

/// Clean a string cell:
/// - trim whitespace
/// - strip BOM
/// - strip surrounding quotes
fn clean(s: &str) -> String {
    s.trim()
        .trim_matches('\u{feff}')
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

/// Parse an f64 from an optional string cell, logging failures but not panicking.
fn parse_f64(row: usize, col: usize, x: Option<&String>) -> f64 {
    match x {
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            match trimmed.parse::<f64>() {
                Ok(val) => val,
                Err(_) => {
                    eprintln!("Row {} col {}: '{}' invalid f64 → 0", row, col, v);
                    0.0
                }
            }
        }
        None => 0.0,
    }
}

/// Try to parse a date cell.
///
/// Supports:
/// - "%Y-%m-%d"
/// - "%Y-%m-%d %H:%M:%S" (time-of-day ignored)
fn parse_date(row: usize, raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        eprintln!("Row {} date empty", row);
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }

    eprintln!("Row {} date invalid '{}'", row, raw);
    None
}

/// Read daily OHLCV bars from a CSV with header.
///
/// Expected column layout (by index):
/// 0: date (e.g. "2024-01-01")
/// 1: open
/// 2: high
/// 3: low
/// 4: close
/// 5: volume
///
/// Rows with too few columns or broken cells are skipped; structural
/// validation of the surviving series happens in `validate_bars`.
pub fn read_bars<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<PriceBar>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut bars = Vec::new();

    for (i, row) in rdr.records().enumerate() {
        let record = match row {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Row {} skipped, error = {}", i, e);
                continue;
            }
        };

        if record.len() < 6 {
            eprintln!("Row {} skipped ({} cols < 6)", i, record.len());
            continue;
        }

        let cols: Vec<String> = record.iter().map(|s| clean(s)).collect();

        let date = match parse_date(i, &cols[0]) {
            Some(d) => d,
            None => continue,
        };

        let open = parse_f64(i, 1, cols.get(1));
        let high = parse_f64(i, 2, cols.get(2));
        let low = parse_f64(i, 3, cols.get(3));
        let close = parse_f64(i, 4, cols.get(4));
        let volume = parse_f64(i, 5, cols.get(5));

        // Basic sanity: skip bars with totally broken price fields.
        if !open.is_finite() || !high.is_finite() || !low.is_finite() || !close.is_finite() {
            eprintln!("Row {} skipped (non-finite OHLC)", i);
            continue;
        }

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars.sort_by(|a, b| a.date.cmp(&b.date));

    Ok(bars)
}

/// Structural checks on the series handed to the core: strictly
/// increasing unique dates and strictly positive finite closes.
pub fn validate_bars(bars: &[PriceBar]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            return Err(ForecastError::Validation(format!(
                "close at {} is {} (must be finite and > 0)",
                bar.date, bar.close
            )));
        }
        if i > 0 && bars[i - 1].date >= bar.date {
            return Err(ForecastError::Validation(format!(
                "dates not strictly increasing: {} then {}",
                bars[i - 1].date,
                bar.date
            )));
        }
    }
    Ok(())
}

/// Log returns from close prices.
///
/// Needs at least 2 bars; returns one value per consecutive pair.
pub fn log_returns(bars: &[PriceBar]) -> Result<ReturnSeries> {
    if bars.len() < 2 {
        return Err(ForecastError::InsufficientData {
            required: 2,
            got: bars.len(),
        });
    }

    let mut dates = Vec::with_capacity(bars.len() - 1);
    let mut values = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        let p0 = bars[i - 1].close;
        let p1 = bars[i].close;
        if p0 <= 0.0 || p1 <= 0.0 {
            return Err(ForecastError::Validation(format!(
                "non-positive close around {} makes the log-return undefined",
                bars[i].date
            )));
        }
        dates.push(bars[i].date);
        values.push((p1 / p0).ln());
    }

    Ok(ReturnSeries { dates, values })
}
