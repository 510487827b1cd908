// src/band.rs

use chrono::{Duration, NaiveDate};

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::simulate::SimulationEnsemble;
use crate::stats::percentile_sorted;

/// Median trajectory plus lower/upper percentile band, all length H+1
/// and anchored at index 0 to the last observed price. Dates run from
/// the last historical date through H subsequent calendar days.
#[derive(Debug, Clone)]
pub struct ForecastBand {
    pub dates: Vec<NaiveDate>,
    pub median: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ForecastBand {
    pub fn len(&self) -> usize {
        self.median.len()
    }

    pub fn is_empty(&self) -> bool {
        self.median.is_empty()
    }
}

/// Reduce the ensemble to a median and percentile band.
///
/// Order of adjustments: percentiles per step, anchor at index 0,
/// optional continuity rescale, optional widening, then the ordering
/// check. A band that fails the check is never returned.
pub fn aggregate(
    ensemble: &SimulationEnsemble,
    anchor: f64,
    last_date: NaiveDate,
    cfg: &ForecastConfig,
) -> Result<ForecastBand> {
    let h = ensemble.horizon;
    if ensemble.paths.is_empty() {
        return Err(ForecastError::Validation("ensemble has no paths".into()));
    }

    let mut median = Vec::with_capacity(h + 1);
    let mut lower = Vec::with_capacity(h + 1);
    let mut upper = Vec::with_capacity(h + 1);

    // Index 0 is pinned to the last observed price on all three series.
    median.push(anchor);
    lower.push(anchor);
    upper.push(anchor);

    for t in 1..=h {
        let mut col = ensemble.column(t);
        col.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        median.push(percentile_sorted(&col, 50.0));
        lower.push(percentile_sorted(&col, cfg.lower_pct));
        upper.push(percentile_sorted(&col, cfg.upper_pct));
    }

    // Continuity correction: rescale so the first forecast step starts
    // exactly at the anchor, removing the jump at the boundary.
    if cfg.anchor_continuity && h >= 1 {
        let first = median[1];
        if !first.is_finite() || first <= 0.0 {
            return Err(ForecastError::Validation(format!(
                "cannot apply continuity correction: first median step is {}",
                first
            )));
        }
        let ratio = anchor / first;
        for t in 1..=h {
            median[t] *= ratio;
            lower[t] *= ratio;
            upper[t] *= ratio;
        }
    }

    // Band widening. Validated below: the band must not cross.
    if cfg.widening > 0.0 {
        let factor = 1.0 + cfg.widening;
        for t in 1..=h {
            lower[t] *= factor;
            upper[t] /= factor;
        }
    }

    for t in 0..=h {
        if !median[t].is_finite() || !lower[t].is_finite() || !upper[t].is_finite() {
            return Err(ForecastError::Validation(format!(
                "band contains a non-finite value at step {}",
                t
            )));
        }
        if lower[t] > median[t] || median[t] > upper[t] {
            return Err(ForecastError::Validation(format!(
                "band ordering broken at step {}: lower {} / median {} / upper {} \
                 (widening factor out of range?)",
                t, lower[t], median[t], upper[t]
            )));
        }
    }

    let dates = (0..=h as i64)
        .map(|offset| last_date + Duration::days(offset))
        .collect();

    Ok(ForecastBand { dates, median, lower, upper })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::simulate::SimulationEnsemble;

    fn cfg() -> ForecastConfig {
        ForecastConfig {
            horizon: 3,
            anchor_continuity: false,
            widening: 0.0,
            ..Default::default()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn ensemble(paths: Vec<Vec<f64>>) -> SimulationEnsemble {
        let horizon = paths[0].len() - 1;
        SimulationEnsemble { paths, horizon }
    }

    #[test]
    fn test_anchor_invariant() {
        let ens = ensemble(vec![
            vec![100.0, 101.0, 102.0, 103.0],
            vec![100.0, 99.0, 98.0, 97.0],
            vec![100.0, 100.5, 100.0, 99.5],
        ]);
        let band = aggregate(&ens, 100.0, date(), &cfg()).unwrap();
        assert_eq!(band.median[0], 100.0);
        assert_eq!(band.lower[0], 100.0);
        assert_eq!(band.upper[0], 100.0);
        assert_eq!(band.dates[0], date());
        assert_eq!(band.len(), 4);
    }

    #[test]
    fn test_band_ordering_holds() {
        let ens = ensemble(vec![
            vec![100.0, 105.0, 110.0, 100.0],
            vec![100.0, 95.0, 90.0, 101.0],
            vec![100.0, 102.0, 99.0, 99.0],
            vec![100.0, 98.0, 103.0, 104.0],
        ]);
        let band = aggregate(&ens, 100.0, date(), &cfg()).unwrap();
        for t in 0..band.len() {
            assert!(band.lower[t] <= band.median[t]);
            assert!(band.median[t] <= band.upper[t]);
        }
    }

    #[test]
    fn test_single_path_collapses() {
        // One path has no spread: lower == median == upper everywhere.
        let ens = ensemble(vec![vec![100.0, 101.0, 99.0, 102.0]]);
        let band = aggregate(&ens, 100.0, date(), &cfg()).unwrap();
        assert_eq!(band.median, band.lower);
        assert_eq!(band.median, band.upper);
        assert_eq!(band.median[2], 99.0);
    }

    #[test]
    fn test_continuity_rescale_hits_anchor() {
        let ens = ensemble(vec![
            vec![100.0, 109.0, 115.0, 120.0],
            vec![100.0, 111.0, 118.0, 125.0],
        ]);
        let mut c = cfg();
        c.anchor_continuity = true;
        let band = aggregate(&ens, 100.0, date(), &c).unwrap();
        assert!((band.median[1] - 100.0).abs() < 1e-12);
        // Shape is preserved: later steps scaled by the same ratio.
        assert!((band.median[2] - 116.5 * (100.0 / 110.0)).abs() < 1e-9);
    }

    #[test]
    fn test_widening_crossing_is_rejected() {
        // Tight positive band: doubling lower pushes it above the median.
        let ens = ensemble(vec![
            vec![100.0, 100.0, 100.0, 100.0],
            vec![100.0, 100.1, 100.1, 100.1],
            vec![100.0, 99.9, 99.9, 99.9],
        ]);
        let mut c = cfg();
        c.widening = 1.0; // lower *= 2.0
        match aggregate(&ens, 100.0, date(), &c) {
            Err(ForecastError::Validation(msg)) => {
                assert!(msg.contains("ordering"), "msg = {}", msg);
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_small_widening_on_wide_band_passes() {
        let ens = ensemble(vec![
            vec![100.0, 140.0, 150.0, 160.0],
            vec![100.0, 100.0, 100.0, 100.0],
            vec![100.0, 60.0, 55.0, 50.0],
        ]);
        let mut c = cfg();
        c.widening = 0.02;
        let band = aggregate(&ens, 100.0, date(), &c).unwrap();
        for t in 1..band.len() {
            assert!(band.lower[t] <= band.median[t]);
            assert!(band.median[t] <= band.upper[t]);
        }
        // Index 0 stays pinned to the anchor, untouched by widening.
        assert_eq!(band.lower[0], 100.0);
        assert_eq!(band.upper[0], 100.0);
    }

    #[test]
    fn test_forecast_dates_are_consecutive() {
        let ens = ensemble(vec![vec![100.0, 101.0, 102.0, 103.0]]);
        let band = aggregate(&ens, 100.0, date(), &cfg()).unwrap();
        for (i, d) in band.dates.iter().enumerate() {
            assert_eq!(*d, date() + Duration::days(i as i64));
        }
    }
}
