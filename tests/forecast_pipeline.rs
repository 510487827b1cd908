use chrono::{Duration, NaiveDate};

use price_forecast::{
    run_forecast, simulate_ensemble, AccumulationMode, ForecastConfig, ForecastError,
    GarchOrder, PriceBar, SarimaOrder,
};

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn bar(i: usize, close: f64) -> PriceBar {
    PriceBar {
        date: start_date() + Duration::days(i as i64),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1000.0,
    }
}

/// Deterministic geometric random-walk-ish history.
fn synthetic_history(n: usize) -> Vec<PriceBar> {
    let mut close = 100.0;
    (0..n)
        .map(|i| {
            let noise = ((i * 7919) % 1000) as f64 / 1000.0 * 0.04 - 0.02;
            close *= (0.0005 + noise).exp();
            bar(i, close)
        })
        .collect()
}

fn constant_history(n: usize) -> Vec<PriceBar> {
    (0..n).map(|i| bar(i, 250.0)).collect()
}

fn test_cfg() -> ForecastConfig {
    ForecastConfig {
        num_paths: 300,
        ..Default::default()
    }
}

#[test]
fn anchor_invariant_holds_exactly() {
    let bars = synthetic_history(400);
    let last_close = bars.last().unwrap().close;

    let outcome = run_forecast(&bars, &test_cfg()).unwrap();
    let band = &outcome.band;

    assert_eq!(band.median[0], last_close);
    assert_eq!(band.lower[0], last_close);
    assert_eq!(band.upper[0], last_close);
    assert_eq!(band.dates[0], bars.last().unwrap().date);
}

#[test]
fn band_ordering_holds_everywhere() {
    let bars = synthetic_history(400);
    let outcome = run_forecast(&bars, &test_cfg()).unwrap();
    let band = &outcome.band;

    assert_eq!(band.len(), test_cfg().horizon + 1);
    for t in 0..band.len() {
        assert!(band.lower[t] <= band.median[t], "t = {}", t);
        assert!(band.median[t] <= band.upper[t], "t = {}", t);
        assert!(band.median[t].is_finite());
    }
}

#[test]
fn fixed_seed_reproduces_band_bit_identically() {
    let bars = synthetic_history(400);
    let cfg = test_cfg();

    let a = run_forecast(&bars, &cfg).unwrap();
    let b = run_forecast(&bars, &cfg).unwrap();

    assert_eq!(a.band.median, b.band.median);
    assert_eq!(a.band.lower, b.band.lower);
    assert_eq!(a.band.upper, b.band.upper);
}

#[test]
fn changing_path_count_leaves_models_untouched() {
    let bars = synthetic_history(400);

    let small = run_forecast(&bars, &ForecastConfig { num_paths: 100, ..test_cfg() }).unwrap();
    let large = run_forecast(&bars, &ForecastConfig { num_paths: 2000, ..test_cfg() }).unwrap();

    // Anchor and fitted-model forecasts are independent of N.
    assert_eq!(small.band.median[0], large.band.median[0]);
    assert_eq!(
        small.mean_model.forecast(30),
        large.mean_model.forecast(30)
    );
    assert_eq!(small.vol_model.forecast(30), large.vol_model.forecast(30));
}

#[test]
fn growing_the_ensemble_keeps_earlier_paths() {
    // Per-path seed streams: the first 100 paths of a 1000-path run are
    // exactly the 100-path run.
    let cfg_small = ForecastConfig {
        horizon: 20,
        num_paths: 100,
        drift_overlay: None,
        accumulation: AccumulationMode::AdditiveLog,
        ..Default::default()
    };
    let cfg_large = ForecastConfig { num_paths: 1000, ..cfg_small.clone() };

    let means = vec![0.001; 20];
    let vars = vec![0.0004; 20];

    let small = simulate_ensemble(&means, &vars, 100.0, &cfg_small).unwrap();
    let large = simulate_ensemble(&means, &vars, 100.0, &cfg_large).unwrap();

    assert_eq!(&large.paths[..100], &small.paths[..]);
}

#[test]
fn constant_price_gives_flat_band() {
    // Scenario: 400 days at the same price. Mean forecast ~ 0, variance
    // forecast ~ 0, band flat at the last price.
    let bars = constant_history(400);
    let cfg = ForecastConfig {
        seasonal_order: None,
        drift_overlay: None,
        accumulation: AccumulationMode::AdditiveLog,
        anchor_continuity: false,
        amplification: 1.0,
        num_paths: 200,
        ..Default::default()
    };

    let outcome = run_forecast(&bars, &cfg).unwrap();

    for m in outcome.mean_model.forecast(30) {
        assert!(m.abs() < 1e-6, "mean forecast not ~0: {}", m);
    }
    for v in outcome.vol_model.forecast(30) {
        assert!(v < 1e-6, "variance forecast not ~0: {}", v);
    }
    for t in 0..outcome.band.len() {
        let rel = (outcome.band.median[t] - 250.0).abs() / 250.0;
        assert!(rel < 1e-3, "median departed at t = {}: {}", t, outcome.band.median[t]);
        let spread = outcome.band.upper[t] - outcome.band.lower[t];
        assert!(spread < 1.0, "band not flat at t = {}: {}", t, spread);
    }
}

#[test]
fn short_series_fails_before_simulation() {
    let bars = synthetic_history(5);
    let cfg = ForecastConfig {
        mean_order: SarimaOrder { p: 2, d: 1, q: 2 },
        seasonal_order: None,
        ..test_cfg()
    };

    match run_forecast(&bars, &cfg) {
        Err(ForecastError::InsufficientData { .. }) => {}
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn out_of_range_widening_fails_validation() {
    // The default amplification keeps the band well inside 50%, so a
    // widening factor of 0.5 must cross it and be rejected.
    let bars = synthetic_history(400);
    let cfg = ForecastConfig { widening: 0.5, ..test_cfg() };

    match run_forecast(&bars, &cfg) {
        Err(ForecastError::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[test]
fn single_path_band_collapses() {
    let bars = synthetic_history(400);
    let cfg = ForecastConfig { num_paths: 1, ..test_cfg() };

    let outcome = run_forecast(&bars, &cfg).unwrap();
    let band = &outcome.band;
    for t in 0..band.len() {
        // One path has no spread before widening, and widening is off.
        assert_eq!(band.lower[t], band.median[t], "t = {}", t);
        assert_eq!(band.upper[t], band.median[t], "t = {}", t);
    }
}

#[test]
fn interquartile_configuration_is_tighter() {
    let bars = synthetic_history(400);
    let wide = run_forecast(&bars, &test_cfg()).unwrap();
    let iqr = run_forecast(
        &bars,
        &ForecastConfig { lower_pct: 25.0, upper_pct: 75.0, ..test_cfg() },
    )
    .unwrap();

    let t = test_cfg().horizon; // terminal step
    let spread_95 = wide.band.upper[t] - wide.band.lower[t];
    let spread_iqr = iqr.band.upper[t] - iqr.band.lower[t];
    assert!(spread_iqr <= spread_95);
}

#[test]
fn both_accumulation_modes_produce_valid_bands() {
    let bars = synthetic_history(400);
    for mode in [AccumulationMode::AdditiveLog, AccumulationMode::MultiplicativeLevel] {
        let cfg = ForecastConfig { accumulation: mode, ..test_cfg() };
        let outcome = run_forecast(&bars, &cfg).unwrap();
        for t in 0..outcome.band.len() {
            assert!(outcome.band.lower[t] <= outcome.band.upper[t]);
        }
        if mode == AccumulationMode::AdditiveLog {
            // Additive-log paths can never go non-positive.
            assert!(outcome.band.lower.iter().all(|v| *v > 0.0));
        }
    }
}

#[test]
fn garch_order_is_configurable() {
    let bars = synthetic_history(500);
    let cfg = ForecastConfig {
        garch_order: GarchOrder { p: 2, q: 1 },
        ..test_cfg()
    };
    let outcome = run_forecast(&bars, &cfg).unwrap();
    assert_eq!(outcome.vol_model.beta.len(), 2);
    assert_eq!(outcome.vol_model.alpha.len(), 1);
    assert!(outcome.vol_model.persistence() < 1.0);
}
