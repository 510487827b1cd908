// src/simulate.rs

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::config::{AccumulationMode, DriftOverlay, ForecastConfig};
use crate::error::{ForecastError, Result};

/// N independent simulated price paths over the forecast horizon.
/// Each path holds H+1 values; index 0 is the anchor (last observed
/// price), indices 1..=H are the simulated future.
#[derive(Debug, Clone)]
pub struct SimulationEnsemble {
    pub paths: Vec<Vec<f64>>,
    pub horizon: usize,
}

impl SimulationEnsemble {
    /// Simulated values at one time index across all paths.
    pub fn column(&self, t: usize) -> Vec<f64> {
        self.paths.iter().map(|p| p[t]).collect()
    }
}

/// Deterministic per-step trend shared by all paths: a linear ramp over
/// the horizon plus one normal perturbation per step, drawn once per
/// run (not per path) from the run seed.
fn drift_track(overlay: Option<&DriftOverlay>, h: usize, seed: u64) -> Vec<f64> {
    let overlay = match overlay {
        Some(o) => o,
        None => return vec![0.0; h],
    };

    let mut rng = StdRng::seed_from_u64(seed);
    // Perturbation sigma 0 is a valid (degenerate) configuration.
    let normal = Normal::new(0.0, 1.0).unwrap();

    let span = overlay.trend_high - overlay.trend_low;
    (0..h)
        .map(|t| {
            let frac = if h > 1 { t as f64 / (h - 1) as f64 } else { 0.0 };
            let z: f64 = normal.sample(&mut rng);
            overlay.trend_low + span * frac + overlay.perturbation * z
        })
        .collect()
}

/// Draw N independent paths combining the mean forecast, the
/// volatility forecast and the innovation configuration.
///
/// Paths share only read-only inputs, so they are computed in parallel;
/// each path owns a generator seeded from the run seed and its own
/// index, which makes the ensemble bit-identical for a fixed seed
/// regardless of thread scheduling.
pub fn simulate_ensemble(
    mean_forecast: &[f64],
    variance_forecast: &[f64],
    anchor: f64,
    cfg: &ForecastConfig,
) -> Result<SimulationEnsemble> {
    let h = cfg.horizon;
    if mean_forecast.len() != h || variance_forecast.len() != h {
        return Err(ForecastError::Validation(format!(
            "forecast lengths {}/{} do not match horizon {}",
            mean_forecast.len(),
            variance_forecast.len(),
            h
        )));
    }
    if !anchor.is_finite() || anchor <= 0.0 {
        return Err(ForecastError::Validation(format!(
            "anchor price must be finite and > 0, got {}",
            anchor
        )));
    }
    for (t, v) in variance_forecast.iter().enumerate() {
        if !v.is_finite() || *v < 0.0 {
            return Err(ForecastError::Validation(format!(
                "variance forecast at step {} is {} (must be finite and >= 0)",
                t + 1,
                v
            )));
        }
    }
    if mean_forecast.iter().any(|m| !m.is_finite()) {
        return Err(ForecastError::Validation(
            "mean forecast contains non-finite values".into(),
        ));
    }

    // Per-step shock standard deviations.
    let sigmas: Vec<f64> = variance_forecast
        .iter()
        .map(|v| v.sqrt() * cfg.amplification)
        .collect();

    let drift = drift_track(cfg.drift_overlay.as_ref(), h, cfg.seed);

    // Deterministic base level path for the multiplicative rule:
    // the anchor compounded by the predicted mean returns.
    let base_level: Vec<f64> = {
        let mut acc = anchor.ln();
        mean_forecast
            .iter()
            .map(|m| {
                acc += m;
                acc.exp()
            })
            .collect()
    };

    let paths: Result<Vec<Vec<f64>>> = (0..cfg.num_paths)
        .into_par_iter()
        .map(|path_idx| {
            let mut rng =
                StdRng::seed_from_u64(cfg.seed.wrapping_add(path_idx as u64 + 1));
            let normal = Normal::new(0.0, 1.0).unwrap();

            let mut path = Vec::with_capacity(h + 1);
            path.push(anchor);

            match cfg.accumulation {
                AccumulationMode::AdditiveLog => {
                    let mut logp = anchor.ln();
                    for t in 0..h {
                        let z: f64 = normal.sample(&mut rng);
                        logp += mean_forecast[t] + drift[t] + sigmas[t] * z;
                        path.push(logp.exp());
                    }
                }
                AccumulationMode::MultiplicativeLevel => {
                    for t in 0..h {
                        let z: f64 = normal.sample(&mut rng);
                        path.push(base_level[t] * (1.0 + drift[t] + sigmas[t] * z));
                    }
                }
            }

            if path.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::Validation(format!(
                    "simulated path {} contains non-finite values",
                    path_idx
                )));
            }
            Ok(path)
        })
        .collect();

    Ok(SimulationEnsemble { paths: paths?, horizon: h })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;

    fn base_cfg() -> ForecastConfig {
        ForecastConfig {
            horizon: 10,
            num_paths: 64,
            amplification: 1.0,
            drift_overlay: None,
            accumulation: AccumulationMode::AdditiveLog,
            seed: 7,
            ..Default::default()
        }
    }

    fn flat_inputs(h: usize) -> (Vec<f64>, Vec<f64>) {
        (vec![0.001; h], vec![0.0004; h])
    }

    #[test]
    fn test_ensemble_shape_and_anchor() {
        let cfg = base_cfg();
        let (means, vars) = flat_inputs(cfg.horizon);
        let ens = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        assert_eq!(ens.paths.len(), cfg.num_paths);
        for path in &ens.paths {
            assert_eq!(path.len(), cfg.horizon + 1);
            assert_eq!(path[0], 100.0);
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let cfg = base_cfg();
        let (means, vars) = flat_inputs(cfg.horizon);
        let a = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        let b = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        assert_eq!(a.paths, b.paths);
    }

    #[test]
    fn test_different_seed_differs() {
        let cfg = base_cfg();
        let (means, vars) = flat_inputs(cfg.horizon);
        let a = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        let mut cfg2 = cfg.clone();
        cfg2.seed = 8;
        let b = simulate_ensemble(&means, &vars, 100.0, &cfg2).unwrap();
        assert_ne!(a.paths, b.paths);
    }

    #[test]
    fn test_additive_log_stays_positive() {
        let mut cfg = base_cfg();
        cfg.amplification = 50.0; // violent shocks
        let (means, vars) = flat_inputs(cfg.horizon);
        let ens = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        for path in &ens.paths {
            for v in path {
                assert!(*v > 0.0);
            }
        }
    }

    #[test]
    fn test_zero_variance_multiplicative_follows_base() {
        let mut cfg = base_cfg();
        cfg.accumulation = AccumulationMode::MultiplicativeLevel;
        let means = vec![0.01; cfg.horizon];
        let vars = vec![0.0; cfg.horizon];
        let ens = simulate_ensemble(&means, &vars, 100.0, &cfg).unwrap();
        // With no noise and no overlay every path equals the base level.
        let first = &ens.paths[0];
        for path in &ens.paths {
            assert_eq!(path, first);
        }
        assert!((first[1] - 100.0 * (0.01f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_negative_variance_rejected() {
        let cfg = base_cfg();
        let means = vec![0.0; cfg.horizon];
        let mut vars = vec![0.0004; cfg.horizon];
        vars[3] = -1.0;
        match simulate_ensemble(&means, &vars, 100.0, &cfg) {
            Err(ForecastError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let cfg = base_cfg();
        let means = vec![0.0; cfg.horizon - 1];
        let vars = vec![0.0004; cfg.horizon];
        assert!(simulate_ensemble(&means, &vars, 100.0, &cfg).is_err());
    }

    #[test]
    fn test_drift_track_is_deterministic_per_seed() {
        let overlay = DriftOverlay {
            trend_low: -0.05,
            trend_high: 0.05,
            perturbation: 0.01,
        };
        let a = drift_track(Some(&overlay), 30, 42);
        let b = drift_track(Some(&overlay), 30, 42);
        assert_eq!(a, b);
        let c = drift_track(Some(&overlay), 30, 43);
        assert_ne!(a, c);
    }
}
