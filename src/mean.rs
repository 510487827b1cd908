// src/mean.rs

use std::f64::consts::PI;

use crate::error::{ForecastError, Result};
use crate::stats::mean;

/// Regular (p, d, q) order of the mean model.
#[derive(Debug, Copy, Clone)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal (P, D, Q) order with period `s`.
#[derive(Debug, Copy, Clone)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub s: usize,
}

/// A fitted conditional-mean model: residuals for the volatility stage
/// and a deterministic H-step mean forecast.
pub trait FittedMeanModel {
    fn residuals(&self) -> &[f64];
    fn forecast(&self, h: usize) -> Vec<f64>;
}

/// Mean-model estimator. Alternative estimation algorithms can be
/// substituted behind [`FittedMeanModel`] without touching the
/// simulation engine.
pub trait MeanModel {
    fn fit(&self, returns: &[f64]) -> Result<Box<dyn FittedMeanModel>>;
}

/// SARIMA specification to fit on a return series.
#[derive(Debug, Copy, Clone)]
pub struct Sarima {
    pub order: SarimaOrder,
    pub seasonal: Option<SeasonalOrder>,
}

/// Fitted SARIMA model. Never mutated after fitting; `forecast` is a
/// pure function of the stored coefficients and sample tail.
#[derive(Debug, Clone)]
pub struct FittedSarima {
    pub order: SarimaOrder,
    pub seasonal: Option<SeasonalOrder>,
    pub constant: f64,
    pub ar: Vec<f64>,
    pub sar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sma: Vec<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    residuals: Vec<f64>,
    work: Vec<f64>,
    regular_tails: Vec<f64>,
    seasonal_heads: Vec<Vec<f64>>,
    season: usize,
}

/// Ridge weight on the normal-equation diagonal; keeps the solve
/// conditioned on flat or near-collinear samples.
const RIDGE: f64 = 1e-8;

/// Difference a series at the given lag: x[t] - x[t-lag].
pub fn difference(data: &[f64], lag: usize) -> Vec<f64> {
    if data.len() <= lag {
        return vec![];
    }
    (lag..data.len()).map(|t| data[t] - data[t - lag]).collect()
}

/// Solves Ax = b by Gaussian elimination with partial pivoting.
/// Returns None when a pivot collapses (singular system).
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Option<Vec<f64>> {
    let n = a.len();
    let mut x = vec![0.0; n];

    for i in 0..n {
        // Pivot
        let mut max_row = i;
        let mut max_val = a[i][i].abs();
        for k in (i + 1)..n {
            if a[k][i].abs() > max_val {
                max_val = a[k][i].abs();
                max_row = k;
            }
        }

        if max_val < 1e-300 {
            return None;
        }

        if max_row != i {
            a.swap(i, max_row);
            b.swap(i, max_row);
        }

        // eliminate
        for k in (i + 1)..n {
            let factor = a[k][i] / a[i][i];
            for j in i..n {
                a[k][j] -= factor * a[i][j];
            }
            b[k] -= factor * b[i];
        }
    }

    // back-substitution
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }

    Some(x)
}

/// Ridge-stabilized least squares of `y[t] = row(t) · beta` where each
/// row holds a constant plus the requested value/residual lags.
fn lagged_ridge_ols(
    series: &[f64],
    proxy: &[f64],
    vlags: &[usize],
    rlags: &[usize],
    t0: usize,
) -> Result<Vec<f64>> {
    let n = series.len();
    let ncols = 1 + vlags.len() + rlags.len();

    let mut xtx = vec![vec![0.0; ncols]; ncols];
    let mut xty = vec![0.0; ncols];
    let mut row = vec![0.0; ncols];

    for t in t0..n {
        row[0] = 1.0;
        let mut k = 1;
        for &l in vlags {
            row[k] = series[t - l];
            k += 1;
        }
        for &l in rlags {
            row[k] = proxy[t - l];
            k += 1;
        }

        for i in 0..ncols {
            xty[i] += row[i] * series[t];
            for j in 0..ncols {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 0..ncols {
        xtx[i][i] += RIDGE;
    }

    solve_linear_system(&mut xtx, &mut xty).ok_or_else(|| {
        ForecastError::ModelFit("normal equations are singular".into())
    })
}

/// One-step-ahead residual recursion for a fitted ARMA structure.
/// Pre-sample lags contribute nothing.
fn arma_residuals(
    series: &[f64],
    constant: f64,
    ar: &[f64],
    sar: &[f64],
    ma: &[f64],
    sma: &[f64],
    season: usize,
) -> Vec<f64> {
    let n = series.len();
    let mut e = vec![0.0; n];

    for t in 0..n {
        let mut pred = constant;
        for (i, &phi) in ar.iter().enumerate() {
            let lag = i + 1;
            if t >= lag {
                pred += phi * series[t - lag];
            }
        }
        for (j, &phi) in sar.iter().enumerate() {
            let lag = (j + 1) * season;
            if season > 0 && t >= lag {
                pred += phi * series[t - lag];
            }
        }
        for (i, &theta) in ma.iter().enumerate() {
            let lag = i + 1;
            if t >= lag {
                pred += theta * e[t - lag];
            }
        }
        for (j, &theta) in sma.iter().enumerate() {
            let lag = (j + 1) * season;
            if season > 0 && t >= lag {
                pred += theta * e[t - lag];
            }
        }
        e[t] = series[t] - pred;
    }

    e
}

impl Sarima {
    /// Fit by two-stage Hannan-Rissanen conditional least squares:
    /// a long autoregression supplies residual proxies, then one
    /// regression over AR/MA/seasonal lag terms estimates the
    /// coefficients. Numerical failure is fatal, never retried.
    pub fn fit(&self, returns: &[f64]) -> Result<FittedSarima> {
        let SarimaOrder { p, d, q } = self.order;
        let (sp, sd, sq, s) = match self.seasonal {
            Some(o) => (o.p, o.d, o.q, o.s),
            None => (0, 0, 0, 0),
        };

        let seasonal_span = s * (sp + sd + sq);
        let required = (p + d + q + seasonal_span).max(2);
        if returns.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                got: returns.len(),
            });
        }

        // Seasonal differencing first, then regular. The tails feed the
        // inverse transform at forecast time.
        let mut work = returns.to_vec();
        let mut seasonal_heads = Vec::with_capacity(sd);
        for _ in 0..sd {
            if work.len() <= s {
                return Err(ForecastError::InsufficientData {
                    required,
                    got: returns.len(),
                });
            }
            seasonal_heads.push(work[work.len() - s..].to_vec());
            work = difference(&work, s);
        }
        let mut regular_tails = Vec::with_capacity(d);
        for _ in 0..d {
            if work.len() < 2 {
                return Err(ForecastError::InsufficientData {
                    required,
                    got: returns.len(),
                });
            }
            regular_tails.push(*work.last().unwrap());
            work = difference(&work, 1);
        }

        let mut vlags: Vec<usize> = (1..=p).collect();
        let mut rlags: Vec<usize> = (1..=q).collect();
        if s > 0 {
            vlags.extend((1..=sp).map(|j| j * s));
            rlags.extend((1..=sq).map(|j| j * s));
        }

        let n = work.len();

        let (constant, ar, sar, ma, sma) = if vlags.is_empty() && rlags.is_empty() {
            // Pure differencing model: nothing to regress.
            (mean(&work), vec![], vec![], vec![], vec![])
        } else {
            // Stage 1: long AR to approximate the innovation series.
            let proxy = if rlags.is_empty() {
                vec![0.0; n]
            } else {
                let m = (p + q + seasonal_span).max(10).min(n.saturating_sub(2) / 2);
                if m == 0 {
                    return Err(ForecastError::InsufficientData {
                        required: required.max(8),
                        got: returns.len(),
                    });
                }
                let long_lags: Vec<usize> = (1..=m).collect();
                let coef = lagged_ridge_ols(&work, &[], &long_lags, &[], m)?;
                let mut e = vec![0.0; n];
                for t in 0..n {
                    let mut pred = coef[0];
                    for (i, &l) in long_lags.iter().enumerate() {
                        if t >= l {
                            pred += coef[i + 1] * work[t - l];
                        }
                    }
                    e[t] = work[t] - pred;
                }
                e
            };

            // Stage 2: the actual coefficient regression.
            let t0 = vlags
                .iter()
                .chain(rlags.iter())
                .copied()
                .max()
                .unwrap_or(0);
            let ncols = 1 + vlags.len() + rlags.len();
            if n <= t0 + ncols + 1 {
                return Err(ForecastError::InsufficientData {
                    required: t0 + ncols + 2 + d + s * sd,
                    got: returns.len(),
                });
            }

            let beta = lagged_ridge_ols(&work, &proxy, &vlags, &rlags, t0)?;

            let constant = beta[0];
            let ar: Vec<f64> = beta[1..1 + p].to_vec();
            let sar: Vec<f64> = beta[1 + p..1 + p + sp].to_vec();
            let mut ma: Vec<f64> = beta[1 + p + sp..1 + p + sp + q].to_vec();
            let mut sma: Vec<f64> = beta[1 + p + sp + q..1 + p + sp + q + sq].to_vec();

            // Invertibility: rescale the MA polynomials when the lag
            // weights sum past one, or the residual recursion blows up.
            for coeffs in [&mut ma, &mut sma] {
                let total: f64 = coeffs.iter().map(|c| c.abs()).sum();
                if total >= 0.999 {
                    let scale = 0.98 / total;
                    for c in coeffs.iter_mut() {
                        *c *= scale;
                    }
                }
            }

            (constant, ar, sar, ma, sma)
        };

        let all_finite = constant.is_finite()
            && ar.iter().all(|c| c.is_finite())
            && sar.iter().all(|c| c.is_finite())
            && ma.iter().all(|c| c.is_finite())
            && sma.iter().all(|c| c.is_finite());
        if !all_finite {
            return Err(ForecastError::ModelFit(
                "non-finite coefficients (ill-conditioned sample)".into(),
            ));
        }

        // A root of the AR polynomial on the unit circle means the
        // differenced series is still non-stationary.
        let ar_sum: f64 = ar.iter().sum();
        if (1.0 - ar_sum).abs() < 1e-6 {
            return Err(ForecastError::ModelFit(format!(
                "autoregressive unit root after differencing (sum phi = {:.6})",
                ar_sum
            )));
        }
        let sar_sum: f64 = sar.iter().sum();
        if !sar.is_empty() && (1.0 - sar_sum).abs() < 1e-6 {
            return Err(ForecastError::ModelFit(format!(
                "seasonal autoregressive unit root (sum Phi = {:.6})",
                sar_sum
            )));
        }

        let residuals = arma_residuals(&work, constant, &ar, &sar, &ma, &sma, s);
        if residuals.iter().any(|e| !e.is_finite()) {
            return Err(ForecastError::ModelFit(
                "residual recursion diverged (non-invertible moving average)".into(),
            ));
        }

        let n_f = residuals.len() as f64;
        let sigma2 = residuals.iter().map(|e| e * e).sum::<f64>() / n_f;
        let log_likelihood =
            -0.5 * n_f * (1.0 + (2.0 * PI * sigma2.max(1e-300)).ln());
        if !log_likelihood.is_finite() {
            return Err(ForecastError::ModelFit(format!(
                "log-likelihood is not finite (sigma2 = {})",
                sigma2
            )));
        }

        Ok(FittedSarima {
            order: self.order,
            seasonal: self.seasonal,
            constant,
            ar,
            sar,
            ma,
            sma,
            sigma2,
            log_likelihood,
            residuals,
            work,
            regular_tails,
            seasonal_heads,
            season: s,
        })
    }
}

impl FittedSarima {
    /// Residuals on the differenced scale, aligned to the tail of the
    /// fitting sample. Input for the volatility stage.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// H-step-ahead mean forecast on the return scale: recursive ARMA
    /// extension with zero future shocks, then inverse differencing.
    /// Deterministic given the fitted coefficients.
    pub fn forecast(&self, h: usize) -> Vec<f64> {
        let n = self.work.len();
        let mut ext = self.work.clone();
        let mut errs = self.residuals.clone();

        for _ in 0..h {
            let t = ext.len();
            let mut f = self.constant;
            for (i, &phi) in self.ar.iter().enumerate() {
                let lag = i + 1;
                if t >= lag {
                    f += phi * ext[t - lag];
                }
            }
            for (j, &phi) in self.sar.iter().enumerate() {
                let lag = (j + 1) * self.season;
                if self.season > 0 && t >= lag {
                    f += phi * ext[t - lag];
                }
            }
            for (i, &theta) in self.ma.iter().enumerate() {
                let lag = i + 1;
                if t >= lag {
                    f += theta * errs[t - lag];
                }
            }
            for (j, &theta) in self.sma.iter().enumerate() {
                let lag = (j + 1) * self.season;
                if self.season > 0 && t >= lag {
                    f += theta * errs[t - lag];
                }
            }
            ext.push(f);
            errs.push(0.0); // expected future shock
        }

        let mut cur: Vec<f64> = ext[n..].to_vec();

        // Undo regular differencing, innermost level first.
        for &tail in self.regular_tails.iter().rev() {
            let mut prev = tail;
            for v in cur.iter_mut() {
                prev += *v;
                *v = prev;
            }
        }

        // Undo seasonal differencing.
        for head in self.seasonal_heads.iter().rev() {
            let s = self.season;
            let mut out = Vec::with_capacity(cur.len());
            for (i, &x) in cur.iter().enumerate() {
                let base = if i < s { head[i] } else { out[i - s] };
                out.push(x + base);
            }
            cur = out;
        }

        cur
    }

    /// Console-report summary of the fitted specification.
    pub fn summary(&self) -> String {
        let mut out = match self.seasonal {
            Some(so) => format!(
                "SARIMA({},{},{})({},{},{})[{}] fit\n",
                self.order.p, self.order.d, self.order.q, so.p, so.d, so.q, so.s
            ),
            None => format!(
                "ARIMA({},{},{}) fit\n",
                self.order.p, self.order.d, self.order.q
            ),
        };
        out.push_str(&format!("  constant = {:.6}\n", self.constant));
        for (i, c) in self.ar.iter().enumerate() {
            out.push_str(&format!("  ar[{}]   = {:.6}\n", i + 1, c));
        }
        for (i, c) in self.ma.iter().enumerate() {
            out.push_str(&format!("  ma[{}]   = {:.6}\n", i + 1, c));
        }
        for (i, c) in self.sar.iter().enumerate() {
            out.push_str(&format!("  sar[{}]  = {:.6}\n", i + 1, c));
        }
        for (i, c) in self.sma.iter().enumerate() {
            out.push_str(&format!("  sma[{}]  = {:.6}\n", i + 1, c));
        }
        out.push_str(&format!("  sigma2  = {:.8}\n", self.sigma2));
        out.push_str(&format!("  loglik  = {:.2}", self.log_likelihood));
        out
    }
}

impl FittedMeanModel for FittedSarima {
    fn residuals(&self) -> &[f64] {
        FittedSarima::residuals(self)
    }

    fn forecast(&self, h: usize) -> Vec<f64> {
        FittedSarima::forecast(self, h)
    }
}

impl MeanModel for Sarima {
    fn fit(&self, returns: &[f64]) -> Result<Box<dyn FittedMeanModel>> {
        Ok(Box::new(Sarima::fit(self, returns)?))
    }
}
