// src/garch.rs

use crate::error::{ForecastError, Result};
use crate::stats::{mean, variance};

/// GARCH order: `p` conditional-variance lags, `q` squared-residual lags.
#[derive(Debug, Copy, Clone)]
pub struct GarchOrder {
    pub p: usize,
    pub q: usize,
}

/// A fitted conditional-variance model: deterministic H-step variance
/// forecast, all values finite and non-negative.
pub trait FittedVolatilityModel {
    fn forecast(&self, h: usize) -> Vec<f64>;
}

/// Volatility-model estimator, substitutable behind
/// [`FittedVolatilityModel`].
pub trait VolatilityModel {
    fn fit(&self, residuals: &[f64]) -> Result<Box<dyn FittedVolatilityModel>>;
}

/// GARCH specification to fit on mean-model residuals.
#[derive(Debug, Copy, Clone)]
pub struct Garch {
    pub order: GarchOrder,
}

/// Fitted GARCH model.
#[derive(Debug, Clone)]
pub struct FittedGarch {
    pub order: GarchOrder,
    pub omega: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    pub log_likelihood: f64,
    last_sigma2: f64,
    last_resid_sq: f64,
    unconditional: f64,
}

/// Floor for conditional variances during the likelihood recursion.
const VAR_FLOOR: f64 = 1e-12;

/// Conditional-variance recursion; pre-sample lags use the
/// unconditional variance.
fn conditional_variance(
    residuals: &[f64],
    omega: f64,
    alpha: &[f64],
    beta: &[f64],
    unconditional: f64,
) -> Vec<f64> {
    let n = residuals.len();
    let mut sigma2 = vec![unconditional; n];

    for t in 1..n {
        let mut var = omega;

        // ARCH terms
        for (i, &a) in alpha.iter().enumerate() {
            if t > i {
                var += a * residuals[t - 1 - i].powi(2);
            } else {
                var += a * unconditional;
            }
        }

        // GARCH terms
        for (i, &b) in beta.iter().enumerate() {
            if t > i {
                var += b * sigma2[t - 1 - i];
            } else {
                var += b * unconditional;
            }
        }

        sigma2[t] = var.max(VAR_FLOOR);
    }

    sigma2
}

/// Gaussian log-likelihood of the residuals under the variance path.
fn log_likelihood(residuals: &[f64], sigma2: &[f64]) -> f64 {
    let n = residuals.len();
    let mut ll = 0.0;
    for t in 0..n {
        let s2 = sigma2[t].max(VAR_FLOOR);
        ll -= 0.5 * (s2.ln() + residuals[t].powi(2) / s2);
    }
    ll -= 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
    ll
}

impl Garch {
    /// Fit by maximum likelihood with numerical gradients. The
    /// stationarity constraint (sum alpha + sum beta < 1) is enforced
    /// by rescaling during the ascent; a non-finite likelihood is a
    /// fatal fit failure.
    pub fn fit(&self, residuals: &[f64]) -> Result<FittedGarch> {
        let GarchOrder { p, q } = self.order;
        let n = residuals.len();
        let required = p.max(q) + 20;
        if n < required {
            return Err(ForecastError::InsufficientData { required, got: n });
        }
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(ForecastError::ModelFit(
                "residual series contains non-finite values".into(),
            ));
        }

        let mu = mean(residuals);
        let eps: Vec<f64> = residuals.iter().map(|r| r - mu).collect();
        let unconditional = variance(&eps).max(VAR_FLOOR);

        let mut omega = (0.1 * unconditional).max(VAR_FLOOR);
        let mut alpha = vec![0.1 / q.max(1) as f64; q];
        let mut beta = vec![0.8 / p.max(1) as f64; p];

        // Gradient ascent on the mean log-likelihood.
        let learning_rate = 0.001;
        let max_iter = 500;
        let tol = 1e-8;
        let grad_eps = 1e-6;
        let n_f = n as f64;

        let mut prev_ll = f64::NEG_INFINITY;

        for _ in 0..max_iter {
            let sigma2 = conditional_variance(&eps, omega, &alpha, &beta, unconditional);
            let ll = log_likelihood(&eps, &sigma2) / n_f;

            if !ll.is_finite() {
                return Err(ForecastError::ModelFit(format!(
                    "GARCH({},{}) likelihood became non-finite during optimization",
                    p, q
                )));
            }
            if (ll - prev_ll).abs() < tol {
                break;
            }
            prev_ll = ll;

            // omega gradient
            let step = grad_eps * unconditional.max(1e-8);
            let s2 = conditional_variance(&eps, omega + step, &alpha, &beta, unconditional);
            let grad = (log_likelihood(&eps, &s2) / n_f - ll) / step;
            omega = (omega + learning_rate * grad * unconditional).max(VAR_FLOOR);

            // alpha gradients
            for i in 0..q {
                let mut bumped = alpha.clone();
                bumped[i] += grad_eps;
                let s2 = conditional_variance(&eps, omega, &bumped, &beta, unconditional);
                let grad = (log_likelihood(&eps, &s2) / n_f - ll) / grad_eps;
                alpha[i] = (alpha[i] + learning_rate * grad).clamp(0.0, 0.99);
            }

            // beta gradients
            for i in 0..p {
                let mut bumped = beta.clone();
                bumped[i] += grad_eps;
                let s2 = conditional_variance(&eps, omega, &alpha, &bumped, unconditional);
                let grad = (log_likelihood(&eps, &s2) / n_f - ll) / grad_eps;
                beta[i] = (beta[i] + learning_rate * grad).clamp(0.0, 0.99);
            }

            // Keep the process covariance-stationary.
            let persistence: f64 = alpha.iter().sum::<f64>() + beta.iter().sum::<f64>();
            if persistence >= 0.999 {
                let scale = 0.99 / persistence;
                for a in &mut alpha {
                    *a *= scale;
                }
                for b in &mut beta {
                    *b *= scale;
                }
            }
        }

        let sigma2 = conditional_variance(&eps, omega, &alpha, &beta, unconditional);
        let ll = log_likelihood(&eps, &sigma2);
        if !ll.is_finite()
            || !omega.is_finite()
            || alpha.iter().any(|a| !a.is_finite())
            || beta.iter().any(|b| !b.is_finite())
        {
            return Err(ForecastError::ModelFit(format!(
                "GARCH({},{}) optimization did not converge to finite parameters",
                p, q
            )));
        }

        Ok(FittedGarch {
            order: self.order,
            omega,
            alpha,
            beta,
            log_likelihood: ll,
            last_sigma2: *sigma2.last().unwrap_or(&unconditional),
            last_resid_sq: eps.last().map(|e| e * e).unwrap_or(unconditional),
            unconditional,
        })
    }
}

impl FittedGarch {
    /// Sum alpha + sum beta; < 1 means shocks decay to the long-run
    /// variance.
    pub fn persistence(&self) -> f64 {
        self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
    }

    /// H-step-ahead conditional variances: one GARCH step from the last
    /// observed state, then geometric decay toward the long-run level.
    pub fn forecast(&self, h: usize) -> Vec<f64> {
        let persistence = self.persistence();
        let long_run = if persistence < 1.0 {
            self.omega / (1.0 - persistence)
        } else {
            self.unconditional
        };

        let first = self.omega
            + self.alpha.iter().sum::<f64>() * self.last_resid_sq
            + self.beta.iter().sum::<f64>() * self.last_sigma2;

        let mut out = Vec::with_capacity(h);
        for step in 0..h {
            let v = if step == 0 {
                first
            } else {
                long_run + persistence.powi(step as i32) * (first - long_run)
            };
            out.push(v.max(0.0));
        }
        out
    }

    /// Console-report summary of the fitted specification.
    pub fn summary(&self) -> String {
        let mut out = format!("GARCH({},{}) fit\n", self.order.p, self.order.q);
        out.push_str(&format!("  omega   = {:.8}\n", self.omega));
        for (i, a) in self.alpha.iter().enumerate() {
            out.push_str(&format!("  alpha[{}] = {:.6}\n", i + 1, a));
        }
        for (i, b) in self.beta.iter().enumerate() {
            out.push_str(&format!("  beta[{}]  = {:.6}\n", i + 1, b));
        }
        out.push_str(&format!("  persistence = {:.4}\n", self.persistence()));
        out.push_str(&format!("  loglik  = {:.2}", self.log_likelihood));
        out
    }
}

impl FittedVolatilityModel for FittedGarch {
    fn forecast(&self, h: usize) -> Vec<f64> {
        FittedGarch::forecast(self, h)
    }
}

impl VolatilityModel for Garch {
    fn fit(&self, residuals: &[f64]) -> Result<Box<dyn FittedVolatilityModel>> {
        Ok(Box::new(Garch::fit(self, residuals)?))
    }
}
