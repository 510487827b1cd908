// src/pipeline.rs

use crate::band::{aggregate, ForecastBand};
use crate::config::ForecastConfig;
use crate::data::{log_returns, validate_bars, PriceBar};
use crate::error::{ForecastError, Result};
use crate::garch::{FittedGarch, Garch};
use crate::mean::{FittedSarima, Sarima};
use crate::simulate::simulate_ensemble;

/// Everything a run produces: the band plus the fitted models for
/// reporting.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub band: ForecastBand,
    pub mean_model: FittedSarima,
    pub vol_model: FittedGarch,
}

/// Run the full pipeline: series preparation, mean fit, volatility fit,
/// Monte Carlo simulation, aggregation. Stages run strictly in order,
/// each consuming the previous stage's output; any failure propagates
/// out unhandled and nothing partial is emitted.
pub fn run_forecast(bars: &[PriceBar], cfg: &ForecastConfig) -> Result<ForecastOutcome> {
    cfg.validate()?;
    validate_bars(bars)?;

    let returns = log_returns(bars)?;

    let mean_model = Sarima {
        order: cfg.mean_order,
        seasonal: cfg.seasonal_order,
    }
    .fit(&returns.values)?;
    let mean_forecast = mean_model.forecast(cfg.horizon);

    let vol_model = Garch { order: cfg.garch_order }.fit(mean_model.residuals())?;
    let variance_forecast = vol_model.forecast(cfg.horizon);

    // A negative or non-finite variance here is a defect, not a
    // forecast; simulate_ensemble re-checks but the pipeline is the
    // contract boundary.
    for (t, v) in variance_forecast.iter().enumerate() {
        if !v.is_finite() || *v < 0.0 {
            return Err(ForecastError::Validation(format!(
                "volatility model produced variance {} at step {}",
                v,
                t + 1
            )));
        }
    }

    let last = bars.last().expect("validated non-empty above");
    let anchor = last.close / cfg.price_scale;

    let ensemble = simulate_ensemble(&mean_forecast, &variance_forecast, anchor, cfg)?;
    let mut band = aggregate(&ensemble, anchor, last.date, cfg)?;

    if cfg.price_scale != 1.0 {
        for t in 0..band.len() {
            band.median[t] *= cfg.price_scale;
            band.lower[t] *= cfg.price_scale;
            band.upper[t] *= cfg.price_scale;
        }
        // Re-pin the anchor exactly; rescaling can cost one ulp.
        band.median[0] = last.close;
        band.lower[0] = last.close;
        band.upper[0] = last.close;
    }

    Ok(ForecastOutcome { band, mean_model, vol_model })
}
