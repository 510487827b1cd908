//! Monte Carlo price forecasting from a daily price history.
//!
//! The pipeline fits a SARIMA mean model to log returns, a GARCH model
//! to the mean model's residuals, simulates many future price paths
//! from the two forecasts, and reduces the ensemble to a median
//! trajectory with a percentile confidence band anchored at the last
//! observed price.

pub mod band;
pub mod config;
pub mod data;
pub mod error;
pub mod garch;
pub mod mean;
pub mod pipeline;
pub mod simulate;
pub mod stats;
pub mod viz;

pub use band::ForecastBand;
pub use config::{AccumulationMode, DriftOverlay, ForecastConfig};
pub use data::{log_returns, read_bars, validate_bars, PriceBar, ReturnSeries};
pub use error::{ForecastError, Result};
pub use garch::{FittedVolatilityModel, Garch, GarchOrder, VolatilityModel};
pub use mean::{FittedMeanModel, MeanModel, Sarima, SarimaOrder, SeasonalOrder};
pub use pipeline::{run_forecast, ForecastOutcome};
pub use simulate::{simulate_ensemble, SimulationEnsemble};
