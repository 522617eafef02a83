//! Effective rate calculations.
//!
//! This module sweeps estate values through a country's band model and folds
//! the per-country results into the cross-country comparison.

pub mod comparison;
pub mod effective_rate;
pub mod regression;
pub mod sweep;

pub use comparison::{Comparison, CountryOutcome, RateMetric, evaluate_country};
pub use effective_rate::{BandWalk, CountrySeries, EffectiveRateCalculator};
pub use regression::{LinearFit, RegressionError};
pub use sweep::{MAX_SWEEP_POINTS, SweepConfig, SweepConfigError};
