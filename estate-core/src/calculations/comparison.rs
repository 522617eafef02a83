//! Per-country evaluation and the cross-country comparison it folds into.

use rust_decimal::Decimal;
use tracing::info;

use crate::calculations::effective_rate::{CountrySeries, EffectiveRateCalculator};
use crate::calculations::regression::{LinearFit, RegressionError};
use crate::calculations::sweep::{SweepConfig, SweepConfigError};
use crate::models::{CountryProfile, CountrySummary};

/// What a country contributes to the comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryOutcome {
    /// Tax is levied somewhere in the swept range; the curve is charted.
    Charted(CountrySeries),
    /// The top of the sweep still sits in a zero-rate band.
    NoTaxInRange(CountrySeries),
}

impl CountryOutcome {
    pub fn series(&self) -> &CountrySeries {
        match self {
            Self::Charted(series) | Self::NoTaxInRange(series) => series,
        }
    }

    pub fn is_charted(&self) -> bool {
        matches!(self, Self::Charted(_))
    }
}

/// Sweeps one country and applies the skip rule.
///
/// # Arguments
///
/// * `profile` - The country's validated band model
/// * `sweep` - The estate values to evaluate
///
/// # Returns
///
/// [`CountryOutcome::Charted`] when tax is levied at the top of the sweep,
/// otherwise [`CountryOutcome::NoTaxInRange`]. Both carry the full series.
///
/// # Errors
///
/// Returns [`SweepConfigError`] if the sweep is invalid.
pub fn evaluate_country(
    profile: &CountryProfile,
    sweep: &SweepConfig,
) -> Result<CountryOutcome, SweepConfigError> {
    let series = EffectiveRateCalculator::new(profile).calculate(sweep)?;

    if series.has_visible_curve() {
        Ok(CountryOutcome::Charted(series))
    } else {
        info!(
            country = profile.name(),
            max_multiple = %sweep.max_multiple,
            "no estate tax within the swept range; nothing to chart"
        );
        Ok(CountryOutcome::NoTaxInRange(series))
    }
}

/// The two rate measures compared against revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMetric {
    MaxEffectiveRate,
    MaxStatutoryRate,
}

impl RateMetric {
    pub const ALL: [RateMetric; 2] = [Self::MaxEffectiveRate, Self::MaxStatutoryRate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxEffectiveRate => "max_effective_rate",
            Self::MaxStatutoryRate => "max_statutory_rate",
        }
    }

    fn of(
        &self,
        summary: &CountrySummary,
    ) -> Decimal {
        match self {
            Self::MaxEffectiveRate => summary.max_effective_rate,
            Self::MaxStatutoryRate => summary.max_statutory_rate,
        }
    }
}

/// Summaries of charted countries, in processing order, plus the names of
/// countries left off the charts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    summaries: Vec<CountrySummary>,
    excluded: Vec<String>,
}

impl Comparison {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one country's outcome in.
    pub fn record(
        &mut self,
        outcome: &CountryOutcome,
    ) {
        match outcome {
            CountryOutcome::Charted(series) => self.summaries.push(series.summary()),
            CountryOutcome::NoTaxInRange(series) => self.excluded.push(series.country.clone()),
        }
    }

    pub fn summaries(&self) -> &[CountrySummary] {
        &self.summaries
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// `(rate, gdp_ratio)` pairs for the given metric.
    pub fn points(
        &self,
        metric: RateMetric,
    ) -> Vec<(Decimal, Decimal)> {
        self.summaries
            .iter()
            .map(|summary| (metric.of(summary), summary.gdp_ratio))
            .collect()
    }

    /// Fits revenue against the given rate metric.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionError`] when fewer than two countries are charted,
    /// they all share the same rate, or the sums overflow.
    pub fn fit(
        &self,
        metric: RateMetric,
    ) -> Result<LinearFit, RegressionError> {
        LinearFit::fit(&self.points(metric))
    }
}

impl<'a> Extend<&'a CountryOutcome> for Comparison {
    fn extend<T: IntoIterator<Item = &'a CountryOutcome>>(
        &mut self,
        outcomes: T,
    ) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }
}

impl<'a> FromIterator<&'a CountryOutcome> for Comparison {
    fn from_iter<T: IntoIterator<Item = &'a CountryOutcome>>(outcomes: T) -> Self {
        let mut comparison = Self::new();
        comparison.extend(outcomes);
        comparison
    }
}
