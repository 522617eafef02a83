//! Effective estate tax rate calculations.
//!
//! For each swept estate value the calculator:
//!
//! 1. works out the allowance still available after tapering,
//! 2. deducts it from the estate (the result may be negative),
//! 3. walks the band list, filling each band completely until the band the
//!    remaining value stops in, which is filled only partially,
//! 4. divides the tax by the estate value.
//!
//! A zero estate has no effective rate; its point carries `None`.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use estate_core::calculations::{EffectiveRateCalculator, SweepConfig};
//! use estate_core::{CountryProfile, TaxBand};
//!
//! let profile = CountryProfile::new(
//!     "Ruritania",
//!     dec!(0.002),
//!     vec![TaxBand::new(dec!(0), dec!(0.1)), TaxBand::new(dec!(5), dec!(0.3))],
//!     None,
//! )
//! .unwrap();
//!
//! let calculator = EffectiveRateCalculator::new(&profile);
//! let point = calculator.point_at(dec!(8));
//!
//! assert_eq!(point.tax_owed, dec!(1.4));
//! assert_eq!(point.effective_rate, Some(dec!(0.175)));
//!
//! let series = calculator.calculate(&SweepConfig::new(dec!(10), dec!(1))).unwrap();
//! assert_eq!(series.points.len(), 11);
//! assert_eq!(series.max_statutory_rate, dec!(0.3));
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::calculations::sweep::{SweepConfig, SweepConfigError};
use crate::models::{CountryProfile, CountrySummary, EffectiveRatePoint};

/// Result of walking the band list for one taxable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandWalk {
    pub tax_owed: Decimal,
    /// Index of the band the walk stopped in.
    pub band_index: usize,
}

/// One country's swept effective-rate curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountrySeries {
    pub country: String,
    pub gdp_ratio: Decimal,
    pub points: Vec<EffectiveRatePoint>,
    /// Effective rate at the top of the sweep.
    pub max_effective_rate: Decimal,
    /// Marginal rate of the band reached at the top of the sweep.
    pub max_statutory_rate: Decimal,
}

impl CountrySeries {
    /// False when the top of the sweep still sits in a zero-rate band, i.e.
    /// the country levies nothing anywhere in the range.
    pub fn has_visible_curve(&self) -> bool {
        !self.max_statutory_rate.is_zero()
    }

    /// `(estate_value, effective_rate)` pairs for charting, skipping the
    /// undefined zero-estate point.
    pub fn chart_points(&self) -> impl Iterator<Item = (Decimal, Decimal)> + '_ {
        self.points
            .iter()
            .filter_map(|point| point.effective_rate.map(|rate| (point.estate_value, rate)))
    }

    pub fn summary(&self) -> CountrySummary {
        CountrySummary {
            country: self.country.clone(),
            gdp_ratio: self.gdp_ratio,
            max_effective_rate: self.max_effective_rate,
            max_statutory_rate: self.max_statutory_rate,
        }
    }
}

/// Evaluates one country's band model over estate values.
#[derive(Debug, Clone)]
pub struct EffectiveRateCalculator<'a> {
    profile: &'a CountryProfile,
}

impl<'a> EffectiveRateCalculator<'a> {
    pub fn new(profile: &'a CountryProfile) -> Self {
        Self { profile }
    }

    /// Evaluates every estate value in the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`SweepConfigError`] if the sweep is invalid; nothing is
    /// computed in that case.
    pub fn calculate(
        &self,
        sweep: &SweepConfig,
    ) -> Result<CountrySeries, SweepConfigError> {
        let points: Vec<EffectiveRatePoint> = sweep
            .estate_values()?
            .into_iter()
            .map(|estate_value| self.point_at(estate_value))
            .collect();

        // A valid sweep always ends at a positive estate value.
        let (max_effective_rate, top_band) = points
            .last()
            .map(|last| (last.effective_rate.unwrap_or(Decimal::ZERO), last.band_index))
            .unwrap_or_default();
        let max_statutory_rate = self.profile.bands()[top_band].rate;

        debug!(
            country = self.profile.name(),
            points = points.len(),
            %max_effective_rate,
            %max_statutory_rate,
            "swept effective rates"
        );

        Ok(CountrySeries {
            country: self.profile.name().to_string(),
            gdp_ratio: self.profile.gdp_ratio(),
            points,
            max_effective_rate,
            max_statutory_rate,
        })
    }

    /// Evaluates a single estate value.
    ///
    /// # Arguments
    ///
    /// * `estate_value` - Estate value as a multiple of average earnings
    ///
    /// # Returns
    ///
    /// The allowance, tax owed, effective rate and the band the walk stopped
    /// in. The effective rate is `None` for a zero estate.
    pub fn point_at(
        &self,
        estate_value: Decimal,
    ) -> EffectiveRatePoint {
        let allowance = self.profile.allowance_at(estate_value);
        let walk = self.walk_bands(estate_value - allowance);

        let effective_rate =
            (!estate_value.is_zero()).then(|| walk.tax_owed / estate_value);

        EffectiveRatePoint {
            estate_value,
            allowance,
            tax_owed: walk.tax_owed,
            effective_rate,
            band_index: walk.band_index,
        }
    }

    /// Tax owed on an estate of `estate_value`, after the allowance.
    pub fn tax_owed(
        &self,
        estate_value: Decimal,
    ) -> Decimal {
        self.point_at(estate_value).tax_owed
    }

    /// Accumulates tax band by band on `taxable_value`.
    ///
    /// Bands below the value are filled completely; the band containing the
    /// value is filled up to it. A negative value (allowance larger than the
    /// estate) contributes nothing.
    ///
    /// # Arguments
    ///
    /// * `taxable_value` - Estate value less the allowance; may be negative
    ///
    /// # Returns
    ///
    /// The accumulated tax and the index of the band containing the value.
    pub fn walk_bands(
        &self,
        taxable_value: Decimal,
    ) -> BandWalk {
        let bands = self.profile.bands();
        let mut tax_owed = Decimal::ZERO;

        for (band_index, pair) in bands.windows(2).enumerate() {
            let (band, next) = (pair[0], pair[1]);

            if taxable_value >= next.threshold {
                tax_owed += band.rate * (next.threshold - band.threshold);
            } else {
                let filled = (taxable_value - band.threshold).max(Decimal::ZERO);
                tax_owed += band.rate * filled;
                return BandWalk {
                    tax_owed,
                    band_index,
                };
            }
        }

        // Past the sentinel the top rate keeps applying.
        let band_index = bands.len() - 1;
        let sentinel = bands[band_index];
        tax_owed += sentinel.rate * (taxable_value - sentinel.threshold);

        BandWalk {
            tax_owed,
            band_index,
        }
    }
}
