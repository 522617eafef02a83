use rust_decimal::Decimal;
use serde::Serialize;

use crate::loader::{DataFormatError, rate_field, threshold_field};
use crate::models::{AllowanceTaper, SENTINEL_THRESHOLD, TaxBand};

/// One country's estate tax schedule, normalized for evaluation.
///
/// The band list always ends with a synthetic band at
/// [`SENTINEL_THRESHOLD`] carrying the top real rate, so every estate value
/// the calculator can see falls strictly below some band's threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryProfile {
    name: String,
    gdp_ratio: Decimal,
    bands: Vec<TaxBand>,
    taper: Option<AllowanceTaper>,
}

impl CountryProfile {
    /// Builds a profile from the country's real bands, appending the
    /// sentinel band.
    ///
    /// # Errors
    ///
    /// Returns [`DataFormatError`] if the GDP ratio lies outside `[0, 1]`, no
    /// bands are given, the first threshold is not zero, thresholds are not strictly increasing (or reach the
    /// sentinel), a rate lies outside `[0, 1]`, or the taper carries a
    /// negative allowance or fraction.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use estate_core::{CountryProfile, TaxBand, SENTINEL_THRESHOLD};
    ///
    /// let profile = CountryProfile::new(
    ///     "Ruritania",
    ///     dec!(0.002),
    ///     vec![TaxBand::new(dec!(0), dec!(0.1)), TaxBand::new(dec!(5), dec!(0.3))],
    ///     None,
    /// )
    /// .unwrap();
    ///
    /// let last = profile.bands().last().unwrap();
    /// assert_eq!(last.threshold, SENTINEL_THRESHOLD);
    /// assert_eq!(last.rate, dec!(0.3));
    /// ```
    pub fn new(
        name: impl Into<String>,
        gdp_ratio: Decimal,
        bands: Vec<TaxBand>,
        taper: Option<AllowanceTaper>,
    ) -> Result<Self, DataFormatError> {
        let name = name.into();
        let mut bands = bands;

        if gdp_ratio < Decimal::ZERO || gdp_ratio > Decimal::ONE {
            return Err(DataFormatError::RateOutOfRange {
                country: name,
                field: "gdp_ratio".to_string(),
                value: gdp_ratio,
            });
        }

        let Some(top) = bands.last().copied() else {
            return Err(DataFormatError::NoBands { country: name });
        };

        validate_bands(&name, &bands)?;
        if let Some(taper) = &taper {
            validate_taper(&name, taper)?;
        }

        bands.push(TaxBand::new(SENTINEL_THRESHOLD, top.rate));

        Ok(Self {
            name,
            gdp_ratio,
            bands,
            taper,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Revenue from this tax as a fraction of GDP.
    pub fn gdp_ratio(&self) -> Decimal {
        self.gdp_ratio
    }

    /// All bands, including the trailing sentinel.
    pub fn bands(&self) -> &[TaxBand] {
        &self.bands
    }

    /// The bands read from the input, without the sentinel.
    pub fn real_bands(&self) -> &[TaxBand] {
        &self.bands[..self.bands.len() - 1]
    }

    pub fn taper(&self) -> Option<&AllowanceTaper> {
        self.taper.as_ref()
    }

    /// Allowance available at `estate_value`; zero when the country has no
    /// taper.
    pub fn allowance_at(
        &self,
        estate_value: Decimal,
    ) -> Decimal {
        self.taper
            .as_ref()
            .map_or(Decimal::ZERO, |taper| taper.allowance_at(estate_value))
    }
}

fn validate_bands(
    country: &str,
    bands: &[TaxBand],
) -> Result<(), DataFormatError> {
    let first = bands[0].threshold;
    if !first.is_zero() {
        return Err(DataFormatError::FirstThresholdNotZero {
            country: country.to_string(),
            value: first,
        });
    }

    for (index, band) in bands.iter().enumerate() {
        if band.rate < Decimal::ZERO || band.rate > Decimal::ONE {
            return Err(DataFormatError::RateOutOfRange {
                country: country.to_string(),
                field: rate_field(index),
                value: band.rate,
            });
        }

        if band.threshold >= SENTINEL_THRESHOLD {
            return Err(DataFormatError::ThresholdAtSentinel {
                country: country.to_string(),
                field: threshold_field(index),
                value: band.threshold,
            });
        }

        if index > 0 && band.threshold <= bands[index - 1].threshold {
            return Err(DataFormatError::NonMonotonicThreshold {
                country: country.to_string(),
                field: threshold_field(index),
                value: band.threshold,
                previous: bands[index - 1].threshold,
            });
        }
    }

    Ok(())
}

fn validate_taper(
    country: &str,
    taper: &AllowanceTaper,
) -> Result<(), DataFormatError> {
    let checks = [
        ("residence_allowance", taper.base_allowance),
        ("taper_fraction", taper.taper_fraction),
    ];

    for (field, value) in checks {
        if value < Decimal::ZERO {
            return Err(DataFormatError::NegativeValue {
                country: country.to_string(),
                field: field.to_string(),
                value,
            });
        }
    }

    Ok(())
}
