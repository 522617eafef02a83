//! Band model loading.
//!
//! Turns one country's raw schedule row into a [`CountryProfile`]. The row
//! layout mirrors the source worksheet:
//!
//! | Position | Field |
//! |----------|-------|
//! | 0        | country name |
//! | 1        | estate tax revenue as a fraction of GDP |
//! | 2        | residence allowance (empty when the country has none) |
//! | 3        | taper threshold |
//! | 4        | taper fraction |
//! | 5, 6     | `threshold_1`, `rate_1` |
//! | 7, 8     | `threshold_2`, `rate_2` |
//! | ...      | repeating until the first empty threshold |
//!
//! Thresholds and allowances are multiples of national average earnings;
//! rates are fractions (`0.4`, not `40`).

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::models::{AllowanceTaper, CountryProfile, TaxBand};

/// Errors raised while turning a raw country row into a band model.
///
/// Every variant names the country and, where one is to blame, the field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataFormatError {
    #[error("{country}: missing required field '{field}'")]
    MissingField { country: String, field: String },

    #[error("{country}: field '{field}' is not a number: '{value}'")]
    InvalidNumber {
        country: String,
        field: String,
        value: String,
    },

    #[error("{country}: no tax bands found")]
    NoBands { country: String },

    #[error("{country}: '{field}' is missing for a present threshold")]
    MissingRate { country: String, field: String },

    #[error("{country}: first threshold must be 0, got {value}")]
    FirstThresholdNotZero { country: String, value: Decimal },

    #[error("{country}: '{field}' ({value}) must exceed the previous threshold ({previous})")]
    NonMonotonicThreshold {
        country: String,
        field: String,
        value: Decimal,
        previous: Decimal,
    },

    #[error("{country}: '{field}' ({value}) must be below the terminal band threshold")]
    ThresholdAtSentinel {
        country: String,
        field: String,
        value: Decimal,
    },

    #[error("{country}: '{field}' must be between 0 and 1, got {value}")]
    RateOutOfRange {
        country: String,
        field: String,
        value: Decimal,
    },

    #[error("{country}: '{field}' must be non-negative, got {value}")]
    NegativeValue {
        country: String,
        field: String,
        value: Decimal,
    },
}

impl DataFormatError {
    /// The country the error was raised for.
    pub fn country(&self) -> &str {
        match self {
            Self::MissingField { country, .. }
            | Self::InvalidNumber { country, .. }
            | Self::NoBands { country }
            | Self::MissingRate { country, .. }
            | Self::FirstThresholdNotZero { country, .. }
            | Self::NonMonotonicThreshold { country, .. }
            | Self::ThresholdAtSentinel { country, .. }
            | Self::RateOutOfRange { country, .. }
            | Self::NegativeValue { country, .. } => country,
        }
    }
}

pub(crate) fn threshold_field(index: usize) -> String {
    format!("threshold_{}", index + 1)
}

pub(crate) fn rate_field(index: usize) -> String {
    format!("rate_{}", index + 1)
}

/// One country's row, as cells. `None` marks an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCountryRecord {
    pub name: String,
    pub gdp_ratio: Option<String>,
    pub residence_allowance: Option<String>,
    pub taper_threshold: Option<String>,
    pub taper_fraction: Option<String>,
    /// Alternating threshold and rate cells, starting with `threshold_1`.
    pub band_cells: Vec<Option<String>>,
}

impl RawCountryRecord {
    /// Builds a record from positional cells laid out as in the module docs.
    /// Cells are trimmed; empty cells become `None`.
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cells = cells.into_iter().map(|cell| {
            let cell = cell.as_ref().trim();
            (!cell.is_empty()).then(|| cell.to_string())
        });

        let mut next = || cells.next().flatten();
        let name = next().unwrap_or_default();
        let gdp_ratio = next();
        let residence_allowance = next();
        let taper_threshold = next();
        let taper_fraction = next();

        Self {
            name,
            gdp_ratio,
            residence_allowance,
            taper_threshold,
            taper_fraction,
            band_cells: cells.collect(),
        }
    }
}

/// Parses a numeric cell. Accepts thousands separators and scientific
/// notation.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let normalized = input.trim().replace(',', "");
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Converts raw country rows into [`CountryProfile`]s.
pub struct BandModelLoader;

impl BandModelLoader {
    /// Loads one country.
    ///
    /// Threshold/rate pairs are read in order until the first empty threshold
    /// cell. A present threshold without a rate is an error, as is any cell
    /// that is not a number.
    ///
    /// # Errors
    ///
    /// Returns [`DataFormatError`] naming the country and the offending field.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use estate_core::{BandModelLoader, RawCountryRecord};
    ///
    /// let record = RawCountryRecord::from_cells([
    ///     "Ruritania", "0.002", "", "", "", "0", "0.1", "5", "0.3", "",
    /// ]);
    ///
    /// let profile = BandModelLoader::load(&record).unwrap();
    ///
    /// assert_eq!(profile.real_bands().len(), 2);
    /// assert_eq!(profile.bands().last().unwrap().rate, dec!(0.3));
    /// assert!(profile.taper().is_none());
    /// ```
    pub fn load(record: &RawCountryRecord) -> Result<CountryProfile, DataFormatError> {
        if record.name.is_empty() {
            return Err(DataFormatError::MissingField {
                country: "<unnamed>".to_string(),
                field: "country".to_string(),
            });
        }
        let country = record.name.as_str();

        let gdp_ratio = required(country, "gdp_ratio", record.gdp_ratio.as_deref())?;
        let bands = Self::bands(country, &record.band_cells)?;
        let taper = Self::taper(country, record)?;

        let profile = CountryProfile::new(country, gdp_ratio, bands, taper)?;

        debug!(
            country,
            bands = ?profile.bands(),
            taper = ?profile.taper(),
            "loaded band model"
        );

        Ok(profile)
    }

    fn bands(
        country: &str,
        cells: &[Option<String>],
    ) -> Result<Vec<TaxBand>, DataFormatError> {
        let mut bands = Vec::new();

        for (index, pair) in cells.chunks(2).enumerate() {
            let Some(threshold_cell) = pair[0].as_deref() else {
                break;
            };
            let threshold = number(country, &threshold_field(index), threshold_cell)?;

            let rate_cell = pair.get(1).and_then(|cell| cell.as_deref()).ok_or_else(|| {
                DataFormatError::MissingRate {
                    country: country.to_string(),
                    field: rate_field(index),
                }
            })?;
            let rate = number(country, &rate_field(index), rate_cell)?;

            bands.push(TaxBand::new(threshold, rate));
        }

        Ok(bands)
    }

    fn taper(
        country: &str,
        record: &RawCountryRecord,
    ) -> Result<Option<AllowanceTaper>, DataFormatError> {
        let Some(allowance_cell) = record.residence_allowance.as_deref() else {
            return Ok(None);
        };

        Ok(Some(AllowanceTaper {
            base_allowance: number(country, "residence_allowance", allowance_cell)?,
            taper_threshold: required(
                country,
                "taper_threshold",
                record.taper_threshold.as_deref(),
            )?,
            taper_fraction: required(
                country,
                "taper_fraction",
                record.taper_fraction.as_deref(),
            )?,
        }))
    }
}

fn required(
    country: &str,
    field: &str,
    cell: Option<&str>,
) -> Result<Decimal, DataFormatError> {
    let cell = cell.ok_or_else(|| DataFormatError::MissingField {
        country: country.to_string(),
        field: field.to_string(),
    })?;
    number(country, field, cell)
}

fn number(
    country: &str,
    field: &str,
    cell: &str,
) -> Result<Decimal, DataFormatError> {
    parse_decimal(cell).ok_or_else(|| DataFormatError::InvalidNumber {
        country: country.to_string(),
        field: field.to_string(),
        value: cell.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::SENTINEL_THRESHOLD;

    fn record(cells: &[&str]) -> RawCountryRecord {
        RawCountryRecord::from_cells(cells.iter().copied())
    }

    // =========================================================================
    // RawCountryRecord::from_cells
    // =========================================================================

    #[test]
    fn from_cells_splits_fixed_fields_and_bands() {
        let raw = record(&["UK", "0.0025", "1.1", "56", "0.5", "0", "0", "9.8", "0.4"]);

        assert_eq!(raw.name, "UK");
        assert_eq!(raw.gdp_ratio.as_deref(), Some("0.0025"));
        assert_eq!(raw.residence_allowance.as_deref(), Some("1.1"));
        assert_eq!(raw.taper_threshold.as_deref(), Some("56"));
        assert_eq!(raw.taper_fraction.as_deref(), Some("0.5"));
        assert_eq!(raw.band_cells.len(), 4);
    }

    #[test]
    fn from_cells_treats_blank_cells_as_missing() {
        let raw = record(&["France", " 0.004 ", "", "  ", "", "0", "0.05"]);

        assert_eq!(raw.gdp_ratio.as_deref(), Some("0.004"));
        assert_eq!(raw.residence_allowance, None);
        assert_eq!(raw.taper_threshold, None);
        assert_eq!(raw.band_cells, vec![Some("0".to_string()), Some("0.05".to_string())]);
    }

    #[test]
    fn from_cells_tolerates_short_rows() {
        let raw = record(&["Nowhere"]);

        assert_eq!(raw.name, "Nowhere");
        assert_eq!(raw.gdp_ratio, None);
        assert!(raw.band_cells.is_empty());
    }

    // =========================================================================
    // parse_decimal
    // =========================================================================

    #[test]
    fn parse_decimal_accepts_plain_separated_and_scientific() {
        assert_eq!(parse_decimal("0.4"), Some(dec!(0.4)));
        assert_eq!(parse_decimal(" 1,234.5 "), Some(dec!(1234.5)));
        assert_eq!(parse_decimal("2.5e-3"), Some(dec!(0.0025)));
        assert_eq!(parse_decimal("forty"), None);
    }

    // =========================================================================
    // BandModelLoader::load
    // =========================================================================

    #[test]
    fn load_reads_bands_until_first_empty_threshold() {
        let raw = record(&[
            "Testland", "0.001", "", "", "", "0", "0.1", "5", "0.3", "", "", "99", "0.9",
        ]);

        let profile = BandModelLoader::load(&raw).expect("valid row");

        assert_eq!(
            profile.bands(),
            &[
                TaxBand::new(dec!(0), dec!(0.1)),
                TaxBand::new(dec!(5), dec!(0.3)),
                TaxBand::new(SENTINEL_THRESHOLD, dec!(0.3)),
            ]
        );
        assert_eq!(profile.gdp_ratio(), dec!(0.001));
    }

    #[test]
    fn load_builds_taper_when_allowance_present() {
        let raw = record(&["UK", "0.0025", "2", "4", "0.5", "0", "0.2"]);

        let profile = BandModelLoader::load(&raw).expect("valid row");

        assert_eq!(
            profile.taper(),
            Some(&AllowanceTaper {
                base_allowance: dec!(2),
                taper_threshold: dec!(4),
                taper_fraction: dec!(0.5),
            })
        );
    }

    #[test]
    fn load_ignores_taper_fields_without_allowance() {
        let raw = record(&["Testland", "0.001", "", "4", "0.5", "0", "0.2"]);

        let profile = BandModelLoader::load(&raw).expect("valid row");

        assert_eq!(profile.taper(), None);
    }

    #[test]
    fn load_rejects_allowance_without_taper_fraction() {
        let raw = record(&["UK", "0.0025", "2", "4", "", "0", "0.2"]);

        let result = BandModelLoader::load(&raw);

        assert_eq!(
            result,
            Err(DataFormatError::MissingField {
                country: "UK".to_string(),
                field: "taper_fraction".to_string(),
            })
        );
    }

    #[test]
    fn load_rejects_row_without_bands() {
        let raw = record(&["Monaco", "0", "", "", ""]);

        let result = BandModelLoader::load(&raw);

        assert_eq!(
            result,
            Err(DataFormatError::NoBands {
                country: "Monaco".to_string()
            })
        );
    }

    #[test]
    fn load_rejects_threshold_without_rate() {
        let raw = record(&["Testland", "0.001", "", "", "", "0", "0.1", "5"]);

        let result = BandModelLoader::load(&raw);

        assert_eq!(
            result,
            Err(DataFormatError::MissingRate {
                country: "Testland".to_string(),
                field: "rate_2".to_string(),
            })
        );
    }

    #[test]
    fn load_rejects_threshold_with_empty_rate_cell() {
        let raw = record(&["Testland", "0.001", "", "", "", "0", "", "5", "0.3"]);

        let result = BandModelLoader::load(&raw);

        assert_eq!(
            result,
            Err(DataFormatError::MissingRate {
                country: "Testland".to_string(),
                field: "rate_1".to_string(),
            })
        );
    }

    #[test]
    fn load_rejects_non_numeric_rate() {
        let raw = record(&["Testland", "0.001", "", "", "", "0", "ten percent"]);

        let result = BandModelLoader::load(&raw);

        assert_eq!(
            result,
            Err(DataFormatError::InvalidNumber {
                country: "Testland".to_string(),
                field: "rate_1".to_string(),
                value: "ten percent".to_string(),
            })
        );
    }

    #[test]
    fn load_rejects_missing_gdp_ratio() {
        let raw = record(&["Testland", "", "", "", "", "0", "0.1"]);

        let err = BandModelLoader::load(&raw).expect_err("gdp ratio is required");

        assert_eq!(err.country(), "Testland");
        assert_eq!(
            err.to_string(),
            "Testland: missing required field 'gdp_ratio'"
        );
    }

    #[test]
    fn load_rejects_gdp_ratio_above_one() {
        let raw = record(&["Testland", "1e15", "", "", "", "0", "0.4"]);

        let err = BandModelLoader::load(&raw).expect_err("gdp ratio is a fraction");

        assert_eq!(
            err,
            DataFormatError::RateOutOfRange {
                country: "Testland".to_string(),
                field: "gdp_ratio".to_string(),
                value: dec!(1000000000000000),
            }
        );
    }

    #[test]
    fn load_rejects_unnamed_row() {
        let raw = record(&["", "0.001", "", "", "", "0", "0.1"]);

        let result = BandModelLoader::load(&raw);

        assert!(matches!(
            result,
            Err(DataFormatError::MissingField { ref field, .. }) if field == "country"
        ));
    }
}
