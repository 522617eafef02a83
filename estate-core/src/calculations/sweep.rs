//! Estate value sweep configuration.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SENTINEL_THRESHOLD;

/// Upper bound on the number of points a single sweep may produce.
pub const MAX_SWEEP_POINTS: usize = 1_000_000;

/// Errors raised when a sweep configuration is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SweepConfigError {
    /// The sweep ceiling must be positive.
    #[error("max multiple must be positive, got {0}")]
    NonPositiveMaxMultiple(Decimal),

    /// The step between estate values must be positive.
    #[error("step size must be positive, got {0}")]
    NonPositiveStepSize(Decimal),

    /// The sweep must stay below the terminal band threshold.
    #[error("max multiple must be below the terminal band threshold, got {0}")]
    MaxMultipleAtSentinel(Decimal),

    /// The step is too small for the ceiling.
    #[error("step size {step_size} yields too many points up to {max_multiple}")]
    TooManyPoints {
        max_multiple: Decimal,
        step_size: Decimal,
    },
}

/// Range and resolution of the estate values evaluated for each country.
///
/// Values are multiples of national average earnings. The defaults match
/// the published charts: 0 to 100 in steps of 0.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Largest estate value evaluated (inclusive).
    pub max_multiple: Decimal,

    /// Distance between consecutive estate values.
    pub step_size: Decimal,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_multiple: Decimal::ONE_HUNDRED,
            step_size: Decimal::new(1, 1),
        }
    }
}

impl SweepConfig {
    pub fn new(
        max_multiple: Decimal,
        step_size: Decimal,
    ) -> Self {
        Self {
            max_multiple,
            step_size,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SweepConfigError`] if either value is not positive, the
    /// ceiling reaches the terminal band threshold, or the step is so small
    /// the sweep would exceed [`MAX_SWEEP_POINTS`].
    pub fn validate(&self) -> Result<(), SweepConfigError> {
        self.step_count().map(|_| ())
    }

    /// Returns the estate values to evaluate, in increasing order.
    ///
    /// Starts at zero and advances by `step_size`. When `step_size` does not
    /// divide `max_multiple`, the final partial step ending exactly at
    /// `max_multiple` is included.
    ///
    /// # Returns
    ///
    /// Every estate value from zero to `max_multiple` inclusive, strictly
    /// increasing.
    ///
    /// # Errors
    ///
    /// Returns [`SweepConfigError`] if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use estate_core::calculations::SweepConfig;
    ///
    /// let sweep = SweepConfig::new(dec!(1), dec!(0.3));
    ///
    /// assert_eq!(
    ///     sweep.estate_values().unwrap(),
    ///     vec![dec!(0), dec!(0.3), dec!(0.6), dec!(0.9), dec!(1)]
    /// );
    /// ```
    pub fn estate_values(&self) -> Result<Vec<Decimal>, SweepConfigError> {
        let steps = self.step_count()?;

        let mut values: Vec<Decimal> = (0..=steps)
            .map(|step| self.step_size * Decimal::from(step))
            .collect();

        if values.last().is_some_and(|last| *last < self.max_multiple) {
            values.push(self.max_multiple);
        }

        Ok(values)
    }

    /// Number of whole steps that fit under the ceiling.
    fn step_count(&self) -> Result<u64, SweepConfigError> {
        if self.max_multiple <= Decimal::ZERO {
            return Err(SweepConfigError::NonPositiveMaxMultiple(self.max_multiple));
        }
        if self.step_size <= Decimal::ZERO {
            return Err(SweepConfigError::NonPositiveStepSize(self.step_size));
        }
        if self.max_multiple >= SENTINEL_THRESHOLD {
            return Err(SweepConfigError::MaxMultipleAtSentinel(self.max_multiple));
        }

        self.max_multiple
            .checked_div(self.step_size)
            .and_then(|steps| steps.floor().to_u64())
            .filter(|steps| *steps < MAX_SWEEP_POINTS as u64)
            .ok_or(SweepConfigError::TooManyPoints {
                max_multiple: self.max_multiple,
                step_size: self.step_size,
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn default_config_is_valid() {
        let config = SweepConfig::default();

        assert_eq!(config.max_multiple, dec!(100));
        assert_eq!(config.step_size, dec!(0.1));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_max_multiple() {
        let config = SweepConfig::new(dec!(0), dec!(0.1));

        assert_eq!(
            config.validate(),
            Err(SweepConfigError::NonPositiveMaxMultiple(dec!(0)))
        );
    }

    #[test]
    fn rejects_negative_step_size() {
        let config = SweepConfig::new(dec!(100), dec!(-0.1));

        assert_eq!(
            config.validate(),
            Err(SweepConfigError::NonPositiveStepSize(dec!(-0.1)))
        );
    }

    #[test]
    fn rejects_max_multiple_at_sentinel() {
        let config = SweepConfig::new(dec!(10000), dec!(1));

        assert_eq!(
            config.validate(),
            Err(SweepConfigError::MaxMultipleAtSentinel(dec!(10000)))
        );
    }

    #[test]
    fn rejects_step_too_fine_for_range() {
        let config = SweepConfig::new(dec!(100), dec!(0.00001));

        assert_eq!(
            config.validate(),
            Err(SweepConfigError::TooManyPoints {
                max_multiple: dec!(100),
                step_size: dec!(0.00001),
            })
        );
    }

    // =========================================================================
    // estate_values
    // =========================================================================

    #[test]
    fn default_sweep_has_1001_exact_points() {
        let values = SweepConfig::default().estate_values().expect("valid");

        assert_eq!(values.len(), 1001);
        assert_eq!(values[0], dec!(0));
        assert_eq!(values[1], dec!(0.1));
        assert_eq!(values[3], dec!(0.3));
        assert_eq!(values[1000], dec!(100));
    }

    #[test]
    fn values_strictly_increasing() {
        let values = SweepConfig::new(dec!(7), dec!(0.25))
            .estate_values()
            .expect("valid");

        for pair in values.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn includes_final_partial_step() {
        let values = SweepConfig::new(dec!(10), dec!(3))
            .estate_values()
            .expect("valid");

        assert_eq!(values, vec![dec!(0), dec!(3), dec!(6), dec!(9), dec!(10)]);
    }

    #[test]
    fn step_larger_than_range_yields_endpoints() {
        let values = SweepConfig::new(dec!(2), dec!(5))
            .estate_values()
            .expect("valid");

        assert_eq!(values, vec![dec!(0), dec!(2)]);
    }
}
