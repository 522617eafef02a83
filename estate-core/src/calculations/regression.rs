//! Ordinary least-squares line fitting for the cross-country comparisons.

use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RegressionError {
    #[error("at least two points are needed for a fit, got {0}")]
    TooFewPoints(usize),

    #[error("all x values are equal; slope is undefined")]
    ConstantX,

    #[error("fit overflowed the decimal range")]
    Overflow,
}

/// A fitted line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinearFit {
    pub slope: Decimal,
    pub intercept: Decimal,
    /// Pearson correlation coefficient; `None` when every y is equal.
    pub r_value: Option<Decimal>,
    pub points: usize,
}

impl LinearFit {
    /// Fits a line through `(x, y)` points by least squares.
    ///
    /// # Arguments
    ///
    /// * `points` - The `(x, y)` pairs, in any order
    ///
    /// # Returns
    ///
    /// The fitted slope and intercept, the correlation coefficient, and the
    /// number of points used.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionError`] for fewer than two points, when every x
    /// is the same, or when an intermediate sum leaves the decimal range.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use estate_core::calculations::LinearFit;
    ///
    /// let fit = LinearFit::fit(&[(dec!(0), dec!(1)), (dec!(2), dec!(5))]).unwrap();
    ///
    /// assert_eq!(fit.slope, dec!(2));
    /// assert_eq!(fit.intercept, dec!(1));
    /// ```
    pub fn fit(points: &[(Decimal, Decimal)]) -> Result<Self, RegressionError> {
        if points.len() < 2 {
            return Err(RegressionError::TooFewPoints(points.len()));
        }

        let n = Decimal::from(points.len());
        let (sum_x, sum_y) = points
            .iter()
            .try_fold((Decimal::ZERO, Decimal::ZERO), |(sum_x, sum_y), (x, y)| {
                Some((sum_x.checked_add(*x)?, sum_y.checked_add(*y)?))
            })
            .ok_or(RegressionError::Overflow)?;
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;

        let (sxx, sxy, syy) = points
            .iter()
            .try_fold(
                (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
                |(sxx, sxy, syy), (x, y)| {
                    let dx = x.checked_sub(mean_x)?;
                    let dy = y.checked_sub(mean_y)?;
                    Some((
                        sxx.checked_add(dx.checked_mul(dx)?)?,
                        sxy.checked_add(dx.checked_mul(dy)?)?,
                        syy.checked_add(dy.checked_mul(dy)?)?,
                    ))
                },
            )
            .ok_or(RegressionError::Overflow)?;

        if sxx.is_zero() {
            return Err(RegressionError::ConstantX);
        }

        let slope = sxy.checked_div(sxx).ok_or(RegressionError::Overflow)?;
        let intercept = slope
            .checked_mul(mean_x)
            .and_then(|offset| mean_y.checked_sub(offset))
            .ok_or(RegressionError::Overflow)?;
        let r_value = sxx
            .checked_mul(syy)
            .and_then(|product| product.sqrt())
            .filter(|denominator| !denominator.is_zero())
            .and_then(|denominator| sxy.checked_div(denominator));

        Ok(Self {
            slope,
            intercept,
            r_value,
            points: points.len(),
        })
    }

    /// Evaluates the trend line at `x`.
    ///
    /// # Arguments
    ///
    /// * `x` - The rate to evaluate at
    ///
    /// # Returns
    ///
    /// `intercept + slope * x`, or `None` if that leaves the decimal range.
    pub fn predict(
        &self,
        x: Decimal,
    ) -> Option<Decimal> {
        self.slope
            .checked_mul(x)
            .and_then(|rise| self.intercept.checked_add(rise))
    }
}
