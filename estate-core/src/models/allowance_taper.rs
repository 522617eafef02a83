use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An allowance exempted from tax before the bands apply, withdrawn
/// gradually once the estate grows past a threshold.
///
/// Modelled on the UK residence nil-rate band: the full allowance is
/// available up to `taper_threshold`, then shrinks by `taper_fraction` for
/// every unit of estate value above it, never going below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceTaper {
    pub base_allowance: Decimal,
    pub taper_threshold: Decimal,
    pub taper_fraction: Decimal,
}

impl AllowanceTaper {
    /// Returns the allowance available to an estate of `estate_value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use estate_core::AllowanceTaper;
    ///
    /// let taper = AllowanceTaper {
    ///     base_allowance: dec!(2),
    ///     taper_threshold: dec!(4),
    ///     taper_fraction: dec!(0.5),
    /// };
    ///
    /// assert_eq!(taper.allowance_at(dec!(3)), dec!(2));
    /// assert_eq!(taper.allowance_at(dec!(6)), dec!(1));
    /// assert_eq!(taper.allowance_at(dec!(10)), dec!(0));
    /// ```
    pub fn allowance_at(
        &self,
        estate_value: Decimal,
    ) -> Decimal {
        let excess = (estate_value - self.taper_threshold).max(Decimal::ZERO);
        (self.base_allowance - self.taper_fraction * excess).max(Decimal::ZERO)
    }
}
