use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax owed on one swept estate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRatePoint {
    /// Estate value as a multiple of average earnings.
    pub estate_value: Decimal,
    /// Allowance deducted before the bands were applied.
    pub allowance: Decimal,
    /// Tax accumulated across all bands.
    pub tax_owed: Decimal,
    /// `tax_owed / estate_value`.
    ///
    /// `None` for a zero estate, where the rate is undefined. Such points are
    /// kept in the series but never charted.
    pub effective_rate: Option<Decimal>,
    /// Index into the country's band list of the band the walk stopped in.
    pub band_index: usize,
}
