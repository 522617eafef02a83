use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Threshold of the synthetic terminal band appended to every schedule.
///
/// Expressed in average-earnings multiples, so it sits far above any estate
/// value the sweep can reach.
pub const SENTINEL_THRESHOLD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBand {
    /// Lower bound of the band, as a multiple of average earnings.
    pub threshold: Decimal,
    /// Marginal rate applied between this threshold and the next one.
    pub rate: Decimal,
}

impl TaxBand {
    pub fn new(
        threshold: Decimal,
        rate: Decimal,
    ) -> Self {
        Self { threshold, rate }
    }

    pub fn is_sentinel(&self) -> bool {
        self.threshold == SENTINEL_THRESHOLD
    }
}
