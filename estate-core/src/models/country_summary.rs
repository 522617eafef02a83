use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cross-country figures extracted from one country's sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country: String,
    pub gdp_ratio: Decimal,
    /// Effective rate at the top of the sweep.
    pub max_effective_rate: Decimal,
    /// Marginal rate of the band reached at the top of the sweep.
    pub max_statutory_rate: Decimal,
}
