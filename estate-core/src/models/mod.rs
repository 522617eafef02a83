mod allowance_taper;
mod country_profile;
mod country_summary;
mod effective_rate_point;
mod tax_band;

pub use allowance_taper::AllowanceTaper;
pub use country_profile::CountryProfile;
pub use country_summary::CountrySummary;
pub use effective_rate_point::EffectiveRatePoint;
pub use tax_band::{SENTINEL_THRESHOLD, TaxBand};
