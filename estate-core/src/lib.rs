pub mod calculations;
pub mod loader;
pub mod models;

pub use loader::{BandModelLoader, DataFormatError, RawCountryRecord};
pub use models::*;
