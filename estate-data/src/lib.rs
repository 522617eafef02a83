pub mod config;
pub mod loader;
pub mod report;

pub use config::{ConfigError, RunConfig};
pub use loader::{BandTableLoader, CsvLoadError};
pub use report::{
    ExcludedCountry, ExclusionReason, InvalidCountryPolicy, OutputError, OutputPaths, RunError,
    RunReport, TrendFit, run, write_outputs,
};
