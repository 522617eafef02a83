//! CSV loader for the estate tax band table.
//!
//! ## CSV Format
//!
//! The file is the "IHT bands - children" worksheet exported as CSV: one row
//! per country, a header row, and columns matched by **position** (header
//! names are informational only):
//!
//! | Column | Required | Notes |
//! |-----------------------|----------|-------------------------------------------------|
//! | `country` | yes | |
//! | `gdp_ratio` | yes | Revenue as a fraction of GDP, e.g. `0.0025` |
//! | `residence_allowance` | no | Leave empty when the country has no allowance |
//! | `taper_threshold` | no | Required when `residence_allowance` is set |
//! | `taper_fraction` | no | Required when `residence_allowance` is set |
//! | `threshold_N`, `rate_N` | ≥ 1 pair | Repeat per band; the first empty threshold ends the list |
//!
//! Rows may have different lengths. Completely blank rows are ignored.
//!
//! ### Example
//!
//! ```csv
//! country,gdp_ratio,residence_allowance,taper_threshold,taper_fraction,threshold_1,rate_1,threshold_2,rate_2
//! United Kingdom,0.0027,10.6,60.6,0.5,0,0,19.7,0.4
//! Flatland,0.002,,,,0,0.4
//! ```

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use estate_core::RawCountryRecord;
use thiserror::Error;

/// Errors that can occur while reading the band table.
#[derive(Debug, Error)]
pub enum CsvLoadError {
    #[error("cannot open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The underlying CSV reader failed (bad quoting, invalid UTF-8, etc.).
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),
}

/// Reads country rows from the band table.
pub struct BandTableLoader;

impl BandTableLoader {
    /// Parses country rows from any reader. Rows are returned in file order.
    ///
    /// # Errors
    ///
    /// Returns [`CsvLoadError::Parse`] if the CSV is structurally invalid.
    /// Field content is not checked here; that happens when each record is
    /// loaded into a band model.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RawCountryRecord>, CsvLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // band counts differ per country
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in csv_reader.records() {
            let row = result?;
            if row.iter().all(str::is_empty) {
                continue;
            }
            records.push(RawCountryRecord::from_cells(row.iter()));
        }

        Ok(records)
    }

    /// Convenience wrapper: open a file and delegate to [`Self::parse`].
    ///
    /// # Errors
    ///
    /// Returns [`CsvLoadError::Open`] when the file cannot be opened, or
    /// [`CsvLoadError::Parse`] when its contents are invalid.
    pub fn load_from_file(path: &Path) -> Result<Vec<RawCountryRecord>, CsvLoadError> {
        let file = File::open(path).map_err(|source| CsvLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(file)
    }
}
