//! Runs the band table through the calculator and writes the chart data.
//!
//! Output files, written for the charting step:
//!
//! | File | Contents |
//! |------|----------|
//! | `effective_rates.csv` | One row per swept estate value of each charted country |
//! | `comparison.csv` | Per-country GDP ratio, max effective rate, max statutory rate |
//! | `excluded.csv` | Countries left off the charts, with the reason |
//! | `trends.csv` | Least-squares fits of revenue against each rate measure |

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use estate_core::calculations::{
    Comparison, CountryOutcome, LinearFit, RateMetric, RegressionError, SweepConfig,
    SweepConfigError, evaluate_country,
};
use estate_core::{BandModelLoader, DataFormatError, RawCountryRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const EFFECTIVE_RATES_FILE: &str = "effective_rates.csv";
pub const COMPARISON_FILE: &str = "comparison.csv";
pub const EXCLUDED_FILE: &str = "excluded.csv";
pub const TRENDS_FILE: &str = "trends.csv";

/// What to do when a country's row cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidCountryPolicy {
    /// Stop the run at the first malformed row.
    #[default]
    Abort,
    /// Log the row and carry on with the remaining countries.
    Skip,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid sweep: {0}")]
    Sweep(#[from] SweepConfigError),

    #[error("invalid country data: {0}")]
    Data(#[from] DataFormatError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a country is left off the charts.
#[derive(Debug, PartialEq, Eq)]
pub enum ExclusionReason {
    /// The top of the sweep still sits in a zero-rate band.
    NoTaxInRange,
    /// The row could not be loaded and the run was told to skip it.
    Malformed(DataFormatError),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ExcludedCountry {
    pub country: String,
    pub reason: ExclusionReason,
}

/// Revenue-vs-rate fit for one rate measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendFit {
    pub metric: RateMetric,
    pub fit: Result<LinearFit, RegressionError>,
}

impl TrendFit {
    /// Trend-line GDP ratio at `rate`; `None` when there is no fit.
    pub fn predict(
        &self,
        rate: Decimal,
    ) -> Option<Decimal> {
        self.fit.as_ref().ok().and_then(|fit| fit.predict(rate))
    }
}

/// Everything one run produced, in processing order.
#[derive(Debug)]
pub struct RunReport {
    pub sweep: SweepConfig,
    pub outcomes: Vec<CountryOutcome>,
    /// Countries left off the charts, in file order.
    pub excluded: Vec<ExcludedCountry>,
    pub comparison: Comparison,
    /// One fit per [`RateMetric`], in [`RateMetric::ALL`] order.
    pub trends: Vec<TrendFit>,
}

impl RunReport {
    pub fn charted(&self) -> impl Iterator<Item = &CountryOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_charted())
    }

    /// Countries dropped for malformed rows, with the error that dropped them.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &DataFormatError)> {
        self.excluded.iter().filter_map(|excluded| match &excluded.reason {
            ExclusionReason::Malformed(error) => Some((excluded.country.as_str(), error)),
            ExclusionReason::NoTaxInRange => None,
        })
    }

    pub fn trend(
        &self,
        metric: RateMetric,
    ) -> Option<&TrendFit> {
        self.trends.iter().find(|trend| trend.metric == metric)
    }
}

/// Loads and sweeps every country in order.
///
/// The sweep is validated before any country is touched.
///
/// # Errors
///
/// Returns [`RunError::Sweep`] for an unusable sweep, and
/// [`RunError::Data`] for the first malformed row under
/// [`InvalidCountryPolicy::Abort`].
pub fn run(
    records: &[RawCountryRecord],
    sweep: &SweepConfig,
    policy: InvalidCountryPolicy,
) -> Result<RunReport, RunError> {
    sweep.validate()?;

    let mut outcomes = Vec::with_capacity(records.len());
    let mut excluded = Vec::new();
    let mut comparison = Comparison::new();

    for record in records {
        let profile = match BandModelLoader::load(record) {
            Ok(profile) => profile,
            Err(error) if policy == InvalidCountryPolicy::Skip => {
                warn!(country = error.country(), %error, "skipping malformed country");
                excluded.push(ExcludedCountry {
                    country: error.country().to_string(),
                    reason: ExclusionReason::Malformed(error),
                });
                continue;
            }
            Err(error) => return Err(error.into()),
        };

        let outcome = evaluate_country(&profile, sweep)?;
        let series = outcome.series();
        debug!(
            country = %series.country,
            max_effective_rate = %series.max_effective_rate,
            max_statutory_rate = %series.max_statutory_rate,
            charted = outcome.is_charted(),
            "country evaluated"
        );

        if !outcome.is_charted() {
            excluded.push(ExcludedCountry {
                country: series.country.clone(),
                reason: ExclusionReason::NoTaxInRange,
            });
        }

        comparison.record(&outcome);
        outcomes.push(outcome);
    }

    let trends = fit_trends(&comparison, sweep);

    info!(
        countries = records.len(),
        charted = comparison.summaries().len(),
        excluded = excluded.len(),
        "run complete"
    );

    Ok(RunReport {
        sweep: sweep.clone(),
        outcomes,
        excluded,
        comparison,
        trends,
    })
}

fn fit_trends(
    comparison: &Comparison,
    sweep: &SweepConfig,
) -> Vec<TrendFit> {
    RateMetric::ALL
        .into_iter()
        .map(|metric| {
            let fit = comparison.fit(metric);
            match &fit {
                Ok(fit) => info!(
                    metric = metric.as_str(),
                    max_multiple = %sweep.max_multiple,
                    slope = %fit.slope.round_dp(6),
                    intercept = %fit.intercept.round_dp(6),
                    r_value = ?fit.r_value.map(|r| r.round_dp(4)),
                    "revenue trend"
                ),
                Err(error) => warn!(metric = metric.as_str(), %error, "no trend line"),
            }
            TrendFit { metric, fit }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct EffectiveRateRow<'a> {
    country: &'a str,
    estate_value: Decimal,
    tax_owed: Decimal,
    effective_rate: Decimal,
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct ComparisonRow<'a> {
    country: &'a str,
    gdp_ratio: Decimal,
    max_effective_rate: Decimal,
    max_statutory_rate: Decimal,
    effective_rate_trend: Option<Decimal>,
    statutory_rate_trend: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct ExcludedRow<'a> {
    country: &'a str,
    reason: String,
}

#[derive(Debug, Serialize)]
struct TrendRow {
    metric: &'static str,
    slope: Decimal,
    intercept: Decimal,
    r_value: Option<Decimal>,
    points: usize,
}

/// Writes each charted country's curve. The zero-estate point has no rate and
/// is left out; the country name labels the last point only.
pub fn write_effective_rates<W: Write>(
    report: &RunReport,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = headed_writer(
        writer,
        &["country", "estate_value", "tax_owed", "effective_rate", "label"],
    )?;

    for outcome in report.charted() {
        let series = outcome.series();
        let last = series.points.len().saturating_sub(1);

        for (index, point) in series.points.iter().enumerate() {
            let Some(effective_rate) = point.effective_rate else {
                continue;
            };
            csv_writer.serialize(EffectiveRateRow {
                country: &series.country,
                estate_value: point.estate_value.normalize(),
                tax_owed: point.tax_owed.normalize(),
                effective_rate: effective_rate.normalize(),
                label: if index == last { &series.country } else { "" },
            })?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn write_comparison<W: Write>(
    report: &RunReport,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = headed_writer(
        writer,
        &[
            "country",
            "gdp_ratio",
            "max_effective_rate",
            "max_statutory_rate",
            "effective_rate_trend",
            "statutory_rate_trend",
        ],
    )?;

    let trend_at = |metric: RateMetric, rate: Decimal| {
        report
            .trend(metric)
            .and_then(|trend| trend.predict(rate))
            .map(|value| value.normalize())
    };

    for summary in report.comparison.summaries() {
        csv_writer.serialize(ComparisonRow {
            country: &summary.country,
            gdp_ratio: summary.gdp_ratio.normalize(),
            max_effective_rate: summary.max_effective_rate.normalize(),
            max_statutory_rate: summary.max_statutory_rate.normalize(),
            effective_rate_trend: trend_at(RateMetric::MaxEffectiveRate, summary.max_effective_rate),
            statutory_rate_trend: trend_at(RateMetric::MaxStatutoryRate, summary.max_statutory_rate),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes excluded countries in file order.
pub fn write_excluded<W: Write>(
    report: &RunReport,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = headed_writer(writer, &["country", "reason"])?;

    let no_tax = format!("no tax up to {}x average earnings", report.sweep.max_multiple);
    for excluded in &report.excluded {
        let reason = match &excluded.reason {
            ExclusionReason::NoTaxInRange => no_tax.clone(),
            ExclusionReason::Malformed(error) => error.to_string(),
        };
        csv_writer.serialize(ExcludedRow {
            country: &excluded.country,
            reason,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the fits that could be computed.
pub fn write_trends<W: Write>(
    report: &RunReport,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = headed_writer(
        writer,
        &["metric", "slope", "intercept", "r_value", "points"],
    )?;

    for trend in &report.trends {
        let Ok(fit) = &trend.fit else {
            continue;
        };
        csv_writer.serialize(TrendRow {
            metric: trend.metric.as_str(),
            slope: fit.slope.normalize(),
            intercept: fit.intercept.normalize(),
            r_value: fit.r_value.map(|r| r.normalize()),
            points: fit.points,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Paths of the files written by [`write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub effective_rates: PathBuf,
    pub comparison: PathBuf,
    pub excluded: PathBuf,
    pub trends: PathBuf,
}

/// Writes all output files into `out_dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory or a file cannot be written.
pub fn write_outputs(
    report: &RunReport,
    out_dir: &Path,
) -> Result<OutputPaths, OutputError> {
    fs::create_dir_all(out_dir).map_err(|source| OutputError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let paths = OutputPaths {
        effective_rates: out_dir.join(EFFECTIVE_RATES_FILE),
        comparison: out_dir.join(COMPARISON_FILE),
        excluded: out_dir.join(EXCLUDED_FILE),
        trends: out_dir.join(TRENDS_FILE),
    };

    write_effective_rates(report, create(&paths.effective_rates)?)?;
    write_comparison(report, create(&paths.comparison)?)?;
    write_excluded(report, create(&paths.excluded)?)?;
    write_trends(report, create(&paths.trends)?)?;

    Ok(paths)
}

/// Header rows are written up front so that empty outputs still carry them.
fn headed_writer<W: Write>(
    writer: W,
    header: &[&str],
) -> Result<csv::Writer<W>, csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(header)?;
    Ok(csv_writer)
}

fn create(path: &Path) -> Result<File, OutputError> {
    File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn record(cells: &[&str]) -> RawCountryRecord {
        RawCountryRecord::from_cells(cells.iter().copied())
    }

    fn records() -> Vec<RawCountryRecord> {
        vec![
            record(&["Flatland", "0.002", "", "", "", "0", "0.4"]),
            record(&["Nilland", "0", "", "", "", "0", "0"]),
            record(&["Stepland", "0.001", "", "", "", "0", "0.1", "5", "0.3"]),
        ]
    }

    fn small_sweep() -> SweepConfig {
        SweepConfig::new(dec!(10), dec!(5))
    }

    fn to_string(write: impl FnOnce(&mut Vec<u8>) -> Result<(), csv::Error>) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer).expect("write succeeds");
        String::from_utf8(buffer).expect("utf-8 output")
    }

    // =========================================================================
    // run
    // =========================================================================

    #[test]
    fn run_evaluates_countries_in_order() {
        let report = run(&records(), &small_sweep(), InvalidCountryPolicy::Abort)
            .expect("valid run");

        let names: Vec<_> = report
            .outcomes
            .iter()
            .map(|outcome| outcome.series().country.as_str())
            .collect();
        assert_eq!(names, vec!["Flatland", "Nilland", "Stepland"]);
        assert_eq!(report.charted().count(), 2);
        assert_eq!(report.comparison.excluded(), &["Nilland".to_string()]);
    }

    #[test]
    fn run_aborts_on_malformed_country_by_default() {
        let mut rows = records();
        rows.insert(1, record(&["Brokenland", "0.001", "", "", "", "0", "lots"]));

        let result = run(&rows, &small_sweep(), InvalidCountryPolicy::Abort);

        match result {
            Err(RunError::Data(DataFormatError::InvalidNumber { country, field, .. })) => {
                assert_eq!(country, "Brokenland");
                assert_eq!(field, "rate_1");
            }
            other => panic!("expected InvalidNumber, got {other:?}"),
        }
    }

    #[test]
    fn run_skips_malformed_country_when_asked() {
        let mut rows = records();
        rows.insert(1, record(&["Brokenland", "0.001", "", "", "", "0", "0.1", "3"]));

        let report = run(&rows, &small_sweep(), InvalidCountryPolicy::Skip).expect("valid run");

        assert_eq!(report.outcomes.len(), 3);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(
            skipped,
            vec![(
                "Brokenland",
                &DataFormatError::MissingRate {
                    country: "Brokenland".to_string(),
                    field: "rate_2".to_string(),
                }
            )]
        );
    }

    #[test]
    fn run_rejects_invalid_sweep_before_loading() {
        let rows = vec![record(&["Brokenland"])];

        let result = run(&rows, &SweepConfig::new(dec!(-1), dec!(1)), InvalidCountryPolicy::Abort);

        assert!(matches!(
            result,
            Err(RunError::Sweep(SweepConfigError::NonPositiveMaxMultiple(_)))
        ));
    }

    // =========================================================================
    // Writers
    // =========================================================================

    #[test]
    fn effective_rates_skip_zero_point_and_label_last() {
        let report = run(&records(), &small_sweep(), InvalidCountryPolicy::Abort)
            .expect("valid run");

        let output = to_string(|buffer| write_effective_rates(&report, buffer));

        assert_eq!(
            output,
            "\
country,estate_value,tax_owed,effective_rate,label
Flatland,5,2,0.4,
Flatland,10,4,0.4,Flatland
Stepland,5,0.5,0.1,
Stepland,10,2,0.2,Stepland
"
        );
    }

    #[test]
    fn comparison_lists_charted_countries() {
        let report = run(&records(), &small_sweep(), InvalidCountryPolicy::Abort)
            .expect("valid run");

        let output = to_string(|buffer| write_comparison(&report, buffer));

        assert_eq!(
            output,
            "\
country,gdp_ratio,max_effective_rate,max_statutory_rate,effective_rate_trend,statutory_rate_trend
Flatland,0.002,0.4,0.4,0.002,0.002
Stepland,0.001,0.2,0.3,0.001,0.001
"
        );
    }

    #[test]
    fn excluded_countries_keep_file_order() {
        let mut rows = records();
        rows.insert(1, record(&["Brokenland", "", "", "", "", "0", "0.1"]));
        rows.push(record(&["Lastland", "0.001", "", "", "", "0", "2"]));
        let report = run(&rows, &small_sweep(), InvalidCountryPolicy::Skip).expect("valid run");

        let output = to_string(|buffer| write_excluded(&report, buffer));

        assert_eq!(
            output,
            "\
country,reason
Brokenland,Brokenland: missing required field 'gdp_ratio'
Nilland,no tax up to 10x average earnings
Lastland,Lastland: 'rate_1' must be between 0 and 1, got 2
"
        );
    }

    #[test]
    fn trends_written_for_both_metrics() {
        let report = run(&records(), &small_sweep(), InvalidCountryPolicy::Abort)
            .expect("valid run");

        let output = to_string(|buffer| write_trends(&report, buffer));

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let rows: Vec<csv::StringRecord> = reader
            .records()
            .collect::<Result<_, _>>()
            .expect("readable output");
        assert_eq!(rows.len(), 2);

        // Two points always lie on a line, so r is 1 up to sqrt rounding.
        let effective = &rows[0];
        assert_eq!(&effective[0], "max_effective_rate");
        assert_eq!(&effective[1], "0.005");
        assert_eq!(&effective[2], "0");
        assert_eq!(&effective[4], "2");

        let statutory = &rows[1];
        assert_eq!(&statutory[0], "max_statutory_rate");
        assert_eq!(&statutory[1], "0.01");
        assert_eq!(&statutory[2], "-0.002");

        for row in &rows {
            let r_value: Decimal = row[3].parse().expect("numeric r");
            assert!((r_value - Decimal::ONE).abs() < dec!(0.000001));
        }
    }

    #[test]
    fn trends_fitted_once_during_run() {
        let report = run(&records(), &small_sweep(), InvalidCountryPolicy::Abort)
            .expect("valid run");

        let metrics: Vec<_> = report.trends.iter().map(|trend| trend.metric).collect();
        assert_eq!(metrics, RateMetric::ALL.to_vec());

        let effective = report
            .trend(RateMetric::MaxEffectiveRate)
            .expect("effective trend");
        assert_eq!(effective.predict(dec!(0.4)), Some(dec!(0.002)));
        assert_eq!(
            effective.fit,
            report.comparison.fit(RateMetric::MaxEffectiveRate)
        );
    }

    #[test]
    fn trends_omitted_when_too_few_countries() {
        let rows = vec![record(&["Flatland", "0.002", "", "", "", "0", "0.4"])];
        let report = run(&rows, &small_sweep(), InvalidCountryPolicy::Abort).expect("valid run");

        let output = to_string(|buffer| write_trends(&report, buffer));

        assert_eq!(output, "metric,slope,intercept,r_value,points\n");
    }
}
