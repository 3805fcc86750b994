//! PRV export: turns raw ensemble-forecast artifacts into the tabular
//! probabilistic product consumed downstream.
//!
//! For every target date the analog values form an empirical distribution;
//! the export interpolates each requested frequency from the sorted values
//! and writes one semicolon-delimited row per target date. The file format
//! is fixed by the consumer: CRLF line endings, a `#` comment header, three
//! structured header rows, then the data rows.

use crate::actions::{PostAction, RunMetadata};
use crate::config::Options;
use crate::dataset::{
    cumulative_frequencies, interpolate_quantile, mjd_to_datetime, EnsembleForecast,
};
use crate::discovery;
use crate::error::{HydrocastError, Result};
use crate::io;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

const DEFAULT_FREQUENCIES: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95];

/// Reader turning one artifact into an [`EnsembleForecast`]. The default
/// reads the JSON serialization; a binary NetCDF reader slots in here.
pub type DatasetReader = fn(&Path) -> Result<EnsembleForecast>;

#[derive(Debug)]
pub struct ExportPrv {
    name: String,
    output_dir: PathBuf,
    frequencies: Vec<f64>,
    combine_stations_in_one_file: bool,
    reader: DatasetReader,
    file_paths: Vec<PathBuf>,
    metadata: Option<RunMetadata>,
}

impl ExportPrv {
    pub fn new(name: &str, options: &Options) -> Result<Self> {
        let output_dir = PathBuf::from(options.req_str("output_dir")?);
        let frequencies = options
            .opt_f64_list("frequencies")?
            .unwrap_or_else(|| DEFAULT_FREQUENCIES.to_vec());
        for f in &frequencies {
            if !(0.0..=1.0).contains(f) {
                return Err(HydrocastError::Config(format!(
                    "frequency {f} is outside [0, 1]"
                )));
            }
        }
        let combine = options
            .opt_bool("combine_stations_in_one_file")?
            .unwrap_or(true);
        Ok(Self {
            name: name.to_string(),
            output_dir,
            frequencies,
            combine_stations_in_one_file: combine,
            reader: crate::dataset::read_json_forecast,
            file_paths: Vec::new(),
            metadata: None,
        })
    }

    /// Swap the artifact reader (e.g. for a NetCDF-backed one).
    pub fn with_reader(mut self, reader: DatasetReader) -> Self {
        self.reader = reader;
        self
    }

    // -----------------------------------------------------------------------
    // One artifact
    // -----------------------------------------------------------------------

    fn export_artifact(&self, file: &Path, metadata: &RunMetadata) -> Result<()> {
        let forecast = (self.reader)(file)?;
        let target_dates: Vec<NaiveDateTime> = forecast
            .target_dates
            .iter()
            .map(|&mjd| mjd_to_datetime(mjd))
            .collect();
        let date_format = date_label_format(&target_dates);

        let out_dir = discovery::ensure_date_dir(&self.output_dir, &metadata.forecast_date)?;

        if self.combine_stations_in_one_file {
            let stations: Vec<usize> = (0..forecast.station_ids.len()).collect();
            let content = self.render(&forecast, &stations, &target_dates, date_format)?;
            let path = out_dir.join(export_file_name(file, None));
            io::atomic_write(&path, content.as_bytes())?;
        } else {
            for (i, station_id) in forecast.station_ids.iter().enumerate() {
                let content = self.render(&forecast, &[i], &target_dates, date_format)?;
                let path = out_dir.join(export_file_name(file, Some(*station_id)));
                io::atomic_write(&path, content.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Header comments + header rows + data rows, CRLF-terminated.
    fn render(
        &self,
        forecast: &EnsembleForecast,
        stations: &[usize],
        target_dates: &[NaiveDateTime],
        date_format: &'static str,
    ) -> Result<String> {
        let mut lines = self.header_comments(forecast);
        lines.extend(self.header_rows(forecast, stations));

        for (i_target, date) in target_dates.iter().enumerate() {
            let mut row = date.format(date_format).to_string();
            for &i_station in stations {
                let mut values = forecast.analog_slice(i_station, i_target).to_vec();
                if values.is_empty() {
                    return Err(HydrocastError::Dataset(format!(
                        "no analog values for station {} at target date {date}",
                        forecast.station_ids[i_station]
                    )));
                }
                values.sort_by(|a, b| a.total_cmp(b));
                let axis = cumulative_frequencies(values.len());
                for &freq in &self.frequencies {
                    let value = interpolate_quantile(&axis, &values, freq);
                    row.push_str(&format!(";{value:.2}"));
                }
            }
            lines.push(row);
        }

        // fixed consumer contract: CRLF, trailing newline
        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        Ok(out)
    }

    fn header_comments(&self, forecast: &EnsembleForecast) -> Vec<String> {
        let freqs: Vec<String> = self
            .frequencies
            .iter()
            .map(|f| format!("{}", (100.0 * f).round() as i64))
            .collect();
        vec![
            "# hydrocast prv export".to_string(),
            format!("# origin;{}", forecast.origin),
            format!("# creation_date;{}", forecast.creation_date),
            format!("# method_id;{}", forecast.method_id),
            format!("# specific_tag;{}", forecast.specific_tag),
            format!("# dataset_id;{}", forecast.dataset_id),
            format!("# freqs;{}", freqs.join(";")),
        ]
    }

    /// The three structured header rows: station ids (one column per
    /// station × frequency), the constant variable tag, and series ids
    /// built from method/tag/frequency.
    fn header_rows(&self, forecast: &EnsembleForecast, stations: &[usize]) -> Vec<String> {
        let mut station_row = String::from("Stations");
        let mut element_row = String::from("Grandeur");
        let mut series_row = String::from("IdSeries");
        for &i_station in stations {
            let id = forecast.station_ids[i_station];
            for freq in &self.frequencies {
                station_row.push_str(&format!(";{id}"));
                element_row.push_str(";RR");
                series_row.push_str(&format!(
                    ";{}.{}.{:03}",
                    forecast.method_id,
                    forecast.specific_tag,
                    (100.0 * freq).round() as i64
                ));
            }
        }
        vec![station_row, element_row, series_row]
    }
}

impl PostAction for ExportPrv {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "prv export"
    }

    fn feed(&mut self, files: &[PathBuf], metadata: &RunMetadata) {
        self.file_paths = files.to_vec();
        self.metadata = Some(metadata.clone());
    }

    /// Best-effort over the artifact list: a missing or malformed artifact
    /// is logged and skipped, the rest of the batch is still exported.
    /// Returns `Ok(false)` when any artifact was skipped.
    fn run(&mut self) -> Result<bool> {
        if self.file_paths.is_empty() {
            return Ok(true);
        }
        let Some(metadata) = self.metadata.clone() else {
            return Err(HydrocastError::Config(
                "export run without feed".to_string(),
            ));
        };
        let mut all_ok = true;
        for file in &self.file_paths {
            if let Err(e) = self.export_artifact(file, &metadata) {
                tracing::warn!(file = %file.display(), error = %e, "skipping artifact");
                all_ok = false;
            }
        }
        Ok(all_ok)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Minute precision when the artifact's target-date spacing is under a day,
/// date-only otherwise; derived from the first two dates, not assumed.
fn date_label_format(target_dates: &[NaiveDateTime]) -> &'static str {
    match target_dates {
        [first, second, ..] if (*second - *first) < chrono::Duration::hours(24) => {
            "%Y-%m-%d %H:%M"
        }
        _ => "%Y-%m-%d",
    }
}

/// `{artifact stem}.csv`, with the station id appended in per-station mode.
fn export_file_name(source: &Path, station_id: Option<i64>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    match station_id {
        Some(id) => format!("{stem}_{id}.csv"),
        None => format!("{stem}.csv"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
