//! Read-only view over one ensemble-forecast artifact and the
//! order-statistics helpers the PRV export builds on.

use crate::error::{HydrocastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// EnsembleForecast
// ---------------------------------------------------------------------------

/// One forecast artifact: per target date, a variable-length set of analog
/// values for each station, flattened in target-date order.
///
/// Field names follow the artifact read contract; the values for target
/// date `i` occupy the contiguous slice starting at the cumulative sum of
/// the preceding `analogs_nb` counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub origin: String,
    pub creation_date: String,
    pub method_id: String,
    pub specific_tag: String,
    #[serde(rename = "predictand_dataset_id")]
    pub dataset_id: String,
    pub station_ids: Vec<i64>,
    /// Target dates as Modified Julian Day values.
    pub target_dates: Vec<f64>,
    pub analogs_nb: Vec<usize>,
    /// `analog_values_raw[station]` is the flattened analog array for that
    /// station, `sum(analogs_nb)` values long.
    #[serde(rename = "analog_values_raw")]
    pub analog_values: Vec<Vec<f64>>,
}

impl EnsembleForecast {
    pub fn validate(&self) -> Result<()> {
        if self.analogs_nb.len() != self.target_dates.len() {
            return Err(HydrocastError::Dataset(format!(
                "analogs_nb has {} entries for {} target dates",
                self.analogs_nb.len(),
                self.target_dates.len()
            )));
        }
        if self.analog_values.len() != self.station_ids.len() {
            return Err(HydrocastError::Dataset(format!(
                "analog values cover {} stations, expected {}",
                self.analog_values.len(),
                self.station_ids.len()
            )));
        }
        let total: usize = self.analogs_nb.iter().sum();
        for (i, values) in self.analog_values.iter().enumerate() {
            if values.len() != total {
                return Err(HydrocastError::Dataset(format!(
                    "station {} has {} analog values, expected {total}",
                    self.station_ids[i],
                    values.len()
                )));
            }
        }
        Ok(())
    }

    /// The contiguous analog slice for (`station_index`, `target_index`).
    pub fn analog_slice(&self, station_index: usize, target_index: usize) -> &[f64] {
        let start: usize = self.analogs_nb[..target_index].iter().sum();
        let end = start + self.analogs_nb[target_index];
        &self.analog_values[station_index][start..end]
    }

    pub fn station_index(&self, station_id: i64) -> Option<usize> {
        self.station_ids.iter().position(|&id| id == station_id)
    }
}

/// Read an artifact serialized as JSON (the reader wired in by default; the
/// exporter accepts any reader with this signature, which is where a
/// NetCDF-backed one plugs in).
pub fn read_json_forecast(path: &Path) -> Result<EnsembleForecast> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        HydrocastError::Dataset(format!("cannot read {}: {e}", path.display()))
    })?;
    let forecast: EnsembleForecast = serde_json::from_str(&data).map_err(|e| {
        HydrocastError::Dataset(format!("cannot parse {}: {e}", path.display()))
    })?;
    forecast.validate()?;
    Ok(forecast)
}

// ---------------------------------------------------------------------------
// Time axis
// ---------------------------------------------------------------------------

/// Convert a Modified Julian Day value to a calendar timestamp.
/// The MJD epoch is 1858-11-17 00:00 UTC; the fractional part carries the
/// time of day.
pub fn mjd_to_datetime(mjd: f64) -> NaiveDateTime {
    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)
        .expect("valid epoch")
        .and_hms_opt(0, 0, 0)
        .expect("valid epoch time");
    let days = mjd.floor();
    let seconds = ((mjd - days) * 86_400.0).round() as i64;
    epoch + Duration::days(days as i64) + Duration::seconds(seconds)
}

// ---------------------------------------------------------------------------
// Order statistics
// ---------------------------------------------------------------------------

/// Empirical cumulative-frequency axis for an ensemble of size `n`:
/// `(i + 0.5) / n`, the plotting-position convention, strictly increasing
/// and spanning (0, 1).
pub fn cumulative_frequencies(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect()
}

/// Linear interpolation of `sorted_values` at cumulative frequency `f`,
/// clamped to the first/last value outside the axis range.
///
/// `frequencies` must be strictly increasing and the same length as
/// `sorted_values`; both must be non-empty.
pub fn interpolate_quantile(frequencies: &[f64], sorted_values: &[f64], f: f64) -> f64 {
    debug_assert_eq!(frequencies.len(), sorted_values.len());
    debug_assert!(!sorted_values.is_empty());

    if f <= frequencies[0] {
        return sorted_values[0];
    }
    let last = frequencies.len() - 1;
    if f >= frequencies[last] {
        return sorted_values[last];
    }
    let hi = frequencies.partition_point(|&x| x < f);
    let lo = hi - 1;
    if frequencies[hi] == frequencies[lo] {
        return sorted_values[lo];
    }
    let t = (f - frequencies[lo]) / (frequencies[hi] - frequencies[lo]);
    sorted_values[lo] + t * (sorted_values[hi] - sorted_values[lo])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forecast() -> EnsembleForecast {
        EnsembleForecast {
            origin: "hydrocast".to_string(),
            creation_date: "2022-10-01".to_string(),
            method_id: "4Z".to_string(),
            specific_tag: "RR".to_string(),
            dataset_id: "stations-v1".to_string(),
            station_ids: vec![42],
            // 2022-10-01 00:00 and 06:00
            target_dates: vec![59853.0, 59853.25],
            analogs_nb: vec![3, 3],
            analog_values: vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]],
        }
    }

    #[test]
    fn validate_accepts_consistent_artifact() {
        sample_forecast().validate().unwrap();
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let mut f = sample_forecast();
        f.analog_values = vec![vec![1.0, 2.0, 3.0]];
        assert!(f.validate().is_err());

        let mut f = sample_forecast();
        f.analogs_nb = vec![3];
        assert!(f.validate().is_err());
    }

    #[test]
    fn analog_slices_are_contiguous() {
        let f = sample_forecast();
        assert_eq!(f.analog_slice(0, 0), &[1.0, 2.0, 3.0]);
        assert_eq!(f.analog_slice(0, 1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn station_lookup() {
        let f = sample_forecast();
        assert_eq!(f.station_index(42), Some(0));
        assert_eq!(f.station_index(7), None);
    }

    #[test]
    fn mjd_epoch_and_known_dates() {
        let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(mjd_to_datetime(0.0), epoch);

        // MJD 51544 is 2000-01-01 00:00 UTC
        let y2k = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(mjd_to_datetime(51544.0), y2k);

        // fractional day carries the hour
        let six = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(mjd_to_datetime(51544.25), six);
    }

    #[test]
    fn frequency_axis_spans_open_interval() {
        let freqs = cumulative_frequencies(3);
        assert_eq!(freqs, vec![0.5 / 3.0, 1.5 / 3.0, 2.5 / 3.0]);
        assert!(freqs[0] > 0.0 && freqs[2] < 1.0);
    }

    #[test]
    fn quantile_clamps_to_extremes() {
        let values = [1.0, 2.0, 3.0];
        let freqs = cumulative_frequencies(3);
        assert_eq!(interpolate_quantile(&freqs, &values, 0.0), 1.0);
        assert_eq!(interpolate_quantile(&freqs, &values, 1.0), 3.0);
    }

    #[test]
    fn quantile_median_of_odd_ensemble_is_exact() {
        let values = [1.0, 2.0, 3.0];
        let freqs = cumulative_frequencies(3);
        assert_eq!(interpolate_quantile(&freqs, &values, 0.5), 2.0);
    }

    #[test]
    fn quantile_interpolates_between_members() {
        let values = [0.0, 10.0];
        let freqs = cumulative_frequencies(2); // [0.25, 0.75]
        let v = interpolate_quantile(&freqs, &values, 0.5);
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn json_reader_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("forecast.nc");
        let json = serde_json::to_string(&sample_forecast()).unwrap();
        std::fs::write(&path, json).unwrap();

        let f = read_json_forecast(&path).unwrap();
        assert_eq!(f.station_ids, vec![42]);
        assert_eq!(f.analogs_nb, vec![3, 3]);
        assert_eq!(f.dataset_id, "stations-v1");
    }

    #[test]
    fn json_reader_rejects_inconsistent_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.nc");
        let mut f = sample_forecast();
        f.analogs_nb = vec![3];
        std::fs::write(&path, serde_json::to_string(&f).unwrap()).unwrap();
        assert!(read_json_forecast(&path).is_err());
    }

    #[test]
    fn json_reader_missing_file() {
        assert!(read_json_forecast(Path::new("/nonexistent/f.nc")).is_err());
    }
}
