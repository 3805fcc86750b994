//! GFS grid download over HTTP.
//!
//! Fetches one file per configured lead time from the NOMADS grib filter
//! endpoint into the local date directory. Network failures and non-success
//! statuses are recoverable: the retry scheduler answers them by searching
//! an earlier cycle, which is exactly how late-published runs are handled.

use crate::actions::{PreAction, RetryPolicy};
use crate::config::Options;
use crate::cycle::ForecastCycle;
use crate::discovery;
use crate::error::{HydrocastError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://nomads.ncep.noaa.gov/cgi-bin";
const DEFAULT_LEAD_TIMES: [i64; 3] = [0, 6, 12];
const DEFAULT_VARIABLES: [&str; 1] = ["HGT"];
const DEFAULT_LEVELS: [i64; 2] = [500, 1000];
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Quarter,
    Half,
    Full,
}

impl Resolution {
    fn parse(value: Option<f64>) -> Result<Self> {
        match value {
            None => Ok(Self::Quarter),
            Some(v) if v == 0.25 => Ok(Self::Quarter),
            Some(v) if v == 0.5 => Ok(Self::Half),
            Some(v) if v == 1.0 => Ok(Self::Full),
            Some(v) => Err(HydrocastError::Config(format!(
                "unsupported GFS resolution {v} (use 0.25, 0.5 or 1)"
            ))),
        }
    }

    /// Token used in both the filter script name and the remote file name.
    fn token(self) -> &'static str {
        match self {
            Self::Quarter => "0p25",
            Self::Half => "0p50",
            Self::Full => "1p00",
        }
    }
}

#[derive(Debug)]
pub struct DownloadGfsData {
    name: String,
    output_dir: PathBuf,
    base_url: String,
    resolution: Resolution,
    lead_times: Vec<i64>,
    variables: Vec<String>,
    levels: Vec<i64>,
    policy: RetryPolicy,
}

impl DownloadGfsData {
    pub fn new(name: &str, options: &Options) -> Result<Self> {
        let lead_times = match options.opt_f64_list("lead_times")? {
            Some(hours) => hours.into_iter().map(|h| h as i64).collect(),
            None => DEFAULT_LEAD_TIMES.to_vec(),
        };
        let variables = options
            .opt_str_list("variables")?
            .unwrap_or_else(|| DEFAULT_VARIABLES.iter().map(|s| s.to_string()).collect());
        let levels = match options.opt_f64_list("levels")? {
            Some(levels) => levels.into_iter().map(|l| l as i64).collect(),
            None => DEFAULT_LEVELS.to_vec(),
        };
        Ok(Self {
            name: name.to_string(),
            output_dir: PathBuf::from(options.req_str("output_dir")?),
            base_url: options
                .opt_str("base_url")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            resolution: Resolution::parse(options.opt_f64("resolution")?)?,
            lead_times,
            variables,
            levels,
            policy: RetryPolicy::from_options(options)?,
        })
    }

    fn local_file_name(&self, cycle: &ForecastCycle, lead_time: i64) -> String {
        format!("gfs_{}_f{lead_time:03}.grib2", cycle.stamp())
    }

    fn files_already_present(&self, cycle: &ForecastCycle) -> bool {
        let dir = discovery::date_dir(&self.output_dir, cycle);
        self.lead_times
            .iter()
            .all(|&lt| dir.join(self.local_file_name(cycle, lt)).exists())
    }

    /// One grib filter request per lead time, e.g.
    /// `{base}/filter_gfs_0p25.pl?file=gfs.t06z.pgrb2.0p25.f012&dir=/gfs.20221001/06/atmos&var_HGT=on&lev_500_mb=on`
    fn build_url(&self, cycle: &ForecastCycle, lead_time: i64) -> String {
        let token = self.resolution.token();
        let hour = cycle.datetime().format("%H");
        let mut url = format!(
            "{}/filter_gfs_{token}.pl?file=gfs.t{hour}z.pgrb2.{token}.f{lead_time:03}&dir=%2Fgfs.{}%2F{hour}%2Fatmos",
            self.base_url,
            cycle.day_stamp(),
        );
        for variable in &self.variables {
            url.push_str(&format!("&var_{variable}=on"));
        }
        for level in &self.levels {
            url.push_str(&format!("&lev_{level}_mb=on"));
        }
        url
    }

    pub fn download(&self, cycle: &ForecastCycle) -> Result<bool> {
        let dir = discovery::ensure_date_dir(&self.output_dir, cycle)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| HydrocastError::Config(format!("http client: {e}")))?;

        for &lead_time in &self.lead_times {
            let target = dir.join(self.local_file_name(cycle, lead_time));
            if target.exists() {
                continue;
            }
            let url = self.build_url(cycle, lead_time);
            if !fetch_one(&client, &url, &target)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Download one grid; `Ok(false)` covers everything the scheduler should
/// answer with an earlier cycle (unavailable run, network trouble).
fn fetch_one(client: &reqwest::blocking::Client, url: &str, target: &Path) -> Result<bool> {
    let response = match client.get(url).send() {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(url, error = %e, "GFS request failed");
            return Ok(false);
        }
    };
    if !response.status().is_success() {
        tracing::warn!(url, status = %response.status(), "GFS grid not available");
        return Ok(false);
    }
    let bytes = match response.bytes() {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(url, error = %e, "GFS download interrupted");
            return Ok(false);
        }
    };
    let mut file = std::fs::File::create(target)?;
    file.write_all(&bytes)?;
    Ok(true)
}

impl PreAction for DownloadGfsData {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "GFS download"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn run(&self, cycle: &ForecastCycle) -> Result<bool> {
        if self.files_already_present(cycle) {
            tracing::info!(action = %self.name, "GFS grids already present locally");
            return Ok(true);
        }
        self.download(cycle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
