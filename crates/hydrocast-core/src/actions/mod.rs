//! Pipeline action capabilities and the registry resolving configuration
//! tags to concrete implementations.
//!
//! Three capability sets exist: pre-actions stage input data before the
//! engine runs, post-actions transform its output, disseminations ship the
//! transformed products. Each is an explicit trait; the registry is a
//! closed match over the known implementation tags.

pub mod download_gfs;
pub mod export_prv;
pub mod transfer_in;
pub mod transfer_out;

use crate::config::{ActionDescriptor, Options};
use crate::cycle::ForecastCycle;
use crate::error::{HydrocastError, Result};
use std::path::{Path, PathBuf};

pub use download_gfs::DownloadGfsData;
pub use export_prv::ExportPrv;
pub use transfer_in::TransferSftpIn;
pub use transfer_out::TransferSftpOut;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Backward-search bounds a pre-action contributes to the retry scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total hours the search may step back before giving up.
    pub max_retry_hours: i64,
    /// Grid step of one regression.
    pub retry_step_hours: i64,
}

pub const DEFAULT_MAX_RETRY_HOURS: i64 = 7 * 24;
pub const DEFAULT_RETRY_STEP_HOURS: i64 = 6;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_hours: DEFAULT_MAX_RETRY_HOURS,
            retry_step_hours: DEFAULT_RETRY_STEP_HOURS,
        }
    }
}

impl RetryPolicy {
    pub fn from_options(options: &Options) -> Result<Self> {
        let max_retry_hours = options
            .opt_i64("max_retry_hours")?
            .unwrap_or(DEFAULT_MAX_RETRY_HOURS);
        let retry_step_hours = options
            .opt_i64("retry_step_hours")?
            .unwrap_or(DEFAULT_RETRY_STEP_HOURS);
        if max_retry_hours <= 0 || retry_step_hours <= 0 {
            return Err(HydrocastError::Config(
                "retry policy hours must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_retry_hours,
            retry_step_hours,
        })
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Metadata handed to post-actions along with the engine's output files.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub forecast_date: ForecastCycle,
}

/// A step executed before the forecasting engine, subject to the temporal
/// retry search. `Ok(false)` is a recoverable failure (data not available
/// yet for this cycle); `Err` is fatal.
pub trait PreAction: std::fmt::Debug {
    fn name(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn retry_policy(&self) -> RetryPolicy;
    fn run(&self, cycle: &ForecastCycle) -> Result<bool>;
}

/// A step executed on the engine's output. `feed` attaches the artifact
/// list and forecast metadata; `run` is then pure given those inputs.
pub trait PostAction: std::fmt::Debug {
    fn name(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn feed(&mut self, files: &[PathBuf], metadata: &RunMetadata);
    fn run(&mut self) -> Result<bool>;
}

/// A step shipping post-processed output to an external destination.
/// Exposes the local directory and extension so the controller can list the
/// files to feed it.
pub trait Dissemination: std::fmt::Debug {
    fn name(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn local_dir(&self) -> &Path;
    fn extension(&self) -> &str;
    fn feed(&mut self, files: &[PathBuf]);
    fn run(&mut self, cycle: &ForecastCycle) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub const KNOWN_PRE_ACTIONS: &[&str] = &["transfer_sftp_in", "download_gfs"];
pub const KNOWN_POST_ACTIONS: &[&str] = &["export_prv"];
pub const KNOWN_DISSEMINATIONS: &[&str] = &["transfer_sftp_out"];

pub fn build_pre_action(desc: &ActionDescriptor) -> Result<Box<dyn PreAction>> {
    match desc.uses.as_str() {
        "transfer_sftp_in" => Ok(Box::new(TransferSftpIn::new(&desc.name, &desc.options)?)),
        "download_gfs" => Ok(Box::new(DownloadGfsData::new(&desc.name, &desc.options)?)),
        other => Err(HydrocastError::UnknownActionKind(other.to_string())),
    }
}

pub fn build_post_action(desc: &ActionDescriptor) -> Result<Box<dyn PostAction>> {
    match desc.uses.as_str() {
        "export_prv" => Ok(Box::new(ExportPrv::new(&desc.name, &desc.options)?)),
        other => Err(HydrocastError::UnknownActionKind(other.to_string())),
    }
}

pub fn build_dissemination(desc: &ActionDescriptor) -> Result<Box<dyn Dissemination>> {
    match desc.uses.as_str() {
        "transfer_sftp_out" => Ok(Box::new(TransferSftpOut::new(&desc.name, &desc.options)?)),
        other => Err(HydrocastError::UnknownActionKind(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(uses: &str, yaml_options: &str) -> ActionDescriptor {
        ActionDescriptor {
            name: "test action".to_string(),
            uses: uses.to_string(),
            active: true,
            options: serde_yaml::from_str(yaml_options).unwrap(),
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let err = build_pre_action(&desc("teleport_data", "{}")).unwrap_err();
        assert!(matches!(err, HydrocastError::UnknownActionKind(ref t) if t == "teleport_data"));
        assert!(build_post_action(&desc("teleport_data", "{}")).is_err());
        assert!(build_dissemination(&desc("teleport_data", "{}")).is_err());
    }

    #[test]
    fn known_tags_resolve() {
        let d = desc("download_gfs", "output_dir: /tmp/gfs\n");
        let action = build_pre_action(&d).unwrap();
        assert_eq!(action.name(), "test action");

        let d = desc("export_prv", "output_dir: /tmp/prv\n");
        let action = build_post_action(&d).unwrap();
        assert_eq!(action.type_name(), "prv export");

        let d = desc(
            "transfer_sftp_out",
            "local_dir: /tmp/prv\nextension: .csv\nhostname: h\nusername: u\npassword: p\nremote_dir: /in\n",
        );
        let action = build_dissemination(&d).unwrap();
        assert_eq!(action.extension(), ".csv");
    }

    #[test]
    fn missing_required_option_is_a_config_error() {
        let err = build_post_action(&desc("export_prv", "{}")).unwrap_err();
        assert!(matches!(err, HydrocastError::Config(_)));
    }

    #[test]
    fn retry_policy_defaults_and_overrides() {
        let p = RetryPolicy::from_options(&serde_yaml::from_str("{}").unwrap()).unwrap();
        assert_eq!(p, RetryPolicy::default());
        assert_eq!(p.max_retry_hours, 168);

        let p = RetryPolicy::from_options(
            &serde_yaml::from_str("max_retry_hours: 24\nretry_step_hours: 12\n").unwrap(),
        )
        .unwrap();
        assert_eq!(p.max_retry_hours, 24);
        assert_eq!(p.retry_step_hours, 12);
    }

    #[test]
    fn retry_policy_rejects_nonpositive_hours() {
        assert!(
            RetryPolicy::from_options(&serde_yaml::from_str("retry_step_hours: 0\n").unwrap())
                .is_err()
        );
        assert!(
            RetryPolicy::from_options(&serde_yaml::from_str("max_retry_hours: -6\n").unwrap())
                .is_err()
        );
    }
}
