//! Invocation of the external forecasting engine.
//!
//! The engine is an opaque command-line collaborator: the runner builds its
//! argument list, launches it, and waits. A non-zero exit or a launch
//! failure is logged without aborting the pipeline — post-processing still
//! runs over whatever output exists (observed operational policy).

use crate::config::EngineDescriptor;
use crate::cycle::ForecastCycle;
use crate::error::{HydrocastError, Result};
use std::path::PathBuf;
use std::process::Command;

const DEFAULT_ENGINE_BIN: &str = "forecaster";

#[derive(Debug)]
pub struct EngineRunner {
    name: String,
    descriptor: EngineDescriptor,
}

impl EngineRunner {
    pub fn new(descriptor: EngineDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the engine writes its forecast artifacts; post-actions consume
    /// files from this tree.
    pub fn output_dir(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.descriptor.options.req_str("output_dir")?))
    }

    /// Full command line: binary, mandatory batch file, forecast-date
    /// selector and optional proxy flags.
    pub fn build_command(&self, cycle: &ForecastCycle) -> Result<Vec<String>> {
        let options = &self.descriptor.options;
        let binary = options.opt_str("engine_path").unwrap_or_else(|| {
            which::which(DEFAULT_ENGINE_BIN)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| DEFAULT_ENGINE_BIN.to_string())
        });

        let mut cmd = vec![binary];

        let batch_file = options.req_str("batch_file")?;
        cmd.push("-f".to_string());
        cmd.push(batch_file);

        match options.opt_str("target").as_deref() {
            None | Some("now") => cmd.push(format!("--forecast-date={}", cycle.stamp())),
            Some("past") => {
                let days = options.opt_i64("target_nb_days")?.ok_or_else(|| {
                    HydrocastError::Config("option 'target_nb_days' not provided".to_string())
                })?;
                cmd.push(format!("--forecast-past={days}"));
            }
            Some("date") => {
                let date = options.req_str("target_date").map_err(|_| {
                    HydrocastError::Config("option 'target_date' not provided".to_string())
                })?;
                cmd.push(format!("--forecast-date={date}"));
            }
            Some(other) => {
                return Err(HydrocastError::Config(format!(
                    "unknown forecast target '{other}' (use now, past or date)"
                )))
            }
        }

        if let Some(proxy) = options.opt_str("proxy") {
            cmd.push(format!("--proxy={proxy}"));
            if let Some(user) = options.opt_str("proxy_user") {
                cmd.push(format!("--proxy-user={user}"));
            }
        }

        Ok(cmd)
    }

    /// Launch the engine and wait for it. Only command construction can
    /// fail; the launch itself is logged and swallowed.
    pub fn run(&self, cycle: &ForecastCycle) -> Result<()> {
        let cmd = self.build_command(cycle)?;
        tracing::info!(
            engine = %self.name,
            cycle = %cycle,
            command = %cmd.join(" "),
            "invoking forecasting engine"
        );

        match Command::new(&cmd[0]).args(&cmd[1..]).output() {
            Ok(output) if output.status.success() => {
                tracing::info!(engine = %self.name, "engine run complete");
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(
                    engine = %self.name,
                    status = %output.status,
                    stderr = %stderr.chars().take(500).collect::<String>(),
                    "engine exited with a failure status"
                );
            }
            Err(e) => {
                tracing::warn!(engine = %self.name, error = %e, "failed to launch engine");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
