//! Inbound staging of weather-model feed files over a remote transport.

use crate::actions::{PreAction, RetryPolicy};
use crate::config::Options;
use crate::cycle::ForecastCycle;
use crate::discovery;
use crate::error::Result;
use crate::transport::{self, Connector, RemoteTransport, TransportConfig, TransportError};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TransferSftpIn {
    name: String,
    local_dir: PathBuf,
    prefix: String,
    /// When set, lets the action short-circuit on locally cached files and
    /// narrows the remote pattern to one file per variable.
    variables: Option<Vec<String>>,
    remote_dir: String,
    transport_config: TransportConfig,
    connector: Connector,
    policy: RetryPolicy,
}

impl TransferSftpIn {
    pub fn new(name: &str, options: &Options) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            local_dir: PathBuf::from(options.req_str("local_dir")?),
            prefix: options.req_str("prefix")?.to_lowercase(),
            variables: options.opt_str_list("variables")?,
            remote_dir: options.req_str("remote_dir")?,
            transport_config: TransportConfig::from_options(options)?,
            connector: transport::open,
            policy: RetryPolicy::from_options(options)?,
        })
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    /// With declared variables, one matching file per variable in the local
    /// date directory means the data is already staged.
    fn files_already_present(&self, cycle: &ForecastCycle) -> bool {
        let Some(variables) = &self.variables else {
            return false;
        };
        let local = discovery::date_dir(&self.local_dir, cycle);
        let Ok(entries) = std::fs::read_dir(&local) else {
            return false;
        };
        let names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_lowercase())
            .collect();
        let stamp = cycle.stamp();
        variables.iter().all(|variable| {
            let wanted = format!("{}_{}_{stamp}", self.prefix, variable.to_lowercase());
            names.iter().any(|n| n.starts_with(&wanted))
        })
    }

    fn wanted(&self, remote_name: &str, cycle: &ForecastCycle) -> bool {
        let name = remote_name.to_lowercase();
        let day = cycle.day_stamp();
        match &self.variables {
            Some(variables) => variables.iter().any(|variable| {
                name.starts_with(&format!("{}_{}_{day}", self.prefix, variable.to_lowercase()))
            }),
            None => name.starts_with(&self.prefix) && name.contains(&format!("_{day}")),
        }
    }

    fn fetch(
        &self,
        transport: &mut dyn RemoteTransport,
        cycle: &ForecastCycle,
        local: &Path,
    ) -> std::result::Result<usize, TransportError> {
        transport.connect()?;
        transport.change_or_make_dir(&self.remote_dir)?;

        let mut count = 0;
        for remote_name in transport.list_files()? {
            if !self.wanted(&remote_name, cycle) {
                continue;
            }
            let local_file = local.join(&remote_name);
            if local_file.exists() {
                continue;
            }
            transport.get(&remote_name, &local_file)?;
            if let Err(e) = unpack_if_needed(&local_file, local) {
                tracing::warn!(file = %local_file.display(), error = %e, "unpack failed");
            }
            count += 1;
        }
        Ok(count)
    }
}

impl PreAction for TransferSftpIn {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "sftp transfer"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn run(&self, cycle: &ForecastCycle) -> Result<bool> {
        if self.files_already_present(cycle) {
            tracing::info!(action = %self.name, "feed files already staged locally");
            return Ok(true);
        }

        let local = discovery::ensure_date_dir(&self.local_dir, cycle)?;

        let mut transport = match (self.connector)(&self.transport_config) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(action = %self.name, error = %e, "transport unavailable");
                return Ok(false);
            }
        };
        let outcome = self.fetch(transport.as_mut(), cycle, &local);
        transport.close();

        match outcome {
            Ok(count) => {
                tracing::info!(action = %self.name, files = count, "feed files staged");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(action = %self.name, error = %e, "transfer failed");
                Ok(false)
            }
        }
    }
}

/// Extract regular members of a tarball flat into `dir`, like the feed
/// providers expect. Non-archives pass through untouched.
fn unpack_if_needed(file: &Path, dir: &Path) -> Result<()> {
    let name = file.file_name().map(|n| n.to_string_lossy().to_lowercase());
    let Some(name) = name else { return Ok(()) };
    let gz = [".tar.gz", ".tgz"].iter().any(|s| name.ends_with(s));
    if !gz {
        return Ok(());
    }
    let reader = std::fs::File::open(file)?;
    let decoder = flate2::read::GzDecoder::new(reader);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = entry
            .path()?
            .file_name()
            .map(|n| n.to_os_string());
        if let Some(member) = member {
            entry.unpack(dir.join(member))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
