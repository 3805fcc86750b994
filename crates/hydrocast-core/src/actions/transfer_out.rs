//! Outbound dissemination of exported products over a remote transport.

use crate::actions::Dissemination;
use crate::config::Options;
use crate::cycle::ForecastCycle;
use crate::error::Result;
use crate::transport::{self, Connector, RemoteTransport, TransportConfig, TransportError};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TransferSftpOut {
    name: String,
    local_dir: PathBuf,
    extension: String,
    remote_dir: String,
    transport_config: TransportConfig,
    connector: Connector,
    file_paths: Vec<PathBuf>,
}

impl TransferSftpOut {
    pub fn new(name: &str, options: &Options) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            local_dir: PathBuf::from(options.req_str("local_dir")?),
            extension: options.req_str("extension")?,
            remote_dir: options.req_str("remote_dir")?,
            transport_config: TransportConfig::from_options(options)?,
            connector: transport::open,
            file_paths: Vec::new(),
        })
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    fn upload(
        &self,
        transport: &mut dyn RemoteTransport,
        cycle: &ForecastCycle,
    ) -> std::result::Result<(), TransportError> {
        transport.connect()?;
        // mirror the local year/month/day layout on the remote side
        transport.change_or_make_dir(&self.remote_dir)?;
        let dt = cycle.datetime();
        for part in [
            dt.format("%Y").to_string(),
            dt.format("%m").to_string(),
            dt.format("%d").to_string(),
        ] {
            transport.change_or_make_dir(&part)?;
        }

        for file in &self.file_paths {
            let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            if !file.exists() {
                return Err(TransportError::Transfer {
                    name: file_name,
                    reason: "local file disappeared before upload".to_string(),
                });
            }
            transport.put(file, &file_name)?;
        }
        Ok(())
    }
}

impl Dissemination for TransferSftpOut {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "sftp transfer"
    }

    fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn feed(&mut self, files: &[PathBuf]) {
        self.file_paths = files.to_vec();
    }

    fn run(&mut self, cycle: &ForecastCycle) -> Result<bool> {
        if self.file_paths.is_empty() {
            tracing::warn!(action = %self.name, "no files to disseminate");
            return Ok(false);
        }

        let mut transport = match (self.connector)(&self.transport_config) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(action = %self.name, error = %e, "transport unavailable");
                return Ok(false);
            }
        };
        let outcome = self.upload(transport.as_mut(), cycle);
        transport.close();

        match outcome {
            Ok(()) => {
                tracing::info!(action = %self.name, files = self.file_paths.len(), "dissemination complete");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(action = %self.name, error = %e, "dissemination failed");
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
