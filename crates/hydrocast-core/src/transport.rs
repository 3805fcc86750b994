//! Remote file transfer consumed as an opaque capability.
//!
//! The wire protocol (SFTP authentication, channel proxying) is an external
//! collaborator: actions talk to a [`RemoteTransport`] trait object opened
//! per `run()` invocation and closed before it returns. The built-in `local`
//! backend serves deployments where the remote share is mounted into the
//! filesystem, and doubles as the test double for the transfer actions.

use crate::config::Options;
use crate::error::Result;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Transfer failures are recoverable: actions convert them to a `false`
/// run outcome (retry or skip), never into a pipeline abort.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("remote path '{path}': {reason}")]
    Path { path: String, reason: String },

    #[error("transfer of '{name}' failed: {reason}")]
    Transfer { name: String, reason: String },

    #[error("no '{0}' transport backend is built in")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Connection settings shared by the inbound and outbound transfer actions.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub proxy: Option<(String, u16)>,
}

pub const DEFAULT_PROXY_PORT: u16 = 1080;

impl TransportConfig {
    /// Parse connection options from an action's `with:` block.
    ///
    /// `protocol` defaults to `sftp`; `local` skips host/credential checks
    /// because the backend only touches the filesystem.
    pub fn from_options(options: &Options) -> Result<Self> {
        let protocol = options.opt_str("protocol").unwrap_or_else(|| "sftp".to_string());
        let (hostname, port, username, password) = if protocol == "local" {
            (
                options.opt_str("hostname").unwrap_or_default(),
                0,
                String::new(),
                String::new(),
            )
        } else {
            (
                options.req_str("hostname")?,
                options.opt_u16("port")?.unwrap_or(22),
                options.req_str("username")?,
                options.req_str("password")?,
            )
        };
        let proxy = options.opt_str("proxy_host").map(|host| {
            let port = options
                .opt_u16("proxy_port")
                .ok()
                .flatten()
                .unwrap_or(DEFAULT_PROXY_PORT);
            (host, port)
        });
        Ok(Self {
            protocol,
            hostname,
            port,
            username,
            password,
            proxy,
        })
    }
}

// ---------------------------------------------------------------------------
// RemoteTransport
// ---------------------------------------------------------------------------

/// Narrow session contract over a remote file store.
///
/// A session lives for one action invocation: `connect` at the top of
/// `run()`, `close` before returning, on the error path too.
pub trait RemoteTransport {
    fn connect(&mut self) -> std::result::Result<(), TransportError>;

    /// Change into `path`, creating it when missing.
    fn change_or_make_dir(&mut self, path: &str) -> std::result::Result<(), TransportError>;

    /// File names in the current remote directory.
    fn list_files(&mut self) -> std::result::Result<Vec<String>, TransportError>;

    /// Download `name` from the current remote directory to `local`.
    fn get(&mut self, name: &str, local: &Path) -> std::result::Result<(), TransportError>;

    /// Upload `local` into the current remote directory as `name`.
    fn put(&mut self, local: &Path, name: &str) -> std::result::Result<(), TransportError>;

    fn close(&mut self);
}

/// Factory used by the transfer actions; tests swap it for one returning a
/// [`LocalDirTransport`] rooted in a scratch directory.
pub type Connector =
    fn(&TransportConfig) -> std::result::Result<Box<dyn RemoteTransport>, TransportError>;

/// Default backend dispatch. Only `local` ships with this crate; the SFTP
/// wire protocol is integrated by linking a backend in at this seam.
pub fn open(config: &TransportConfig) -> std::result::Result<Box<dyn RemoteTransport>, TransportError> {
    match config.protocol.as_str() {
        "local" => Ok(Box::new(LocalDirTransport::rooted_at("/"))),
        other => Err(TransportError::Unsupported(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// LocalDirTransport
// ---------------------------------------------------------------------------

/// Transport over a locally reachable directory tree (mounted share).
///
/// Remote paths are resolved against `root`; with the default `/` root an
/// absolute `remote_dir` maps straight onto the filesystem.
pub struct LocalDirTransport {
    root: PathBuf,
    cwd: PathBuf,
}

impl LocalDirTransport {
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cwd: root.clone(),
            root,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let trimmed = path.trim_start_matches('/');
        if Path::new(path).is_absolute() {
            self.root.join(trimmed)
        } else {
            self.cwd.join(trimmed)
        }
    }
}

impl RemoteTransport for LocalDirTransport {
    fn connect(&mut self) -> std::result::Result<(), TransportError> {
        Ok(())
    }

    fn change_or_make_dir(&mut self, path: &str) -> std::result::Result<(), TransportError> {
        let target = self.resolve(path);
        std::fs::create_dir_all(&target).map_err(|e| TransportError::Path {
            path: target.display().to_string(),
            reason: e.to_string(),
        })?;
        self.cwd = target;
        Ok(())
    }

    fn list_files(&mut self) -> std::result::Result<Vec<String>, TransportError> {
        let entries = std::fs::read_dir(&self.cwd).map_err(|e| TransportError::Path {
            path: self.cwd.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn get(&mut self, name: &str, local: &Path) -> std::result::Result<(), TransportError> {
        std::fs::copy(self.cwd.join(name), local)
            .map(|_| ())
            .map_err(|e| TransportError::Transfer {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn put(&mut self, local: &Path, name: &str) -> std::result::Result<(), TransportError> {
        std::fs::copy(local, self.cwd.join(name))
            .map(|_| ())
            .map_err(|e| TransportError::Transfer {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
