pub mod check;
pub mod run;

use std::path::{Path, PathBuf};

/// The configuration file is mandatory for every subcommand; clap fills it
/// from `--config` or `HYDROCAST_CONFIG`.
pub fn require_config(config: Option<&Path>) -> anyhow::Result<PathBuf> {
    config.map(Path::to_path_buf).ok_or_else(|| {
        anyhow::anyhow!("no configuration file: pass --config or set HYDROCAST_CONFIG")
    })
}
