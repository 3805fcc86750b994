use crate::output::print_json;
use anyhow::Context;
use hydrocast_core::config::{Config, WarnLevel};
use std::path::Path;

pub fn run(config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config_path = super::require_config(config)?;
    let config = Config::load(&config_path).context("failed to load configuration")?;
    let warnings = config.validate();

    if json {
        print_json(&warnings)?;
    } else if warnings.is_empty() {
        println!("configuration OK");
    } else {
        for w in &warnings {
            let level = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("{level}: {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("configuration has errors");
    }
    Ok(())
}
