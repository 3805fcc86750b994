use anyhow::Context;
use hydrocast_core::config::Config;
use hydrocast_core::controller::Controller;
use std::path::Path;

pub fn run(config: Option<&Path>, date: Option<&str>) -> anyhow::Result<()> {
    let config_path = super::require_config(config)?;
    let config = Config::load(&config_path).context("failed to load configuration")?;

    // a run refuses configurations 'check' reports as broken
    let fatal: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == hydrocast_core::config::WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !fatal.is_empty() {
        anyhow::bail!("invalid configuration:\n  {}", fatal.join("\n  "));
    }

    let mut controller = Controller::new(config).context("failed to register actions")?;
    controller
        .run(date)
        .context("forecast production run failed")?;

    println!("forecast production run complete");
    Ok(())
}
