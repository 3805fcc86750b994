//! Pipeline controller: wires configuration into actions and drives one
//! forecast production run end to end.

use crate::actions::{self, Dissemination, PostAction, PreAction, RunMetadata};
use crate::config::{ActionDescriptor, Config};
use crate::cycle::ForecastCycle;
use crate::discovery;
use crate::engine::EngineRunner;
use crate::error::{HydrocastError, Result};
use crate::scheduler;

/// Extension of the artifacts the engine writes.
const ENGINE_OUTPUT_EXT: &str = ".nc";

#[derive(Debug)]
pub struct Controller {
    time_increment: u32,
    pre_actions: Vec<Box<dyn PreAction>>,
    engine: Option<EngineRunner>,
    post_actions: Vec<Box<dyn PostAction>>,
    disseminations: Vec<Box<dyn Dissemination>>,
}

fn active(descriptors: &[ActionDescriptor]) -> impl Iterator<Item = &ActionDescriptor> {
    descriptors.iter().filter(|d| d.active)
}

impl Controller {
    /// Instantiate every active configured action. Unknown tags and missing
    /// required options fail here, before anything executes.
    pub fn new(config: Config) -> Result<Self> {
        let mut pre_actions = Vec::new();
        for desc in active(&config.pre_actions) {
            tracing::info!(action = %desc.name, uses = %desc.uses, "registering pre-action");
            pre_actions.push(actions::build_pre_action(desc)?);
        }
        let mut post_actions = Vec::new();
        for desc in active(&config.post_actions) {
            tracing::info!(action = %desc.name, uses = %desc.uses, "registering post-action");
            post_actions.push(actions::build_post_action(desc)?);
        }
        let mut disseminations = Vec::new();
        for desc in active(&config.disseminations) {
            tracing::info!(action = %desc.name, uses = %desc.uses, "registering dissemination");
            disseminations.push(actions::build_dissemination(desc)?);
        }
        Ok(Self {
            time_increment: config.time_increment,
            pre_actions,
            engine: config.forecaster.map(EngineRunner::new),
            post_actions,
            disseminations,
        })
    }

    /// One full production run for `date` (or the current time).
    ///
    /// The cycle the pre-action search settles on — possibly earlier than
    /// requested — is the one the engine and every later phase see.
    pub fn run(&mut self, date: Option<&str>) -> Result<()> {
        let cycle = match date {
            Some(s) => ForecastCycle::parse(s, self.time_increment)?,
            None => ForecastCycle::now(self.time_increment),
        };

        let cycle = scheduler::run_pre_actions(&self.pre_actions, cycle)?;

        let engine = self.engine.as_ref().ok_or_else(|| {
            HydrocastError::Config("no 'forecaster' section in configuration".to_string())
        })?;
        engine.run(&cycle)?;

        if !self.post_actions.is_empty() {
            let files = discovery::list_files(&engine.output_dir()?, &cycle, ENGINE_OUTPUT_EXT);
            let metadata = RunMetadata {
                forecast_date: cycle,
            };
            for action in &mut self.post_actions {
                tracing::info!(action = action.name(), kind = action.type_name(), "running post-action");
                action.feed(&files, &metadata);
                if !action.run()? {
                    // best-effort phase: siblings still run
                    tracing::warn!(action = action.name(), "post-action reported failure");
                }
            }
        }

        for action in &mut self.disseminations {
            tracing::info!(action = action.name(), kind = action.type_name(), "running dissemination");
            let files = discovery::list_files(action.local_dir(), &cycle, action.extension());
            action.feed(&files);
            if !action.run(&cycle)? {
                tracing::warn!(action = action.name(), "dissemination reported failure");
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
