use crate::cycle::DEFAULT_TIME_INCREMENT;
use crate::error::{HydrocastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Free-form `with:` mapping attached to an action or engine descriptor.
///
/// Keys are validated lazily by the action constructors through the typed
/// accessors below; a missing or mistyped required key is a fatal
/// configuration error raised before any action executes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(HashMap<String, serde_yaml::Value>);

impl Options {
    pub fn new(map: HashMap<String, serde_yaml::Value>) -> Self {
        Self(map)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    /// Required string option.
    pub fn req_str(&self, key: &str) -> Result<String> {
        self.opt_str(key)
            .ok_or_else(|| HydrocastError::Config(format!("option '{key}' not provided")))
    }

    /// Optional string option. Empty strings count as absent.
    pub fn opt_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(serde_yaml::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Optional integer option; accepts a YAML number or numeric string.
    pub fn opt_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                HydrocastError::Config(format!("option '{key}' is not an integer"))
            }),
            Some(serde_yaml::Value::String(s)) => s.parse().map(Some).map_err(|_| {
                HydrocastError::Config(format!("option '{key}' is not an integer"))
            }),
            Some(_) => Err(HydrocastError::Config(format!(
                "option '{key}' is not an integer"
            ))),
        }
    }

    pub fn opt_u16(&self, key: &str) -> Result<Option<u16>> {
        match self.opt_i64(key)? {
            None => Ok(None),
            Some(v) => u16::try_from(v).map(Some).map_err(|_| {
                HydrocastError::Config(format!("option '{key}' is out of range"))
            }),
        }
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(HydrocastError::Config(format!(
                "option '{key}' is not a number"
            ))),
        }
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(HydrocastError::Config(format!(
                "option '{key}' is not a boolean"
            ))),
        }
    }

    /// Optional list of numbers. An empty list counts as absent.
    pub fn opt_f64_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Sequence(seq)) => {
                if seq.is_empty() {
                    return Ok(None);
                }
                let mut out = Vec::with_capacity(seq.len());
                for v in seq {
                    match v {
                        serde_yaml::Value::Number(n) => match n.as_f64() {
                            Some(f) => out.push(f),
                            None => {
                                return Err(HydrocastError::Config(format!(
                                    "option '{key}' contains a non-numeric entry"
                                )))
                            }
                        },
                        _ => {
                            return Err(HydrocastError::Config(format!(
                                "option '{key}' contains a non-numeric entry"
                            )))
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(HydrocastError::Config(format!(
                "option '{key}' is not a list"
            ))),
        }
    }

    /// Optional list of strings. An empty list counts as absent.
    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Sequence(seq)) => {
                if seq.is_empty() {
                    return Ok(None);
                }
                let mut out = Vec::with_capacity(seq.len());
                for v in seq {
                    match v {
                        serde_yaml::Value::String(s) => out.push(s.clone()),
                        serde_yaml::Value::Number(n) => out.push(n.to_string()),
                        _ => {
                            return Err(HydrocastError::Config(format!(
                                "option '{key}' contains a non-string entry"
                            )))
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(HydrocastError::Config(format!(
                "option '{key}' is not a list"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionDescriptor / EngineDescriptor
// ---------------------------------------------------------------------------

/// Declarative description of one pipeline action, read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    /// Implementation tag resolved by the action registry.
    pub uses: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, rename = "with")]
    pub options: Options,
}

fn default_active() -> bool {
    true
}

/// The external forecasting engine invocation block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDescriptor {
    pub name: String,
    #[serde(default, rename = "with")]
    pub options: Options,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_time_increment")]
    pub time_increment: u32,
    #[serde(default)]
    pub pre_actions: Vec<ActionDescriptor>,
    pub forecaster: Option<EngineDescriptor>,
    #[serde(default)]
    pub post_actions: Vec<ActionDescriptor>,
    #[serde(default)]
    pub disseminations: Vec<ActionDescriptor>,
}

fn default_time_increment() -> u32 {
    DEFAULT_TIME_INCREMENT
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HydrocastError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.time_increment == 0 || 24 % self.time_increment != 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "time_increment={} does not divide 24, falling back to {}",
                    self.time_increment, DEFAULT_TIME_INCREMENT
                ),
            });
        }

        match &self.forecaster {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "no 'forecaster' section: the engine cannot be invoked".to_string(),
            }),
            Some(engine) => {
                if engine.options.opt_str("batch_file").is_none() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: "forecaster option 'batch_file' not provided".to_string(),
                    });
                }
                if engine.options.opt_str("output_dir").is_none() && !self.post_actions.is_empty()
                {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: "forecaster option 'output_dir' not provided but post-actions are configured"
                            .to_string(),
                    });
                }
            }
        }

        for (list, known) in [
            (&self.pre_actions[..], crate::actions::KNOWN_PRE_ACTIONS),
            (&self.post_actions[..], crate::actions::KNOWN_POST_ACTIONS),
            (&self.disseminations[..], crate::actions::KNOWN_DISSEMINATIONS),
        ] {
            for desc in list {
                if !known.contains(&desc.uses.as_str()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "action '{}' uses unknown kind '{}'",
                            desc.name, desc.uses
                        ),
                    });
                }
            }
        }

        for desc in &self.post_actions {
            if let Ok(Some(freqs)) = desc.options.opt_f64_list("frequencies") {
                for f in freqs {
                    if !(0.0..=1.0).contains(&f) {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Error,
                            message: format!(
                                "action '{}': frequency {f} is outside [0, 1]",
                                desc.name
                            ),
                        });
                    }
                }
            }
        }

        warnings
    }

    /// True when any validation finding is `Error`-level.
    pub fn has_fatal_warnings(&self) -> bool {
        self.validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
