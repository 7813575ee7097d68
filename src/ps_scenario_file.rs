// Scenario files
//
// YAML files carrying a short description of the run and parameter overrides
// by flag name:
//
//   meta:
//     name: psync-simple
//   parameters:
//     sm: 50
//     duration: 120
//
// Parameter values go through the same by-name coercion as the command line.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde_yaml::Value;

use crate::ps_config::{ConfigError, ScenarioOverrides};

#[derive(Debug, Default, serde::Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub meta: ScenarioMeta,

    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl ScenarioFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let label = path.display().to_string();

        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: label.clone(),
            source,
        })?;

        let file = Self::parse(&yaml, &label)?;
        info!(
            "loaded scenario {} from {}",
            file.meta.name.as_deref().unwrap_or("<unnamed>"),
            label
        );
        Ok(file)
    }

    pub fn parse(yaml: &str, label: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: label.to_string(),
            source,
        })
    }

    /// Turn the `parameters` map into overrides. Unknown names are skipped.
    pub fn overrides(&self) -> Result<ScenarioOverrides, ConfigError> {
        let mut overrides = ScenarioOverrides::default();

        for (name, value) in &self.parameters {
            let text = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        flag: name.clone(),
                        value: format!("{:?}", value),
                        expected: "a scalar",
                    })
                }
            };
            overrides.apply_pair(name, &text)?;
        }

        Ok(overrides)
    }
}
