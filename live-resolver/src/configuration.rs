//! Logic for loading configuration in to an object model
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// The configuration for resolution.
///
/// Can be created through `serde::Deserialize` from various formats,
/// or inline in Rust code with `serde_json::json!` and `serde_json::from_value`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Execution options.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Execution options.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// How selected fields are dispatched.
    #[serde(default)]
    pub mode: ExecutionMode,
}

/// How the fields of an object are dispatched.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Each field resolves in its own task and objects keep tracking their selections.
    #[default]
    Concurrent,
    /// Fields resolve one after the other, once; selection changes are not tracked.
    Serial,
}

impl ExecutionMode {
    pub fn is_serial(self) -> bool {
        self == ExecutionMode::Serial
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(s)?)
    }
}

impl Configuration {
    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigurationError> {
        std::fs::read_to_string(path)?.parse()
    }

    pub fn serial() -> Self {
        Self {
            execution: ExecutionConfig {
                mode: ExecutionMode::Serial,
            },
        }
    }
}
