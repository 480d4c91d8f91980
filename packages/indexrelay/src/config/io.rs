//! Configuration I/O (YAML loading)
//!
//! YAML files are flattened into the same dotted keys the property map uses,
//! so both sources go through one resolution path:
//!
//! ```yaml
//! version: 1
//! default:
//!   backend: jms
//!   worker:
//!     execution: async
//! indexes:
//!   books:
//!     backend: blackhole
//! ```
//!
//! becomes `default.backend=jms`, `default.worker.execution=async`,
//! `books.backend=blackhole`.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use super::error::{ConfigError, ConfigResult};
use super::properties::{Properties, DEFAULT_SCOPE};

/// Supported schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    #[serde(default)]
    pub version: Option<u32>,

    /// Options applying to every index
    #[serde(default)]
    pub default: Mapping,

    /// Per-index overrides
    #[serde(default)]
    pub indexes: BTreeMap<String, Mapping>,
}

/// Load and flatten a YAML configuration file
pub fn load_properties(path: impl AsRef<Path>) -> ConfigResult<Properties> {
    let content = std::fs::read_to_string(path)?;
    parse_properties(&content)
}

/// Parse and flatten YAML configuration text
pub fn parse_properties(yaml: &str) -> ConfigResult<Properties> {
    let file: ConfigFileV1 = serde_yaml::from_str(yaml)?;

    let version = file.version.ok_or(ConfigError::MissingVersion)?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ConfigError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSIONS.to_vec(),
        });
    }

    let mut properties = Properties::new();
    flatten_into(DEFAULT_SCOPE, &file.default, &mut properties)?;
    for (index_name, mapping) in &file.indexes {
        flatten_into(index_name, mapping, &mut properties)?;
    }

    Ok(properties)
}

fn flatten_into(prefix: &str, mapping: &Mapping, out: &mut Properties) -> ConfigResult<()> {
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s.clone(),
            other => {
                return Err(ConfigError::invalid_value(
                    prefix,
                    format!("{:?}", other),
                    "Configuration keys must be strings",
                ))
            }
        };
        let full_key = format!("{}.{}", prefix, key);

        match value {
            Value::Mapping(nested) => flatten_into(&full_key, nested, out)?,
            Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            Value::Bool(b) => {
                out.insert(full_key, b.to_string());
            }
            Value::Number(n) => {
                out.insert(full_key, n.to_string());
            }
            Value::Null => {}
            Value::Sequence(_) | Value::Tagged(_) => {
                return Err(ConfigError::invalid_value(
                    full_key,
                    format!("{:?}", value),
                    "Expected a scalar or a nested mapping",
                ))
            }
        }
    }
    Ok(())
}
