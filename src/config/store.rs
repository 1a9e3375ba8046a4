//! Process-wide configuration store.
//!
//! The store is built once at startup: the embedded defaults, with the
//! first override file found in the working directory deep-merged on top.
//! It is immutable afterwards and shared by every repository descriptor.

use crate::config::merger::deep_merge;
use crate::error::{Error, Result};
use crate::metadata::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Embedded default configuration.
const DEFAULTS: &str = include_str!("defaults.yml");

/// Override file names, in discovery order. The first one that exists wins.
pub const CONFIG_FILES: &[&str] = &[
    "opts.yml",
    "opts.yaml",
    "opts.json",
    "docker/template.yml",
    "docker/template.json",
];

static NIL: Value = Value::Nil;

/// Merged process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    data: Value,
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// The built-in defaults with no overrides applied.
    pub fn defaults() -> Self {
        let data = parse_value(DEFAULTS, Path::new("defaults.yml"))
            .ok()
            .filter(|v| v.as_mapping().is_some())
            .unwrap_or_else(Value::mapping);
        Self { data, source: None }
    }

    /// Load defaults plus the first override file found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParseError` if the override file is malformed and
    /// `ConfigNotMapping` if it does not parse to a mapping.
    pub fn load(dir: &Path) -> Result<Self> {
        match find_override_file(dir) {
            Some(path) => {
                debug!("Loading configuration overrides from {}", path.display());
                let overrides = load_override_file(&path)?;
                let mut config = Self::defaults().with_overrides(&overrides);
                config.source = Some(path);
                Ok(config)
            }
            None => Ok(Self::defaults()),
        }
    }

    /// Return a new store with `overrides` deep-merged on top.
    pub fn with_overrides(&self, overrides: &Value) -> Self {
        Self {
            data: deep_merge(&self.data, overrides),
            source: self.source.clone(),
        }
    }

    /// The override file this store was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The merged configuration mapping.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Look up a top-level key. Unknown keys are nil.
    pub fn get(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&NIL)
    }

    /// Look up a string key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).as_str()
    }

    /// Look up a boolean flag; nil, empty and false are all false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_truthy()
    }

    /// Enumerate the top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data
            .as_mapping()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// The canonical list of valid build types.
    pub fn build_types(&self) -> Vec<String> {
        self.get("build_types")
            .as_list()
            .unwrap_or_default()
            .iter()
            .map(Value::to_plain_string)
            .collect()
    }

    /// Whether `kind` is a recognized build type.
    pub fn is_build_type(&self, kind: &str) -> bool {
        self.build_types().iter().any(|t| t == kind)
    }
}

/// Find the first override file in `dir`.
pub fn find_override_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load an override file as a mapping.
///
/// `.json` files are parsed as JSON, everything else as YAML. An empty
/// file is an empty mapping.
pub fn load_override_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let value = if path.extension().is_some_and(|e| e == "json") {
        let json: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| Error::ConfigParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Value::from(json)
    } else {
        parse_value(&content, path)?
    };

    match value {
        Value::Nil => Ok(Value::mapping()),
        Value::Mapping(_) => Ok(value),
        _ => Err(Error::ConfigNotMapping {
            path: path.to_path_buf(),
        }),
    }
}

fn parse_value(content: &str, path: &Path) -> Result<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| Error::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(Value::from(yaml))
}
