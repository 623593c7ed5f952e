//! Tap configuration loading with environment variable substitution.
//!
//! Config, catalog and state inputs are each accepted either as a file path
//! or as an in-memory value ([`Input`]). Files ending in `.yaml`/`.yml` are
//! parsed as YAML, everything else as JSON.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use streamtap_types::TapError;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// A document given either by path or directly.
#[derive(Debug, Clone)]
pub enum Input<T> {
    Path(PathBuf),
    Inline(T),
}

impl<T> From<PathBuf> for Input<T> {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl<T: DeserializeOwned> Input<T> {
    /// Materialize the document. Paths are read and parsed as-is.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when the file cannot be read or
    /// parsed.
    pub fn load(self) -> Result<T, TapError> {
        match self {
            Self::Inline(value) => Ok(value),
            Self::Path(path) => {
                let content = read_file(&path)?;
                parse_document(&path, &content)
            }
        }
    }
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns [`TapError::Configuration`] naming every referenced variable that
/// is not set.
pub fn substitute_env_vars(input: &str) -> Result<String, TapError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(TapError::config(format!(
            "Missing environment variable(s): {}",
            missing.join(", ")
        )));
    }

    Ok(result)
}

fn read_file(path: &Path) -> Result<String, TapError> {
    std::fs::read_to_string(path)
        .map_err(|e| TapError::config(format!("Failed to read {}: {e}", path.display())))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, TapError> {
    if is_yaml(path) {
        serde_yaml::from_str(content)
            .map_err(|e| TapError::config(format!("Failed to parse YAML {}: {e}", path.display())))
    } else {
        serde_json::from_str(content)
            .map_err(|e| TapError::config(format!("Failed to parse JSON {}: {e}", path.display())))
    }
}

/// Validated tap settings: a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TapConfig(Map<String, Value>);

impl TapConfig {
    /// Empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. `null` is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] for anything but an object or null.
    pub fn from_value(value: Value) -> Result<Self, TapError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(TapError::config(format!(
                "config must be a JSON object, got {other}"
            ))),
        }
    }

    /// Load from a path (with `${VAR}` substitution) or an inline value.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] on read, substitution or parse
    /// failure.
    pub fn load(input: Input<Value>) -> Result<Self, TapError> {
        let value = match input {
            Input::Inline(value) => value,
            Input::Path(path) => {
                let content = read_file(&path)?;
                let substituted = substitute_env_vars(&content)?;
                parse_document(&path, &substituted)?
            }
        };
        let config = Self::from_value(value)?;
        tracing::debug!(keys = config.0.len(), "Tap config loaded");
        Ok(config)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    /// Required string setting.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when the key is absent or not a
    /// string.
    pub fn require_str(&self, key: &str) -> Result<&str, TapError> {
        self.get_str(key)
            .ok_or_else(|| TapError::config(format!("missing required string setting '{key}'")))
    }

    /// Deserialize the whole config into a typed struct.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] with the serde message.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, TapError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| TapError::config(format!("invalid config: {e}")))
    }

    /// Validate against a JSON schema, reporting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when the schema is invalid or the
    /// config violates it.
    pub fn validate_against(&self, tap: &str, schema: &Value) -> Result<(), TapError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| TapError::config(format!("Invalid JSON Schema for tap '{tap}': {e}")))?;

        let instance = Value::Object(self.0.clone());
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| format!("  - {e}"))
            .collect();

        if !errors.is_empty() {
            return Err(TapError::config(format!(
                "Configuration validation failed for tap '{tap}':\n{}",
                errors.join("\n"),
            )));
        }

        tracing::debug!(tap, "Config schema validation passed");
        Ok(())
    }
}

impl TryFrom<Value> for TapConfig {
    type Error = TapError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
