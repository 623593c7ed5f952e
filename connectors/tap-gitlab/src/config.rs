//! tap-gitlab configuration.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use streamtap_sdk::config::TapConfig;
use streamtap_sdk::types::TapError;

pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

/// Connection settings. Project and group lists are read by stream
/// partitioning straight from the raw config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Lower bound for `updated_after` / `since` filters.
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Config {
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when required settings are
    /// missing or malformed.
    pub fn from_tap(config: &TapConfig) -> Result<Self, TapError> {
        let parsed: Self = config.deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] for a blank token or an invalid
    /// `api_url`.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.auth_token.trim().is_empty() {
            return Err(TapError::config("auth_token must not be empty"));
        }
        self.base_url().map(|_| ())
    }

    /// `api_url` parsed as an HTTP(S) base URL.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when it does not parse or is not
    /// HTTP(S).
    pub fn base_url(&self) -> Result<Url, TapError> {
        let url = Url::parse(&self.api_url).map_err(|e| {
            TapError::config(format!("api_url '{}' is not a valid URL: {e}", self.api_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TapError::config(format!(
                "api_url '{}' must use http or https",
                self.api_url
            )));
        }
        Ok(url)
    }
}

/// Whether any group is configured; epic streams need at least one.
#[must_use]
pub fn has_groups(config: &TapConfig) -> bool {
    config.get_array("group_ids").is_some_and(|ids| !ids.is_empty())
}

/// JSON schema for tap-gitlab settings.
#[must_use]
pub fn schema() -> Value {
    let id_list = json!({
        "type": "array",
        "items": {"type": ["string", "integer"]}
    });
    json!({
        "type": "object",
        "properties": {
            "auth_token": {"type": "string", "description": "Personal access token sent as Private-Token"},
            "api_url": {"type": "string", "description": "GitLab API base URL", "default": DEFAULT_API_URL},
            "project_ids": merge(&id_list, "Project ids or namespaced paths, e.g. group/project"),
            "group_ids": merge(&id_list, "Group ids for epic streams"),
            "start_date": {"type": "string", "description": "Only sync items updated after this timestamp"},
            "user_agent": {"type": "string", "description": "User-Agent header for API requests"}
        },
        "required": ["auth_token", "project_ids"]
    })
}

fn merge(base: &Value, description: &str) -> Value {
    let mut out = base.clone();
    out["description"] = Value::String(description.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_config(value: Value) -> TapConfig {
        TapConfig::from_value(value).unwrap()
    }

    #[test]
    fn defaults_api_url() {
        let config = Config::from_tap(&tap_config(json!({"auth_token": "t", "project_ids": []}))).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.start_date.is_none());
    }

    #[test]
    fn rejects_blank_token() {
        let err = Config::from_tap(&tap_config(json!({"auth_token": " "}))).unwrap_err();
        assert!(err.to_string().contains("auth_token"));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = Config::from_tap(&tap_config(json!({"auth_token": "t", "api_url": "gitlab.com"})))
            .unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }

    #[test]
    fn rejects_other_schemes() {
        let err = Config::from_tap(&tap_config(json!({"auth_token": "t", "api_url": "ftp://gitlab.com"})))
            .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn schema_requires_token_and_projects() {
        let config = tap_config(json!({"project_ids": ["ns/proj"]}));
        let err = config.validate_against("tap-gitlab", &schema()).unwrap_err();
        assert!(err.to_string().contains("auth_token"));
        assert!(tap_config(json!({"auth_token": "t", "project_ids": ["ns/proj", 42]}))
            .validate_against("tap-gitlab", &schema())
            .is_ok());
    }

    #[test]
    fn groups_detection() {
        assert!(!has_groups(&tap_config(json!({}))));
        assert!(!has_groups(&tap_config(json!({"group_ids": []}))));
        assert!(has_groups(&tap_config(json!({"group_ids": [7]}))));
    }
}
