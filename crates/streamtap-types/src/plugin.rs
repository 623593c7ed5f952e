//! Plugin identity reported by `--version` and `--about`.

use serde::{Deserialize, Serialize};

/// Feature a tap advertises to orchestrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Sync,
    Catalog,
    State,
    Discover,
}

impl Capability {
    /// Capabilities every streamtap connector supports.
    pub const DEFAULT: [Capability; 4] = [Self::Sync, Self::Catalog, Self::State, Self::Discover];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Catalog => "catalog",
            Self::State => "state",
            Self::Discover => "discover",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, version and description of a tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<Capability>,
}

fn default_capabilities() -> Vec<Capability> {
    Capability::DEFAULT.to_vec()
}

impl PluginInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            capabilities: default_capabilities(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `<name> v<version>`, as printed by `--version`.
    #[must_use]
    pub fn version_line(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_cover_singer_set() {
        let info = PluginInfo::new("tap-gitlab", "0.1.0");
        let caps: Vec<&str> = info.capabilities.iter().map(|c| c.as_str()).collect();
        assert_eq!(caps, vec!["sync", "catalog", "state", "discover"]);
    }

    #[test]
    fn version_line_format() {
        assert_eq!(PluginInfo::new("tap-x", "1.2.3").version_line(), "tap-x v1.2.3");
    }

    #[test]
    fn deserialize_fills_capabilities() {
        let info: PluginInfo =
            serde_json::from_str(r#"{"name":"t","version":"0"}"#).unwrap();
        assert_eq!(info.capabilities.len(), 4);
        assert!(info.description.is_empty());
    }
}
