//! Connector entry point.
//!
//! A connector binary implements [`TapDefinition`] once and hands it to the
//! CLI dispatcher, which calls the operations below in a fixed order:
//! `info`, `validate_config`, then `discover_streams` or `load_streams`.

use serde_json::{json, Value};
use streamtap_types::catalog::Catalog;
use streamtap_types::plugin::PluginInfo;
use streamtap_types::TapError;

use crate::config::TapConfig;
use crate::stream::TapStream;

/// Streams produced by a connector.
pub type StreamSet = Vec<Box<dyn TapStream>>;

pub trait TapDefinition {
    fn info(&self) -> PluginInfo;

    /// JSON schema for the connector's settings.
    fn config_schema(&self) -> Value {
        json!({"type": "object"})
    }

    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] listing every violation.
    fn validate_config(&self, config: &TapConfig) -> Result<(), TapError> {
        config.validate_against(&self.info().name, &self.config_schema())
    }

    /// Streams this connector can describe without an input catalog.
    ///
    /// # Errors
    ///
    /// The default returns [`TapError::DiscoveryNotSupported`].
    fn discover_streams(&self, _config: &TapConfig) -> Result<StreamSet, TapError> {
        Err(TapError::DiscoveryNotSupported {
            tap: self.info().name,
        })
    }

    /// Streams to sync. Defaults to the discovered set.
    ///
    /// # Errors
    ///
    /// Propagates discovery or configuration errors.
    fn load_streams(
        &self,
        config: &TapConfig,
        _catalog: Option<&Catalog>,
    ) -> Result<StreamSet, TapError> {
        self.discover_streams(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl TapDefinition for Bare {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("tap-bare", "0.0.1")
        }
    }

    #[test]
    fn discovery_unsupported_by_default() {
        let err = Bare.discover_streams(&TapConfig::new()).err().unwrap();
        assert!(matches!(err, TapError::DiscoveryNotSupported { ref tap } if tap == "tap-bare"));
        assert!(Bare.load_streams(&TapConfig::new(), None).is_err());
    }

    #[test]
    fn default_schema_accepts_any_object() {
        assert!(Bare.validate_config(&TapConfig::new()).is_ok());
    }
}
