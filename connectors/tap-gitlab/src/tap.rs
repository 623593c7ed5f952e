use serde_json::Value;
use streamtap_sdk::prelude::*;

use crate::client::GitlabClient;
use crate::config::{self, Config};
use crate::streams::{self, Resource};

pub struct GitlabTap;

impl GitlabTap {
    fn client(config: &TapConfig) -> Result<GitlabClient, TapError> {
        GitlabClient::new(&Config::from_tap(config)?)
    }
}

impl TapDefinition for GitlabTap {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("tap-gitlab", env!("CARGO_PKG_VERSION"))
            .description("Singer tap for GitLab projects, issues, commits, releases and epics")
    }

    fn config_schema(&self) -> Value {
        config::schema()
    }

    fn discover_streams(&self, config: &TapConfig) -> Result<StreamSet, TapError> {
        Ok(streams::all(&Self::client(config)?))
    }

    fn load_streams(
        &self,
        config: &TapConfig,
        _catalog: Option<&Catalog>,
    ) -> Result<StreamSet, TapError> {
        let streams = self.discover_streams(config)?;
        if config::has_groups(config) {
            return Ok(streams);
        }
        tracing::info!("No group_ids configured, skipping epic streams");
        Ok(streams
            .into_iter()
            .filter(|s| {
                !Resource::ALL
                    .iter()
                    .any(|r| r.is_group_scoped() && r.name() == s.name())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(streams: &StreamSet) -> Vec<&str> {
        streams.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn discovery_lists_all_streams() {
        let config = TapConfig::from_value(json!({"auth_token": "t", "project_ids": [1]})).unwrap();
        let streams = GitlabTap.discover_streams(&config).unwrap();
        assert_eq!(
            names(&streams),
            vec!["projects", "releases", "issues", "commits", "epics", "epic_issues"]
        );
    }

    #[test]
    fn sync_skips_epics_without_groups() {
        let config = TapConfig::from_value(json!({"auth_token": "t", "project_ids": [1]})).unwrap();
        let streams = GitlabTap.load_streams(&config, None).unwrap();
        assert_eq!(names(&streams), vec!["projects", "releases", "issues", "commits"]);

        let config =
            TapConfig::from_value(json!({"auth_token": "t", "project_ids": [1], "group_ids": [9]}))
                .unwrap();
        assert_eq!(GitlabTap.load_streams(&config, None).unwrap().len(), 6);
    }

    #[test]
    fn discovery_needs_token() {
        assert!(GitlabTap.discover_streams(&TapConfig::new()).is_err());
    }

    #[test]
    fn epics_run_before_epic_issues() {
        let config =
            TapConfig::from_value(json!({"auth_token": "t", "project_ids": [1], "group_ids": [9]}))
                .unwrap();
        let tap = TapBuilder::new(GitlabTap.info())
            .config(config.clone())
            .streams(GitlabTap.load_streams(&config, None).unwrap())
            .output(Vec::new())
            .build()
            .unwrap();
        let order: Vec<&str> = tap.effective_streams().map(|s| s.name()).collect();
        let epics = order.iter().position(|n| *n == "epics").unwrap();
        let epic_issues = order.iter().position(|n| *n == "epic_issues").unwrap();
        assert!(epics < epic_issues);
    }
}
