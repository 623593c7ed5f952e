//! GitLab streams.
//!
//! Project-scoped resources are partitioned over `project_ids`, epics over
//! `group_ids`. Epic issues are partitioned by the epics the `epics` stream
//! enqueued while syncing, so they only run after it.

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Url;
use serde_json::Value;
use streamtap_sdk::prelude::*;

use crate::client::GitlabClient;
use crate::schemas;

/// A GitLab API resource exposed as a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Projects,
    Releases,
    Issues,
    Commits,
    Epics,
    EpicIssues,
}

const PROJECTS: Partitioning = Partitioning::ConfigList {
    setting: "project_ids",
    binding: "project_id",
};

const GROUPS: Partitioning = Partitioning::ConfigList {
    setting: "group_ids",
    binding: "group_id",
};

impl Resource {
    pub const ALL: [Resource; 6] = [
        Self::Projects,
        Self::Releases,
        Self::Issues,
        Self::Commits,
        Self::Epics,
        Self::EpicIssues,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Releases => "releases",
            Self::Issues => "issues",
            Self::Commits => "commits",
            Self::Epics => "epics",
            Self::EpicIssues => "epic_issues",
        }
    }

    /// Path template; `{name}` segments are filled from request params.
    fn path(self) -> &'static str {
        match self {
            Self::Projects => "/projects/{project_id}",
            Self::Releases => "/projects/{project_id}/releases",
            Self::Issues => "/projects/{project_id}/issues",
            Self::Commits => "/projects/{project_id}/repository/commits",
            Self::Epics => "/groups/{group_id}/epics",
            Self::EpicIssues => "/groups/{group_id}/epics/{epic_iid}/issues",
        }
    }

    fn fixed_query(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Projects => &[("statistics", "1")],
            Self::Issues => &[("scope", "all")],
            Self::Commits => &[("with_stats", "true")],
            Self::Releases | Self::Epics | Self::EpicIssues => &[],
        }
    }

    /// Query parameter carrying `start_date`, if the endpoint filters by date.
    fn date_filter(self) -> Option<&'static str> {
        match self {
            Self::Issues | Self::Epics => Some("updated_after"),
            Self::Commits => Some("since"),
            Self::Projects | Self::Releases | Self::EpicIssues => None,
        }
    }

    /// Whether the stream reads `group_ids` rather than `project_ids`.
    #[must_use]
    pub fn is_group_scoped(self) -> bool {
        matches!(self, Self::Epics | Self::EpicIssues)
    }

    fn descriptor(self) -> StreamDescriptor {
        match self {
            Self::Projects => StreamDescriptor::new(self.name(), schemas::projects()).primary_keys(["id"]),
            Self::Releases => StreamDescriptor::new(self.name(), schemas::releases())
                .primary_keys(["project_id", "commit_id", "tag_name"]),
            Self::Issues => StreamDescriptor::new(self.name(), schemas::issues()).primary_keys(["id"]),
            Self::Commits => StreamDescriptor::new(self.name(), schemas::commits()).primary_keys(["id"]),
            Self::Epics => StreamDescriptor::new(self.name(), schemas::epics()).primary_keys(["id"]),
            Self::EpicIssues => StreamDescriptor::new(self.name(), schemas::epic_issues())
                .primary_keys(["id"])
                .parent(Self::Epics.name()),
        }
    }
}

pub struct GitlabStream {
    resource: Resource,
    descriptor: StreamDescriptor,
    client: GitlabClient,
}

impl GitlabStream {
    #[must_use]
    pub fn new(resource: Resource, client: GitlabClient) -> Self {
        Self {
            resource,
            descriptor: resource.descriptor(),
            client,
        }
    }

    fn request(&self, params: &Params) -> Result<(Url, Vec<(String, String)>), TapError> {
        let segments = path_segments(self.name(), self.resource.path(), params)?;
        let mut query: Vec<(String, String)> = self
            .resource
            .fixed_query()
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        if let (Some(filter), Some(start)) = (self.resource.date_filter(), params.get("start_date")) {
            query.push((filter.to_string(), text(start)));
        }
        let url = self.client.url(segments.iter().map(String::as_str))?;
        Ok((url, query))
    }
}

impl TapStream for GitlabStream {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn partitioning(&self) -> Partitioning {
        match self.resource {
            Resource::Epics => GROUPS,
            Resource::EpicIssues => Partitioning::Pending,
            Resource::Projects | Resource::Releases | Resource::Issues | Resource::Commits => {
                PROJECTS
            }
        }
    }

    fn params(
        &self,
        substream: Option<&SubstreamId>,
        config: &TapConfig,
        state: &BookmarkState,
    ) -> Result<Params, TapError> {
        let mut params = substream_params(substream)?;
        if let Some(start) = config.get("start_date") {
            params.insert("start_date".into(), start.clone());
        }
        if self.resource == Resource::EpicIssues {
            // Epic ids only exist in state once `epics` has enqueued them.
            let partition = substream
                .and_then(|id| state.partition(self.name(), id))
                .filter(|p| p.contains_key("epic_iid"))
                .ok_or_else(|| {
                    TapError::dependency(
                        self.name(),
                        "Cannot sync epic issues without already known epic IDs.",
                    )
                })?;
            params.extend(partition.clone());
        }
        Ok(params)
    }

    fn post_process(
        &self,
        mut record: Record,
        ctx: &mut RecordContext<'_>,
    ) -> Result<Option<Record>, TapError> {
        match self.resource {
            Resource::Releases => {
                let project_id = ctx.params.get("project_id").cloned().unwrap_or(Value::Null);
                let commit_id = record
                    .get("commit")
                    .and_then(|c| c.get("id"))
                    .cloned()
                    .unwrap_or(Value::Null);
                record.insert("project_id".into(), project_id);
                record.insert("commit_id".into(), commit_id);
            }
            Resource::Epics => {
                let iid = record
                    .get("iid")
                    .filter(|v| !v.is_null())
                    .map(text)
                    .ok_or_else(|| TapError::fetch(self.name(), "epic record has no 'iid'"))?;
                let group_id = ctx
                    .params
                    .get("group_id")
                    .or_else(|| record.get("group_id"))
                    .map(text)
                    .ok_or_else(|| TapError::fetch(self.name(), "epic record has no 'group_id'"))?;
                let substream =
                    SubstreamId::from_bindings([("group_id", group_id.as_str()), ("epic_iid", iid.as_str())])?;
                ctx.ensure_substream_state_pending(Resource::EpicIssues.name(), &substream)?;
            }
            Resource::Projects | Resource::Issues | Resource::Commits | Resource::EpicIssues => {}
        }
        Ok(Some(record))
    }

    fn records<'a>(&'a self, params: &'a Params) -> BoxStream<'a, Result<Record, TapError>> {
        match self.request(params) {
            Ok((url, query)) => self.client.paginate(self.name(), url, query),
            Err(e) => stream::iter([Err(e)]).boxed(),
        }
    }
}

/// All six streams sharing one client.
#[must_use]
pub fn all(client: &GitlabClient) -> StreamSet {
    Resource::ALL
        .into_iter()
        .map(|resource| Box::new(GitlabStream::new(resource, client.clone())) as Box<dyn TapStream>)
        .collect()
}

/// Path segments of `template`, with `{name}` segments taken from params.
fn path_segments(stream: &str, template: &str, params: &Params) -> Result<Vec<String>, TapError> {
    template
        .trim_start_matches('/')
        .split('/')
        .map(|segment| {
            let Some(key) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                return Ok(segment.to_string());
            };
            params
                .get(key)
                .filter(|v| !v.is_null())
                .map(text)
                .ok_or_else(|| {
                    TapError::config(format!("stream '{stream}' needs '{key}' to build its request path"))
                })
        })
        .collect()
}

/// Scalar as plain text, without JSON quotes for strings.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::Config;

    fn client() -> GitlabClient {
        GitlabClient::new(&Config {
            auth_token: "token".into(),
            api_url: "https://gitlab.example.com/api/v4".into(),
            start_date: None,
            user_agent: None,
        })
        .unwrap()
    }

    fn stream(resource: Resource) -> GitlabStream {
        GitlabStream::new(resource, client())
    }

    fn config(value: Value) -> TapConfig {
        TapConfig::from_value(value).unwrap()
    }

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn project_substreams_follow_config() {
        let ids = stream(Resource::Issues)
            .substreams(&config(json!({"project_ids": ["ns/proj"]})), &BookmarkState::new())
            .unwrap();
        assert_eq!(ids, Some(vec![SubstreamId::new("project_id=ns/proj")]));
    }

    #[test]
    fn params_include_start_date_when_configured() {
        let issues = stream(Resource::Issues);
        let id = SubstreamId::new("project_id=ns/proj");
        let with = issues
            .params(
                Some(&id),
                &config(json!({"start_date": "2024-01-01T00:00:00Z"})),
                &BookmarkState::new(),
            )
            .unwrap();
        assert_eq!(
            Value::Object(with),
            json!({"project_id": "ns/proj", "start_date": "2024-01-01T00:00:00Z"})
        );

        let without = issues.params(Some(&id), &config(json!({})), &BookmarkState::new()).unwrap();
        assert_eq!(Value::Object(without), json!({"project_id": "ns/proj"}));
    }

    #[test]
    fn request_encodes_path_and_adds_filters() {
        let (url, query) = stream(Resource::Issues)
            .request(&params(json!({"project_id": "ns/proj", "start_date": "2024-01-01"})))
            .unwrap();
        assert_eq!(url.as_str(), "https://gitlab.example.com/api/v4/projects/ns%2Fproj/issues");
        assert_eq!(
            query,
            vec![
                ("scope".to_string(), "all".to_string()),
                ("updated_after".to_string(), "2024-01-01".to_string()),
            ]
        );

        let (_, query) = stream(Resource::Commits)
            .request(&params(json!({"project_id": "1"})))
            .unwrap();
        assert_eq!(query, vec![("with_stats".to_string(), "true".to_string())]);
    }

    #[test]
    fn missing_path_param_is_reported() {
        let err = stream(Resource::EpicIssues)
            .request(&params(json!({"group_id": "7"})))
            .unwrap_err();
        assert!(err.to_string().contains("epic_iid"));
    }

    #[test]
    fn epic_issues_require_known_epic() {
        let err = stream(Resource::EpicIssues)
            .params(
                Some(&SubstreamId::new("group_id=7,epic_iid=3")),
                &config(json!({})),
                &BookmarkState::new(),
            )
            .unwrap_err();
        match err {
            TapError::DependencyState { stream, message } => {
                assert_eq!(stream, "epic_issues");
                assert_eq!(message, "Cannot sync epic issues without already known epic IDs.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn epics_enqueue_epic_issues() {
        let epics = stream(Resource::Epics);
        let id = SubstreamId::new("group_id=7");
        let request = params(json!({"group_id": "7"}));
        let tap_config = config(json!({}));
        let mut state = BookmarkState::new();

        let mut ctx = RecordContext::new("epics", Some(&id), &request, &tap_config, &mut state);
        let record = params(json!({"id": 100, "iid": 3, "group_id": 7, "labels": []}));
        assert!(epics.post_process(record, &mut ctx).unwrap().is_some());

        let expected = SubstreamId::new("group_id=7,epic_iid=3");
        assert_eq!(state.substream_ids("epic_issues"), vec![expected.clone()]);

        let epic_issues = stream(Resource::EpicIssues);
        let p = epic_issues.params(Some(&expected), &tap_config, &state).unwrap();
        assert_eq!(Value::Object(p), json!({"group_id": "7", "epic_iid": "3"}));
    }

    #[test]
    fn epic_without_iid_fails() {
        let request = params(json!({"group_id": "7"}));
        let tap_config = config(json!({}));
        let mut state = BookmarkState::new();
        let mut ctx = RecordContext::new("epics", None, &request, &tap_config, &mut state);
        let err = stream(Resource::Epics)
            .post_process(params(json!({"id": 100})), &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("iid"));
    }

    #[test]
    fn releases_gain_key_fields() {
        let request = params(json!({"project_id": "ns/proj"}));
        let tap_config = config(json!({}));
        let mut state = BookmarkState::new();
        let mut ctx = RecordContext::new("releases", None, &request, &tap_config, &mut state);
        let out = stream(Resource::Releases)
            .post_process(params(json!({"tag_name": "v1", "commit": {"id": "abc"}})), &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(out["project_id"], "ns/proj");
        assert_eq!(out["commit_id"], "abc");
    }

    #[test]
    fn descriptors_are_valid() {
        for resource in Resource::ALL {
            resource.descriptor().validate().unwrap();
        }
        assert_eq!(
            Resource::EpicIssues.descriptor().parent_streams,
            vec!["epics".to_string()]
        );
    }
}
