//! Singer tap for the GitLab REST API.
//!
//! Syncs projects, releases, issues and commits for configured projects, and
//! epics plus their issues for configured groups.

mod client;
pub mod config;
mod schemas;
mod streams;
mod tap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    streamtap_cli::main(tap::GitlabTap).await
}
