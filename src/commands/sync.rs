use super::{Host, current_dir};
use crate::config::Config;
use crate::fetch::HttpClient;
use crate::progress::{ProgressReporter, RequestTracker};
use crate::snapshot::Artifact;
use crate::sync::{Credentials, SyncDriver};
use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Args;
use core::time::Duration;
use std::io::Write;

/// Log target for the sync command
const LOG_TARGET: &str = "commands";

/// How long a run has to be busy before the progress bar appears
const PROGRESS_DELAY: Duration = Duration::from_secs(2);

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Configuration file, `org-snapshot.yaml` in the current directory by default
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory to write the snapshot files to
    #[arg(long, value_name = "DIR")]
    pub assets_dir: Option<Utf8PathBuf>,

    /// GitHub organization to collect
    #[arg(long, value_name = "NAME", env = "ORG_SNAPSHOT_ORGANIZATION")]
    pub organization: Option<String>,

    /// Token for the GitHub API
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Token for the CMS GraphQL API
    #[arg(long, value_name = "TOKEN", env = "CMS_TOKEN", hide_env_values = true)]
    pub cms_token: Option<String>,

    /// Only produce these snapshot files
    #[arg(long, value_enum, value_delimiter = ',', num_args = 1..)]
    pub only: Vec<Artifact>,

    /// Never draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Load the configuration, apply command-line overrides and run one sync.
pub async fn sync_snapshots<H: Host>(host: &mut H, args: &SyncArgs) -> Result<()> {
    let mut config = Config::load(&current_dir()?, args.config.as_deref())?;
    if let Some(dir) = &args.assets_dir {
        config.assets_dir.clone_from(dir);
    }
    if let Some(organization) = &args.organization {
        config.organization.clone_from(organization);
    }
    config.validate()?;

    let tracker = RequestTracker::new(ProgressReporter::new(PROGRESS_DELAY, !args.no_progress));
    let http = HttpClient::new(config.http.to_settings())?.with_tracker(tracker.clone());

    let credentials = Credentials {
        github_token: args.github_token.clone(),
        cms_token: args.cms_token.clone(),
    };
    let driver = SyncDriver::new(config, credentials, &http, Utc::now()).only(args.only.iter().copied());

    let result = driver.run().await;
    tracker.progress().finish_and_clear();

    for (source, counts) in tracker.counts() {
        log::info!(target: LOG_TARGET, "{source}: {} request(s)", counts.issued);
    }

    let summary = result?;
    if summary.degraded_units() > 0 {
        log::warn!(
            target: LOG_TARGET,
            "The snapshot is incomplete: {} project(s) without GitHub data, {} repository(ies) without contributors",
            summary.unenriched_projects,
            summary.failed_repositories
        );
    }

    writeln!(host.output(), "Synced {summary}")?;
    Ok(())
}
