use crate::cache::CacheStore;
use crate::cli::{CommonArgs, RunArgs};
use crate::identity::IdentitySet;
use crate::model::RepoTarget;
use crate::pipeline::{analyze_repository, RepoReport, RunOptions};
use crate::remote::GitHubClient;
use crate::report::{aggregate, output_json, output_summary, TallyOutput};
use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

pub fn exec(common: CommonArgs, args: RunArgs) -> anyhow::Result<()> {
    let user = common.require_user()?.to_string();
    let targets = args
        .targets
        .iter()
        .map(|t| t.parse::<RepoTarget>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid repository target")?;

    if common.token.is_none() {
        warn!("no API token given, requests are unauthenticated and heavily rate limited");
    }
    let api = GitHubClient::new(&common.api_url, common.token.clone())
        .context("Failed to build API client")?;
    let store = CacheStore::new(&common.cache_dir);
    let mut identities = IdentitySet::load(&common.identity_file);

    let options = RunOptions {
        username: user.clone(),
        checkouts: args.checkouts.clone(),
        max_pages: args.max_pages,
        identity_pages: args.identity_pages,
        show_progress: !args.json && console::Term::stderr().is_term(),
    };

    let reports: Vec<RepoReport> = targets
        .iter()
        .map(|target| analyze_repository(&api, &store, &mut identities, target, &options))
        .collect();

    if let Err(e) = identities.save() {
        warn!(error = %e, "could not persist learned identities");
    }

    let totals = aggregate(&reports);
    info!(
        repositories = reports.len(),
        additions = totals.total_additions,
        deletions = totals.total_deletions,
        images = totals.total_images,
        "run complete"
    );

    let output = TallyOutput {
        generated_at: Utc::now(),
        user,
        totals,
        repositories: reports,
    };
    if args.json {
        output_json(&output)
    } else {
        output_summary(&output)
    }
}
