use crate::cache::CacheStore;
use crate::git::LocalRepo;
use crate::identity::{learn_into, IdentitySet};
use crate::merge::merge;
use crate::model::{CommitStatsRecord, ContributionTotals, RepoTarget};
use crate::reconcile::reconcile;
use crate::remote::{HostingApi, RemoteDetails};
use crate::sources::{local_history, remote_history};
use crate::stats::{compute, CommitDetailSource, WithFallback};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub username: String,
    pub checkouts: Option<PathBuf>,
    pub max_pages: u32,
    pub identity_pages: u32,
    pub show_progress: bool,
}

/// What one repository contributed, plus how the cache was used.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoReport {
    pub repository: String,
    pub totals: ContributionTotals,
    pub commits: usize,
    pub cache_hits: usize,
    pub computed: usize,
    /// Commits whose detail could not be retrieved; left uncached.
    pub failed: usize,
    pub evicted: usize,
    pub retained: usize,
}

impl RepoReport {
    pub fn hit_rate(&self) -> f64 {
        let seen = self.cache_hits + self.computed + self.failed;
        if seen == 0 {
            0.0
        } else {
            self.cache_hits as f64 * 100.0 / seen as f64
        }
    }
}

fn open_checkout(options: &RunOptions, target: &RepoTarget) -> Option<LocalRepo> {
    let path = options.checkouts.as_ref()?.join(&target.owner).join(&target.name);
    if !path.exists() {
        debug!(path = %path.display(), "no local checkout");
        return None;
    }
    match LocalRepo::open(&path) {
        Ok(repo) => Some(repo),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open local checkout");
            None
        }
    }
}

fn progress_bar(options: &RunOptions, len: usize) -> ProgressBar {
    if !options.show_progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Fetch, merge, reconcile, compute what is missing, save. Never fails:
/// every source or storage problem degrades to less data and a warning.
pub fn analyze_repository<H: HostingApi + ?Sized>(
    api: &H,
    store: &CacheStore,
    identities: &mut IdentitySet,
    target: &RepoTarget,
    options: &RunOptions,
) -> RepoReport {
    let key = target.key();
    info!(repo = %key, branch = %target.branch, "analyzing repository");

    learn_into(
        identities,
        api,
        &target.owner,
        &target.name,
        &options.username,
        options.identity_pages,
    );

    let checkout = open_checkout(options, target);
    let local = checkout.as_ref().and_then(|repo| {
        match local_history(repo, identities, &target.branch) {
            Ok(commits) => Some(commits),
            Err(e) => {
                warn!(repo = %key, error = %e, "local history unavailable");
                None
            }
        }
    });
    let remote = match remote_history(api, target, &options.username, options.max_pages) {
        Ok(commits) => Some(commits),
        Err(e) => {
            warn!(repo = %key, error = %e, "remote history unavailable");
            None
        }
    };

    let canonical = merge(local, remote);
    if canonical.is_empty() {
        info!(repo = %key, "no commits found");
    }

    let reconciled = reconcile(store.load(target), &canonical);
    if reconciled.emptied() {
        match store.remove(target) {
            Ok(_) => info!(repo = %key, "cache emptied by eviction, entry removed"),
            Err(e) => warn!(repo = %key, error = %e, "could not remove emptied cache"),
        }
    }
    let mut report = RepoReport {
        repository: key.clone(),
        commits: canonical.len(),
        evicted: reconciled.evicted.len(),
        retained: reconciled.retained.len(),
        ..RepoReport::default()
    };
    let mut cache = reconciled.cache;

    let remote_details = RemoteDetails::new(api, &target.owner, &target.name);
    let local_first = checkout
        .as_ref()
        .map(|repo| WithFallback::new(repo, &remote_details));
    let details: &dyn CommitDetailSource = match &local_first {
        Some(source) => source,
        None => &remote_details,
    };

    let missing: Vec<_> = canonical.iter().filter(|c| !cache.contains(&c.sha)).collect();
    report.cache_hits = canonical.len() - missing.len();

    let pb = progress_bar(options, missing.len());
    pb.set_message(format!("{} commit details", target.name));
    for commit in missing {
        pb.inc(1);
        let stats = match compute(details, &commit.sha) {
            Ok(stats) => stats,
            Err(_) => {
                report.failed += 1;
                continue;
            }
        };
        let timestamp = commit.timestamp.unwrap_or_else(|| {
            debug!(sha = %commit.sha, "commit has no timestamp, using current time");
            Utc::now()
        });
        cache.insert(CommitStatsRecord::new(target.commit_url(&commit.sha), stats, timestamp));
        report.computed += 1;
    }
    pb.finish_and_clear();

    if report.computed > 0 || report.evicted > 0 {
        if cache.is_empty() {
            debug!(repo = %key, "nothing left to store");
        } else if let Err(e) = store.save(target, &cache) {
            warn!(repo = %key, error = %e, "could not save cache");
        }
    }

    report.totals = ContributionTotals::from_records(cache.records());
    info!(
        repo = %key,
        hits = report.cache_hits,
        computed = report.computed,
        failed = report.failed,
        hit_rate = %format!("{:.1}%", report.hit_rate()),
        "cache usage"
    );
    if report.totals.is_zero() {
        warn!(repo = %key, "no contributions recorded");
    }
    report
}
