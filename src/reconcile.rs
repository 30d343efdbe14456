//! Stale cache eviction.
//!
//! A cached commit that the current sources no longer report is only
//! evicted when its timestamp falls inside the window those sources
//! actually observed, i.e. at or after the oldest visible commit. Older
//! records are permanent history: paged out or otherwise unreachable, but
//! not evidence of a rewrite.

use crate::cache::RepositoryCache;
use crate::model::CandidateCommit;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Reconciliation {
    pub cache: RepositoryCache,
    pub evicted: Vec<String>,
    pub retained: Vec<String>,
}

impl Reconciliation {
    /// Eviction removed every record; the repository's entry should go.
    pub fn emptied(&self) -> bool {
        !self.evicted.is_empty() && self.cache.is_empty()
    }
}

/// Oldest authorship timestamp among the canonical commits.
pub fn observed_window_start(canonical: &[CandidateCommit]) -> Option<DateTime<Utc>> {
    canonical.iter().filter_map(|c| c.timestamp).min()
}

pub fn reconcile(mut cache: RepositoryCache, canonical: &[CandidateCommit]) -> Reconciliation {
    let visible: HashSet<&str> = canonical.iter().map(|c| c.sha.as_str()).collect();

    // Without a dated commit there is no observed window, so nothing is
    // provably gone.
    let Some(window_start) = observed_window_start(canonical) else {
        debug!(cached = cache.len(), "no observed window, keeping every cached record");
        return Reconciliation {
            cache,
            evicted: Vec::new(),
            retained: Vec::new(),
        };
    };

    let mut evicted = Vec::new();
    let mut retained = Vec::new();
    for record in cache.records() {
        let sha = record.sha();
        if visible.contains(sha) {
            continue;
        }
        if record.timestamp < window_start {
            retained.push(sha.to_string());
        } else {
            evicted.push(sha.to_string());
        }
    }
    evicted.sort();
    retained.sort();

    for sha in &evicted {
        cache.remove(sha);
    }

    if !evicted.is_empty() {
        info!(
            evicted = evicted.len(),
            window_start = %window_start,
            "evicted cache entries missing from the observed window"
        );
    }
    if !retained.is_empty() {
        debug!(retained = retained.len(), "kept cache entries older than the observed window");
    }

    Reconciliation {
        cache,
        evicted,
        retained,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_timestamp, CommitStats, CommitStatsRecord};
    use pretty_assertions::assert_eq;

    fn record(sha: &str, ts: &str, add: u64, del: u64) -> CommitStatsRecord {
        CommitStatsRecord::new(
            format!("https://github.com/octo/widgets/commit/{sha}"),
            CommitStats { additions: add, deletions: del, images: 0 },
            parse_timestamp(ts).unwrap(),
        )
    }

    fn candidate(sha: &str, ts: &str) -> CandidateCommit {
        CandidateCommit::new(sha, parse_timestamp(ts))
    }

    #[test]
    fn rewritten_commit_inside_window_is_evicted() {
        let cache = RepositoryCache::from_records(vec![record("a", "2024-01-01", 5, 1)]);
        let canonical = vec![candidate("b", "2024-01-01T00:00:00Z"), candidate("c", "2024-02-01")];

        let result = reconcile(cache, &canonical);
        assert_eq!(result.evicted, vec!["a".to_string()]);
        assert!(result.cache.is_empty());
        assert!(result.emptied());
    }

    #[test]
    fn missing_commit_before_window_start_is_retained() {
        // The window starts at "b"; "a" is older, so its absence proves nothing.
        let cache = RepositoryCache::from_records(vec![record("a", "2024-01-01", 5, 1)]);
        let canonical = vec![candidate("b", "2024-02-01")];
        let result = reconcile(cache, &canonical);
        assert!(result.evicted.is_empty());
        assert_eq!(result.retained, vec!["a".to_string()]);
        assert_eq!(result.cache.len(), 1);
        assert!(!result.emptied());
    }

    #[test]
    fn commit_older_than_window_is_retained_untouched() {
        let original = record("a", "2024-01-01", 5, 1);
        let cache = RepositoryCache::from_records(vec![original.clone()]);
        let canonical = vec![candidate("x", "2024-03-01"), candidate("y", "2024-04-01")];

        let result = reconcile(cache, &canonical);
        assert!(result.evicted.is_empty());
        assert_eq!(result.cache.get("a"), Some(&original));
    }

    #[test]
    fn visible_commits_are_never_touched() {
        let cache = RepositoryCache::from_records(vec![
            record("a", "2024-01-01", 1, 0),
            record("b", "2024-02-01", 2, 0),
            record("gone", "2024-01-15", 3, 0),
        ]);
        let canonical = vec![candidate("a", "2024-01-01"), candidate("b", "2024-02-01")];

        let result = reconcile(cache, &canonical);
        assert_eq!(result.evicted, vec!["gone".to_string()]);
        assert!(result.cache.contains("a"));
        assert!(result.cache.contains("b"));
        assert!(!result.emptied());
    }

    #[test]
    fn boundary_timestamp_counts_as_observed() {
        let cache = RepositoryCache::from_records(vec![record("old", "2024-03-01", 1, 1)]);
        let canonical = vec![candidate("new", "2024-03-01")];
        let result = reconcile(cache, &canonical);
        assert_eq!(result.evicted, vec!["old".to_string()]);
    }

    #[test]
    fn empty_or_undated_canonical_keeps_everything() {
        let records = vec![record("a", "2024-01-01", 1, 0), record("b", "2024-06-01", 1, 0)];

        let result = reconcile(RepositoryCache::from_records(records.clone()), &[]);
        assert_eq!(result.cache.len(), 2);
        assert!(result.evicted.is_empty());

        let undated = vec![CandidateCommit::new("z", None)];
        let result = reconcile(RepositoryCache::from_records(records), &undated);
        assert_eq!(result.cache.len(), 2);
    }

    #[test]
    fn retention_and_eviction_laws_over_a_grid() {
        let days = ["2024-01-01", "2024-02-01", "2024-03-01", "2024-04-01", "2024-05-01"];
        for (i, cutoff) in days.iter().enumerate() {
            let cache = RepositoryCache::from_records(
                days.iter().map(|d| record(&format!("cached-{d}"), d, 1, 0)),
            );
            let canonical: Vec<CandidateCommit> = days[i..]
                .iter()
                .map(|d| candidate(&format!("fresh-{d}"), d))
                .collect();

            let result = reconcile(cache, &canonical);
            let window = parse_timestamp(cutoff).unwrap();
            for d in days {
                let sha = format!("cached-{d}");
                let older = parse_timestamp(d).unwrap() < window;
                assert_eq!(result.cache.contains(&sha), older, "{sha} with cutoff {cutoff}");
            }
        }
    }
}
