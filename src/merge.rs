//! Combines the local-history and remote-API views of a repository into one
//! canonical commit set keyed by sha.

use crate::model::CandidateCommit;
use std::collections::{HashMap, HashSet};

/// Whether `remote` should replace `local` for the same sha. Ties, and the
/// case where neither side carries a timestamp, keep the local version.
fn remote_is_fresher(local: &CandidateCommit, remote: &CandidateCommit) -> bool {
    match (local.timestamp, remote.timestamp) {
        (Some(l), Some(r)) => r > l,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Last-writer-wins merge. A commit seen by only one source is always kept.
///
/// Output order: local commits first (in local order), then commits only the
/// remote source reported (in remote order).
pub fn merge(
    local: Option<Vec<CandidateCommit>>,
    remote: Option<Vec<CandidateCommit>>,
) -> Vec<CandidateCommit> {
    let (local, remote) = match (local, remote) {
        (None, None) => return Vec::new(),
        (Some(only), None) | (None, Some(only)) => return only,
        (Some(local), Some(remote)) => (local, remote),
    };

    let mut remote_by_sha: HashMap<&str, &CandidateCommit> = HashMap::with_capacity(remote.len());
    for commit in &remote {
        remote_by_sha.entry(commit.sha.as_str()).or_insert(commit);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
    let mut merged = Vec::with_capacity(local.len() + remote.len());

    for commit in &local {
        if !seen.insert(commit.sha.as_str()) {
            continue;
        }
        match remote_by_sha.get(commit.sha.as_str()) {
            Some(theirs) if remote_is_fresher(commit, theirs) => merged.push((*theirs).clone()),
            _ => merged.push(commit.clone()),
        }
    }

    for commit in &remote {
        if seen.insert(commit.sha.as_str()) {
            merged.push(commit.clone());
        }
    }

    merged
}
