use crate::error::{Result, TallyError};
use crate::identity::IdentitySet;
use crate::model::{CandidateCommit, RepoTarget};
use crate::remote::{HostingApi, PER_PAGE};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default bound on remote commit-listing pages.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Commit history of a locally present repository.
pub trait LocalHistory {
    /// Commits on `branch` whose author is exactly one of `identities`.
    fn commits_by(&self, identities: &IdentitySet, branch: &str) -> Result<Vec<CandidateCommit>>;
}

/// Every commit on `branch` authored by a known identity, each sha once.
pub fn local_history<L: LocalHistory + ?Sized>(
    history: &L,
    identities: &IdentitySet,
    branch: &str,
) -> Result<Vec<CandidateCommit>> {
    if identities.is_empty() {
        return Err(TallyError::IdentityUnavailable);
    }

    let mut seen = HashSet::new();
    let mut commits = history.commits_by(identities, branch)?;
    commits.retain(|commit| seen.insert(commit.sha.clone()));
    debug!(branch, commits = commits.len(), "local history read");
    Ok(commits)
}

/// The user's commits on the target branch, at most `max_pages` pages.
///
/// A failure on the first page is an error. A failure further on keeps the
/// pages already read: a shorter listing only narrows the observed window.
pub fn remote_history<H: HostingApi + ?Sized>(
    api: &H,
    target: &RepoTarget,
    author: &str,
    max_pages: u32,
) -> Result<Vec<CandidateCommit>> {
    let mut commits = Vec::new();
    for page in 1..=max_pages {
        let branch = Some(target.branch.as_str());
        let listing = match api.list_commits(&target.owner, &target.name, author, branch, page) {
            Ok(listing) => listing,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!(repo = %target.key(), page, error = %e, "stopping remote paging early");
                break;
            }
        };
        let exhausted = listing.len() < PER_PAGE;
        commits.extend(
            listing
                .into_iter()
                .map(|c| CandidateCommit::new(c.sha, c.authored_at)),
        );
        if exhausted {
            break;
        }
        if page == max_pages {
            debug!(repo = %target.key(), max_pages, "remote paging bound reached");
        }
    }
    Ok(commits)
}
