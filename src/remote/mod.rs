pub mod github;

use crate::error::Result;
use crate::stats::{CommitDetailSource, FileChange};
use chrono::{DateTime, Utc};

pub use github::GitHubClient;

/// Entries per page requested from the commit listing.
pub const PER_PAGE: usize = 100;

/// One entry of the hosting API's commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub authored_at: Option<DateTime<Utc>>,
}

/// The two hosting-API calls the core consumes.
pub trait HostingApi {
    /// One page (1-based) of commits filtered by author username and,
    /// when given, branch.
    fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        branch: Option<&str>,
        page: u32,
    ) -> Result<Vec<CommitSummary>>;

    fn commit_files(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<FileChange>>;
}

/// Per-commit detail through the hosting API for one repository.
pub struct RemoteDetails<'a, H: HostingApi + ?Sized> {
    api: &'a H,
    owner: &'a str,
    repo: &'a str,
}

impl<'a, H: HostingApi + ?Sized> RemoteDetails<'a, H> {
    pub fn new(api: &'a H, owner: &'a str, repo: &'a str) -> Self {
        Self { api, owner, repo }
    }
}

impl<H: HostingApi + ?Sized> CommitDetailSource for RemoteDetails<'_, H> {
    fn commit_files(&self, sha: &str) -> Result<Vec<FileChange>> {
        self.api.commit_files(self.owner, self.repo, sha)
    }
}
