use super::{CommitSummary, HostingApi, PER_PAGE};
use crate::error::{Result, TallyError};
use crate::model::parse_timestamp;
use crate::stats::{ChangeStatus, FileChange};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitBody,
}

#[derive(Debug, Deserialize)]
struct ApiCommitBody {
    author: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    filename: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    additions: serde_json::Value,
    #[serde(default)]
    deletions: serde_json::Value,
}

impl From<ApiCommit> for CommitSummary {
    fn from(c: ApiCommit) -> Self {
        let (author_name, author_email, authored_at) = match c.commit.author {
            Some(sig) => (sig.name, sig.email, sig.date.as_deref().and_then(parse_timestamp)),
            None => (None, None, None),
        };
        Self {
            sha: c.sha,
            author_name,
            author_email,
            authored_at,
        }
    }
}

impl From<ApiFile> for FileChange {
    fn from(f: ApiFile) -> Self {
        Self {
            status: ChangeStatus::from_api(&f.status),
            additions: f.additions.as_u64(),
            deletions: f.deletions.as_u64(),
            path: f.filename,
        }
    }
}

/// Blocking GitHub REST client. No retries: a failed call is reported once.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gtally/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request
            .send()
            .map_err(|e| TallyError::Transport(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TallyError::Transport(format!("{url} returned {status}")));
        }
        let body = response
            .text()
            .map_err(|e| TallyError::Transport(format!("{url}: {e}")))?;
        serde_json::from_str(&body).map_err(|e| TallyError::Parse(format!("{url}: {e}")))
    }
}

impl HostingApi for GitHubClient {
    fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        branch: Option<&str>,
        page: u32,
    ) -> Result<Vec<CommitSummary>> {
        let url = format!("{}/repos/{owner}/{repo}/commits", self.api_url);
        let mut query = vec![
            ("author", author.to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(branch) = branch {
            query.push(("sha", branch.to_string()));
        }
        debug!(%owner, %repo, page, "listing commits");
        let commits: Vec<ApiCommit> = self.get_json(&url, &query)?;
        Ok(commits.into_iter().map(CommitSummary::from).collect())
    }

    fn commit_files(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<FileChange>> {
        let url = format!("{}/repos/{owner}/{repo}/commits/{sha}", self.api_url);
        let detail: ApiCommitDetail = self.get_json(&url, &[])?;
        Ok(detail.files.into_iter().map(FileChange::from).collect())
    }
}
