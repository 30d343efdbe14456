use crate::error::TallyError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BRANCH: &str = "main";

/// Extensions counted as image contributions when a file is added.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".svg", ".webp", ".ico",
];

/// One way the tracked user has signed commits: `"Name <email>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Both parts must be non-empty after trimming.
    pub fn new(name: &str, email: &str) -> Option<Self> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() {
            return None;
        }
        Some(Self(format!("{name} <{email}>")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commit reference as reported by one source, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCommit {
    pub sha: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CandidateCommit {
    pub fn new(sha: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            sha: sha.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub images: u64,
}

/// The persisted unit. `index` is reassigned on every save; the sha is the
/// last path segment of `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatsRecord {
    pub index: usize,
    pub url: String,
    pub additions: u64,
    pub deletions: u64,
    pub images: u64,
    pub timestamp: DateTime<Utc>,
}

impl CommitStatsRecord {
    pub fn new(url: String, stats: CommitStats, timestamp: DateTime<Utc>) -> Self {
        Self {
            index: 0,
            url,
            additions: stats.additions,
            deletions: stats.deletions,
            images: stats.images,
            timestamp,
        }
    }

    pub fn sha(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    pub fn stats(&self) -> CommitStats {
        CommitStats {
            additions: self.additions,
            deletions: self.deletions,
            images: self.images,
        }
    }
}

/// Summary block stored next to the records. Always derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub total_commits: usize,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_images: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CacheMetadata {
    pub fn summarize(records: &[CommitStatsRecord]) -> Self {
        let totals = ContributionTotals::from_records(records);
        Self {
            total_commits: records.len(),
            total_additions: totals.total_additions,
            total_deletions: totals.total_deletions,
            total_images: totals.total_images,
            last_updated: None,
        }
    }
}

/// The aggregate handed to reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionTotals {
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_images: u64,
}

impl ContributionTotals {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CommitStatsRecord>,
    {
        records.into_iter().fold(Self::default(), |mut acc, r| {
            acc.add_stats(&r.stats());
            acc
        })
    }

    pub fn add_stats(&mut self, stats: &CommitStats) {
        self.total_additions += stats.additions;
        self.total_deletions += stats.deletions;
        self.total_images += stats.images;
    }

    pub fn add(&mut self, other: &ContributionTotals) {
        self.total_additions += other.total_additions;
        self.total_deletions += other.total_deletions;
        self.total_images += other.total_images;
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// A repository to analyze: `owner/name[@branch]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl RepoTarget {
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn commit_url(&self, sha: &str) -> String {
        format!("https://github.com/{}/{}/commit/{}", self.owner, self.name, sha)
    }
}

impl FromStr for RepoTarget {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repo, branch) = match s.split_once('@') {
            Some((repo, branch)) => (repo, branch.trim()),
            None => (s, DEFAULT_BRANCH),
        };
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| TallyError::InvalidTarget(format!("expected OWNER/REPO, got '{s}'")))?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') || branch.is_empty() {
            return Err(TallyError::InvalidTarget(format!(
                "expected OWNER/REPO[@BRANCH], got '{s}'"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch: branch.to_string(),
        })
    }
}

impl fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Accepts RFC3339, naive ISO-8601 (read as UTC) and bare `YYYY-MM-DD`.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    date.and_hms_opt(0, 0, 0)
        .map(|datetime| Utc.from_utc_datetime(&datetime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_name_and_email() {
        assert_eq!(
            Identity::new("Jane Doe", "jane@example.com").map(|i| i.to_string()),
            Some("Jane Doe <jane@example.com>".to_string())
        );
        assert!(Identity::new("", "jane@example.com").is_none());
        assert!(Identity::new("Jane", "  ").is_none());
    }

    #[test]
    fn target_parses_branch_suffix() {
        let t: RepoTarget = "octo/widgets@develop".parse().unwrap();
        assert_eq!(t.owner, "octo");
        assert_eq!(t.name, "widgets");
        assert_eq!(t.branch, "develop");

        let t: RepoTarget = "octo/widgets".parse().unwrap();
        assert_eq!(t.branch, DEFAULT_BRANCH);
        assert_eq!(t.key(), "octo/widgets");

        assert!("widgets".parse::<RepoTarget>().is_err());
        assert!("octo/".parse::<RepoTarget>().is_err());
        assert!("a/b/c".parse::<RepoTarget>().is_err());
    }

    #[test]
    fn record_sha_comes_from_url() {
        let target: RepoTarget = "octo/widgets".parse().unwrap();
        let ts = parse_timestamp("2024-01-01").unwrap();
        let record = CommitStatsRecord::new(target.commit_url("abc123"), CommitStats::default(), ts);
        assert_eq!(record.sha(), "abc123");
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn metadata_is_derived_from_records() {
        let ts = parse_timestamp("2024-01-01").unwrap();
        let records = vec![
            CommitStatsRecord::new("u/a".into(), CommitStats { additions: 5, deletions: 1, images: 0 }, ts),
            CommitStatsRecord::new("u/b".into(), CommitStats { additions: 2, deletions: 0, images: 3 }, ts),
        ];
        let meta = CacheMetadata::summarize(&records);
        assert_eq!(meta.total_commits, 2);
        assert_eq!(meta.total_additions, 7);
        assert_eq!(meta.total_deletions, 1);
        assert_eq!(meta.total_images, 3);
    }
}
