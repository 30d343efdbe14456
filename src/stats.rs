use crate::error::Result;
use crate::model::{CommitStats, IMAGE_EXTENSIONS};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Other,
}

impl ChangeStatus {
    /// Hosting API `status` strings.
    pub fn from_api(status: &str) -> Self {
        match status {
            "added" => ChangeStatus::Added,
            "modified" | "changed" => ChangeStatus::Modified,
            "removed" => ChangeStatus::Removed,
            "renamed" => ChangeStatus::Renamed,
            "copied" => ChangeStatus::Copied,
            _ => ChangeStatus::Other,
        }
    }
}

/// One changed file. Line counts are `None` when they could not be read
/// as numbers (binary files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

/// Anything that can list the changed files of a single commit.
pub trait CommitDetailSource {
    fn commit_files(&self, sha: &str) -> Result<Vec<FileChange>>;
}

pub fn is_image(path: &str) -> bool {
    let lower = path.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn summarize(files: &[FileChange]) -> CommitStats {
    let mut stats = CommitStats::default();
    for file in files {
        if let (Some(added), Some(deleted)) = (file.additions, file.deletions) {
            stats.additions += added;
            stats.deletions += deleted;
        }
        if file.status == ChangeStatus::Added && is_image(&file.path) {
            stats.images += 1;
        }
    }
    stats
}

/// Asks `primary` first and `secondary` only when `primary` cannot answer.
pub struct WithFallback<'a, P: ?Sized, S: ?Sized> {
    primary: &'a P,
    secondary: &'a S,
}

impl<'a, P: ?Sized, S: ?Sized> WithFallback<'a, P, S> {
    pub fn new(primary: &'a P, secondary: &'a S) -> Self {
        Self { primary, secondary }
    }
}

impl<P, S> CommitDetailSource for WithFallback<'_, P, S>
where
    P: CommitDetailSource + ?Sized,
    S: CommitDetailSource + ?Sized,
{
    fn commit_files(&self, sha: &str) -> Result<Vec<FileChange>> {
        match self.primary.commit_files(sha) {
            Ok(files) => Ok(files),
            Err(e) => {
                debug!(sha, error = %e, "falling back for commit detail");
                self.secondary.commit_files(sha)
            }
        }
    }
}

/// Stats for one commit. A retrieval failure is returned, never a zero
/// record, so the caller can leave the commit uncached and retry later.
pub fn compute<S: CommitDetailSource + ?Sized>(source: &S, sha: &str) -> Result<CommitStats> {
    let files = source.commit_files(sha).map_err(|e| {
        warn!(sha, error = %e, "commit detail unavailable");
        e
    })?;
    Ok(summarize(&files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;
    use std::collections::HashMap;

    struct FixedDetails(HashMap<String, Vec<FileChange>>);

    impl CommitDetailSource for FixedDetails {
        fn commit_files(&self, sha: &str) -> Result<Vec<FileChange>> {
            self.0
                .get(sha)
                .cloned()
                .ok_or_else(|| TallyError::Transport(format!("no such commit {sha}")))
        }
    }

    fn change(path: &str, status: ChangeStatus, add: Option<u64>, del: Option<u64>) -> FileChange {
        FileChange {
            path: path.to_string(),
            status,
            additions: add,
            deletions: del,
        }
    }

    #[test]
    fn added_image_and_modified_text() {
        let files = vec![
            change("logo.png", ChangeStatus::Added, None, None),
            change("readme.md", ChangeStatus::Modified, Some(3), Some(1)),
        ];
        assert_eq!(
            summarize(&files),
            CommitStats { additions: 3, deletions: 1, images: 1 }
        );
    }

    #[test]
    fn only_added_images_count() {
        let files = vec![
            change("a/Banner.JPG", ChangeStatus::Added, Some(0), Some(0)),
            change("b/icon.svg", ChangeStatus::Modified, Some(4), Some(4)),
            change("c/old.gif", ChangeStatus::Renamed, Some(0), Some(0)),
            change("d/notes.txt", ChangeStatus::Added, Some(10), Some(0)),
        ];
        assert_eq!(
            summarize(&files),
            CommitStats { additions: 14, deletions: 4, images: 1 }
        );
    }

    #[test]
    fn lookup_is_repeatable_and_failure_is_reported() {
        let mut map = HashMap::new();
        map.insert(
            "abc".to_string(),
            vec![change("src/lib.rs", ChangeStatus::Modified, Some(7), Some(2))],
        );
        let source = FixedDetails(map);

        let first = compute(&source, "abc").unwrap();
        assert_eq!(first, compute(&source, "abc").unwrap());
        assert_eq!(first.additions, 7);
        assert!(matches!(compute(&source, "missing"), Err(TallyError::Transport(_))));
    }

    #[test]
    fn fallback_answers_what_primary_cannot() {
        let mut local = HashMap::new();
        local.insert(
            "abc".to_string(),
            vec![change("a.rs", ChangeStatus::Modified, Some(1), Some(0))],
        );
        let mut remote = HashMap::new();
        remote.insert(
            "abc".to_string(),
            vec![change("a.rs", ChangeStatus::Modified, Some(99), Some(0))],
        );
        remote.insert(
            "def".to_string(),
            vec![change("b.rs", ChangeStatus::Modified, Some(4), Some(2))],
        );
        let (local, remote) = (FixedDetails(local), FixedDetails(remote));
        let source = WithFallback::new(&local, &remote);

        assert_eq!(compute(&source, "abc").unwrap().additions, 1);
        assert_eq!(
            compute(&source, "def").unwrap(),
            CommitStats { additions: 4, deletions: 2, images: 0 }
        );
        assert!(compute(&source, "ghi").is_err());
    }

    #[test]
    fn api_status_strings() {
        assert_eq!(ChangeStatus::from_api("added"), ChangeStatus::Added);
        assert_eq!(ChangeStatus::from_api("removed"), ChangeStatus::Removed);
        assert_eq!(ChangeStatus::from_api("unchanged"), ChangeStatus::Other);
    }
}
