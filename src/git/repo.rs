use crate::error::{Result, TallyError};
use crate::identity::IdentitySet;
use crate::model::{CandidateCommit, Identity};
use crate::sources::LocalHistory;
use crate::stats::{ChangeStatus, CommitDetailSource, FileChange};
use chrono::DateTime;
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::Path;

/// A locally present clone of a tracked repository.
pub struct LocalRepo {
    repo: Repository,
}

impl LocalRepo {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = discover(path.as_ref())?;
        Ok(Self { repo })
    }

    /// Tip of `branch`: the local branch, then the `origin` tracking branch,
    /// then HEAD.
    fn branch_tip(&self, branch: &str) -> Result<ObjectId> {
        for spec in [format!("refs/heads/{branch}"), format!("refs/remotes/origin/{branch}")] {
            if let Ok(id) = self.repo.rev_parse_single(spec.as_str()) {
                let commit = id
                    .object()?
                    .try_into_commit()
                    .map_err(|_| TallyError::Parse(format!("Not a commit: {spec}")))?;
                return Ok(commit.id);
            }
        }
        let mut head = self.repo.head()?;
        Ok(head.peel_to_commit_in_place()?.id)
    }

    /// Walk every commit reachable from the branch tip once, keeping those
    /// authored under a known identity.
    fn walk_authored(&self, branch: &str, identities: &IdentitySet) -> Result<Vec<CandidateCommit>> {
        let tip = self.branch_tip(branch)?;
        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([tip]);

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            for pid in commit.parent_ids() {
                stack.push_back(pid.into());
            }

            let author = commit.author()?;
            let known = Identity::new(&author.name.to_string(), &author.email.to_string())
                .is_some_and(|identity| identities.contains(&identity));
            if !known {
                continue;
            }

            let secs = author
                .time()
                .map_err(|e| TallyError::Parse(format!("Invalid author time in {commit_id}: {e}")))?
                .seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| TallyError::Parse(format!("Invalid timestamp: {secs}")))?;
            commits.push(CandidateCommit::new(commit_id.to_string(), Some(timestamp)));
        }

        Ok(commits)
    }

    fn changed_files(&self, commit_id: ObjectId) -> Result<Vec<FileChange>> {
        let commit = self.repo.find_commit(commit_id)?;
        let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
        // Merge commits introduce nothing of their own.
        if parents.len() > 1 {
            return Ok(Vec::new());
        }

        let commit_tree = commit.tree()?;
        let changes: Vec<ChangeDetached> = match parents.first() {
            Some(parent_id) => {
                let parent_tree = self.repo.find_commit(*parent_id)?.tree()?;
                self.repo
                    .diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?
            }
            None => self.repo.diff_tree_to_tree(None, Some(&commit_tree), None)?,
        };

        let mut files = Vec::new();
        for change in changes {
            if let Some(file) = self.file_change(change) {
                files.push(file);
            }
        }
        Ok(files)
    }

    fn file_change(&self, change: ChangeDetached) -> Option<FileChange> {
        match change {
            ChangeDetached::Addition { id, location, entry_mode, .. } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let obj = self.repo.find_object(id).ok()?;
                let counts = self.blob_lines(&obj).map(|lines| (lines, 0));
                Some(with_counts(location.to_string(), ChangeStatus::Added, counts))
            }
            ChangeDetached::Deletion { id, location, entry_mode, .. } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let obj = self.repo.find_object(id).ok()?;
                let counts = self.blob_lines(&obj).map(|lines| (0, lines));
                Some(with_counts(location.to_string(), ChangeStatus::Removed, counts))
            }
            ChangeDetached::Modification { previous_id, id, location, entry_mode, .. } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let counts = self.line_diff(previous_id, id);
                Some(with_counts(location.to_string(), ChangeStatus::Modified, counts))
            }
            ChangeDetached::Rewrite { source_id, id, location, entry_mode, copy, .. } => {
                if entry_mode.is_tree() {
                    return None;
                }
                let status = if copy { ChangeStatus::Copied } else { ChangeStatus::Renamed };
                let counts = self.line_diff(source_id, id);
                Some(with_counts(location.to_string(), status, counts))
            }
        }
    }

    fn is_binary_object(&self, object: &gix::Object) -> bool {
        object.data.as_slice().iter().take(8192).any(|&b| b == 0)
    }

    /// Line count of a text blob; `None` for binary content.
    fn blob_lines(&self, object: &gix::Object) -> Option<u64> {
        if self.is_binary_object(object) {
            return None;
        }
        Some(
            std::str::from_utf8(object.data.as_slice())
                .map(|t| t.lines().count() as u64)
                .unwrap_or(0),
        )
    }

    /// (added, deleted) lines between two blobs; `None` if either is binary
    /// or missing.
    fn line_diff(&self, old_id: ObjectId, new_id: ObjectId) -> Option<(u64, u64)> {
        let old_obj = self.repo.find_object(old_id).ok()?;
        let new_obj = self.repo.find_object(new_id).ok()?;
        if self.is_binary_object(&old_obj) || self.is_binary_object(&new_obj) {
            return None;
        }

        let old_text = String::from_utf8_lossy(old_obj.data.as_slice());
        let new_text = String::from_utf8_lossy(new_obj.data.as_slice());
        let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());

        let (mut added, mut deleted) = (0u64, 0u64);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added += 1,
                ChangeTag::Delete => deleted += 1,
                ChangeTag::Equal => {}
            }
        }
        Some((added, deleted))
    }
}

fn with_counts(path: String, status: ChangeStatus, counts: Option<(u64, u64)>) -> FileChange {
    FileChange {
        path,
        status,
        additions: counts.map(|(a, _)| a),
        deletions: counts.map(|(_, d)| d),
    }
}

impl LocalHistory for LocalRepo {
    fn commits_by(&self, identities: &IdentitySet, branch: &str) -> Result<Vec<CandidateCommit>> {
        self.walk_authored(branch, identities)
    }
}

impl CommitDetailSource for LocalRepo {
    fn commit_files(&self, sha: &str) -> Result<Vec<FileChange>> {
        let oid = ObjectId::from_hex(sha.as_bytes())
            .map_err(|e| TallyError::Parse(format!("Invalid commit ID: {e}")))?;
        self.changed_files(oid)
    }
}
