//! Learned author identities of the tracked user.
//!
//! The set only grows. It is loaded once, threaded through the run by
//! mutable reference and written back whenever a repository taught it
//! something new.

use crate::cache::write_atomic;
use crate::error::Result;
use crate::model::Identity;
use crate::remote::{HostingApi, PER_PAGE};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pages of the commit listing consulted when learning identities.
pub const DEFAULT_IDENTITY_PAGES: u32 = 3;

#[derive(Debug, Default)]
pub struct IdentitySet {
    path: Option<PathBuf>,
    identities: BTreeSet<Identity>,
}

impl IdentitySet {
    /// Not backed by a file; `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Missing or unreadable files start an empty set.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let identities = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeSet<Identity>>(&raw) {
                Ok(set) => set,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable identity store");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable identity store");
                BTreeSet::new()
            }
        };
        debug!(path = %path.display(), known = identities.len(), "identities loaded");
        Self {
            path: Some(path),
            identities,
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.identities)?;
        write_atomic(path, json.as_bytes())
    }

    /// Union in new identities; returns how many were not known before.
    pub fn extend<I: IntoIterator<Item = Identity>>(&mut self, learned: I) -> usize {
        learned
            .into_iter()
            .filter(|identity| self.identities.insert(identity.clone()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

/// Identities seen on the first `pages` pages of the user's commits in one
/// repository. Any failed page yields the empty set.
pub fn learn<H: HostingApi + ?Sized>(
    api: &H,
    owner: &str,
    repo: &str,
    username: &str,
    pages: u32,
) -> BTreeSet<Identity> {
    let mut learned = BTreeSet::new();
    for page in 1..=pages {
        let commits = match api.list_commits(owner, repo, username, None, page) {
            Ok(commits) => commits,
            Err(e) => {
                warn!(%owner, %repo, page, error = %e, "identity lookup failed");
                return BTreeSet::new();
            }
        };
        let exhausted = commits.len() < PER_PAGE;
        learned.extend(commits.iter().filter_map(|c| {
            Identity::new(c.author_name.as_deref()?, c.author_email.as_deref()?)
        }));
        if exhausted {
            break;
        }
    }
    debug!(%owner, %repo, found = learned.len(), "identities observed");
    learned
}

/// Learn from one repository and persist the set if it grew.
pub fn learn_into<H: HostingApi + ?Sized>(
    identities: &mut IdentitySet,
    api: &H,
    owner: &str,
    repo: &str,
    username: &str,
    pages: u32,
) -> usize {
    let added = identities.extend(learn(api, owner, repo, username, pages));
    if added > 0 {
        info!(added, known = identities.len(), "learned new identities");
        if let Err(e) = identities.save() {
            warn!(error = %e, "could not persist identities");
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;
    use crate::remote::CommitSummary;
    use crate::stats::FileChange;
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct ScriptedListing {
        pages: Vec<Result<Vec<CommitSummary>>>,
        calls: RefCell<u32>,
    }

    impl HostingApi for ScriptedListing {
        fn list_commits(
            &self,
            _owner: &str,
            _repo: &str,
            _author: &str,
            _branch: Option<&str>,
            page: u32,
        ) -> Result<Vec<CommitSummary>> {
            *self.calls.borrow_mut() += 1;
            match self.pages.get(page as usize - 1) {
                Some(Ok(commits)) => Ok(commits.clone()),
                Some(Err(e)) => Err(TallyError::Transport(e.to_string())),
                None => Ok(Vec::new()),
            }
        }

        fn commit_files(&self, _: &str, _: &str, _: &str) -> Result<Vec<FileChange>> {
            Ok(Vec::new())
        }
    }

    fn summary(sha: &str, name: Option<&str>, email: Option<&str>) -> CommitSummary {
        CommitSummary {
            sha: sha.to_string(),
            author_name: name.map(str::to_string),
            author_email: email.map(str::to_string),
            authored_at: None,
        }
    }

    fn full_page(name: &str, email: &str) -> Vec<CommitSummary> {
        (0..PER_PAGE)
            .map(|i| summary(&format!("{i}"), Some(name), Some(email)))
            .collect()
    }

    #[test]
    fn learns_complete_identities_only() {
        let api = ScriptedListing {
            pages: vec![Ok(vec![
                summary("1", Some("Jane"), Some("jane@example.com")),
                summary("2", Some("Jane"), None),
                summary("3", None, Some("x@example.com")),
                summary("4", Some("J. Doe"), Some("jane@users.noreply.github.com")),
            ])],
            calls: RefCell::new(0),
        };
        let learned = learn(&api, "o", "r", "jane", DEFAULT_IDENTITY_PAGES);
        let names: Vec<String> = learned.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "J. Doe <jane@users.noreply.github.com>".to_string(),
                "Jane <jane@example.com>".to_string(),
            ]
        );
        assert_eq!(*api.calls.borrow(), 1);
    }

    #[test]
    fn page_bound_is_respected() {
        let api = ScriptedListing {
            pages: (0..5).map(|_| Ok(full_page("Jane", "jane@example.com"))).collect(),
            calls: RefCell::new(0),
        };
        learn(&api, "o", "r", "jane", 3);
        assert_eq!(*api.calls.borrow(), 3);
    }

    #[test]
    fn transport_failure_learns_nothing() {
        let api = ScriptedListing {
            pages: vec![
                Ok(full_page("Jane", "jane@example.com")),
                Err(TallyError::Transport("boom".into())),
            ],
            calls: RefCell::new(0),
        };
        assert!(learn(&api, "o", "r", "jane", 3).is_empty());
    }

    #[test]
    fn set_grows_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identities.json");
        let api = ScriptedListing {
            pages: vec![Ok(vec![summary("1", Some("Jane"), Some("jane@example.com"))])],
            calls: RefCell::new(0),
        };

        let mut set = IdentitySet::load(&path);
        assert!(set.is_empty());
        assert_eq!(learn_into(&mut set, &api, "o", "r", "jane", 3), 1);
        assert_eq!(learn_into(&mut set, &api, "o", "r", "jane", 3), 0);

        let reloaded = IdentitySet::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(&Identity::new("Jane", "jane@example.com").unwrap()));
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identities.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(IdentitySet::load(&path).is_empty());
    }
}
