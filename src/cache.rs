use crate::error::{Result, TallyError};
use crate::model::{parse_timestamp, CacheMetadata, CommitStatsRecord, RepoTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-commit records of one repository, keyed by sha.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryCache {
    records: HashMap<String, CommitStatsRecord>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = CommitStatsRecord>>(records: I) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, sha: &str) -> bool {
        self.records.contains_key(sha)
    }

    pub fn get(&self, sha: &str) -> Option<&CommitStatsRecord> {
        self.records.get(sha)
    }

    /// Keeps an existing record for the same sha; stats for a sha never change.
    pub fn insert(&mut self, record: CommitStatsRecord) -> bool {
        let sha = record.sha().to_string();
        if self.records.contains_key(&sha) {
            return false;
        }
        self.records.insert(sha, record);
        true
    }

    pub fn remove(&mut self, sha: &str) -> Option<CommitStatsRecord> {
        self.records.remove(sha)
    }

    pub fn records(&self) -> impl Iterator<Item = &CommitStatsRecord> {
        self.records.values()
    }

    /// Drop records whose url is not under `target`. Returns how many went.
    pub fn retain_repository(&mut self, target: &RepoTarget) -> usize {
        let prefix = target.commit_url("");
        let before = self.records.len();
        self.records.retain(|_, record| record.url.starts_with(&prefix));
        before - self.records.len()
    }

    /// Records sorted by timestamp (url breaks ties) with `index` set to 1..N.
    pub fn normalized(&self) -> Vec<CommitStatsRecord> {
        let mut records: Vec<CommitStatsRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.url.cmp(&b.url)));
        for (i, record) in records.iter_mut().enumerate() {
            record.index = i + 1;
        }
        records
    }
}

#[derive(Serialize, Deserialize)]
struct CacheDocument {
    #[serde(rename = "_metadata")]
    metadata: CacheMetadata,
    data: Vec<CommitStatsRecord>,
}

#[derive(Deserialize, Default)]
#[serde(untagged)]
enum LegacyImages {
    Files(Vec<String>),
    Count(u64),
    #[default]
    Missing,
}

#[derive(Deserialize)]
struct LegacyEntry {
    #[serde(default)]
    images: LegacyImages,
    #[serde(default)]
    image_count: Option<u64>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    timestamp: Option<String>,
}

type LegacyRepos = HashMap<String, HashMap<String, LegacyEntry>>;

/// Every on-disk shape the cache has had. Variants are tried in order.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Current { data: Vec<CommitStatsRecord> },
    Wrapped { data: LegacyRepos },
    Bare(LegacyRepos),
}

impl StoredDocument {
    /// One-time migration into the current record shape. Any stored metadata
    /// block is dropped; it is recomputed on save. With `exact_key` a legacy
    /// map must name the repository; otherwise a single entry is taken as it.
    fn into_cache(self, target: &RepoTarget, exact_key: bool) -> RepositoryCache {
        let repos = match self {
            StoredDocument::Current { data } => return RepositoryCache::from_records(data),
            StoredDocument::Wrapped { data } => data,
            StoredDocument::Bare(repos) => repos,
        };

        let key = target.key();
        let entries = match select_legacy_repo(repos, &key, exact_key) {
            Some(entries) => entries,
            None => {
                warn!(repo = %key, "legacy cache has no entry for this repository");
                return RepositoryCache::new();
            }
        };

        info!(repo = %key, commits = entries.len(), "migrating legacy cache document");
        RepositoryCache::from_records(entries.into_iter().map(|(sha, entry)| {
            let images = match entry.images {
                LegacyImages::Files(files) => files.len() as u64,
                LegacyImages::Count(n) => n,
                LegacyImages::Missing => entry.image_count.unwrap_or(0),
            };
            let timestamp = entry
                .timestamp
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            CommitStatsRecord {
                index: 0,
                url: target.commit_url(&sha),
                additions: entry.additions,
                deletions: entry.deletions,
                images,
                timestamp,
            }
        }))
    }
}

fn select_legacy_repo(
    mut repos: LegacyRepos,
    key: &str,
    exact_key: bool,
) -> Option<HashMap<String, LegacyEntry>> {
    if let Some(entries) = repos.remove(key) {
        return Some(entries);
    }
    if !exact_key && repos.len() == 1 {
        return repos.into_values().next();
    }
    None
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// One JSON document per repository under a cache directory.
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<owner>/<name>.json`.
    pub fn path_for(&self, target: &RepoTarget) -> PathBuf {
        self.dir.join(&target.owner).join(format!("{}.json", target.name))
    }

    /// `<dir>/<name>.json`, the layout used before documents were split by
    /// owner. Only read, as a fallback.
    fn flat_path_for(&self, target: &RepoTarget) -> PathBuf {
        self.dir.join(format!("{}.json", target.name))
    }

    /// Missing or unreadable documents yield an empty cache. Records that
    /// belong to another repository are dropped.
    pub fn load(&self, target: &RepoTarget) -> RepositoryCache {
        let path = self.path_for(target);
        let loaded = match self.try_load(target, &path, false) {
            Ok(None) => {
                let flat = self.flat_path_for(target);
                self.try_load(target, &flat, true).map(|cache| {
                    if cache.is_some() {
                        info!(path = %flat.display(), "reading cache from flat layout");
                    }
                    cache
                })
            }
            other => other,
        };
        match loaded {
            Ok(Some(mut cache)) => {
                let foreign = cache.retain_repository(target);
                if foreign > 0 {
                    warn!(repo = %target.key(), foreign, "dropped records of another repository");
                }
                debug!(path = %path.display(), commits = cache.len(), "loaded cache");
                cache
            }
            Ok(None) => {
                debug!(path = %path.display(), "no cache yet");
                RepositoryCache::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unusable cache");
                RepositoryCache::new()
            }
        }
    }

    fn try_load(
        &self,
        target: &RepoTarget,
        path: &Path,
        exact_key: bool,
    ) -> Result<Option<RepositoryCache>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TallyError::CacheCorrupt(e.to_string())),
        };
        let document: StoredDocument = serde_json::from_str(&raw)
            .map_err(|e| TallyError::CacheCorrupt(format!("{}: {e}", path.display())))?;
        Ok(Some(document.into_cache(target, exact_key)))
    }

    /// Sort, reindex and re-summarize, then replace the document in one write.
    pub fn save(&self, target: &RepoTarget, cache: &RepositoryCache) -> Result<CacheMetadata> {
        let data = cache.normalized();
        let mut metadata = CacheMetadata::summarize(&data);
        metadata.last_updated = Some(Utc::now());

        let document = CacheDocument { metadata, data };
        let json = serde_json::to_string_pretty(&document)?;
        let path = self.path_for(target);
        write_atomic(&path, json.as_bytes())?;

        info!(
            path = %path.display(),
            commits = document.metadata.total_commits,
            "cache saved"
        );
        Ok(document.metadata)
    }

    /// Drop a repository's document. Returns whether one existed.
    pub fn remove(&self, target: &RepoTarget) -> Result<bool> {
        match std::fs::remove_file(self.path_for(target)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the whole cache directory.
    pub fn clear(&self) -> Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.dir)?;
        Ok(true)
    }
}
