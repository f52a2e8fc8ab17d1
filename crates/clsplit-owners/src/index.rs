//! Proximity-ranked owner resolution over a tree of rule files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use clsplit_core::change::{basename, normalize_path, parent_dir};

use crate::client::RemoteError;
use crate::rules::{InvalidOwnersConfig, OwnersFile, rules_file_path};

/// Errors from owner resolution.
#[derive(Debug, thiserror::Error)]
pub enum OwnersError {
    #[error(transparent)]
    InvalidConfig(#[from] InvalidOwnersConfig),
    #[error("failed to read rule file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Supplies raw rule-file contents per directory.
///
/// `None` means the directory has no rule file, which is not an error;
/// resolution simply continues upward.
pub trait RuleSource: Send + Sync {
    fn load(&self, directory: &str) -> Result<Option<String>, OwnersError>;
}

/// Disk-backed rule source with an override map for uncommitted local edits.
///
/// Overrides are keyed by repo-relative rule-file path (e.g. `foo/OWNERS`)
/// and take precedence over on-disk contents, so resolution can be pinned to
/// the committed state of locally modified rule files.
pub struct DiskRuleSource {
    root: PathBuf,
    overrides: HashMap<String, String>,
}

impl DiskRuleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(root: impl Into<PathBuf>, overrides: HashMap<String, String>) -> Self {
        Self {
            root: root.into(),
            overrides,
        }
    }
}

impl RuleSource for DiskRuleSource {
    fn load(&self, directory: &str) -> Result<Option<String>, OwnersError> {
        let rel = rules_file_path(directory);
        if let Some(contents) = self.overrides.get(&rel) {
            return Ok(Some(contents.clone()));
        }

        let path = self.root.join(Path::new(&rel));
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OwnersError::Io {
                path: rel,
                source: e,
            }),
        }
    }
}

/// Fully in-memory rule source, keyed by directory. Used by tests and by
/// callers that already hold all rule contents.
#[derive(Debug, Default)]
pub struct MapRuleSource {
    files: HashMap<String, String>,
}

impl MapRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, directory: &str, contents: &str) -> &mut Self {
        self.files
            .insert(directory.to_string(), contents.to_string());
        self
    }
}

impl RuleSource for MapRuleSource {
    fn load(&self, directory: &str) -> Result<Option<String>, OwnersError> {
        Ok(self.files.get(directory).cloned())
    }
}

/// Secondary sort key for owners tied at the same distance.
///
/// Production uses random jitter so equally-close owners are returned in a
/// different order on every call, spreading review load. Tests inject a
/// deterministic implementation.
pub trait TieBreaker: Send + Sync {
    /// A value in `[0, 1)`; owners at equal distance sort by it ascending.
    fn jitter(&self) -> f64;
}

/// Load-spreading jitter.
pub struct RandomTieBreaker;

impl TieBreaker for RandomTieBreaker {
    fn jitter(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// No jitter: ties keep rule order. Deterministic, for tests and tooling
/// that diffs resolution output.
pub struct NoJitter;

impl TieBreaker for NoJitter {
    fn jitter(&self) -> f64 {
        0.0
    }
}

/// One owner in a ranking, with its directory distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedOwner {
    pub owner: String,
    /// Directory hops between the file and the granting rule file
    /// (0 = same directory). Lower is stronger.
    pub distance: u32,
}

/// Owners of one path, strongest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRanking {
    pub entries: Vec<RankedOwner>,
}

impl OwnerRanking {
    /// Ranking from a pre-sorted owner list; distance is the list index.
    pub fn from_ranked_emails(emails: Vec<String>) -> Self {
        let entries = emails
            .into_iter()
            .enumerate()
            .map(|(i, owner)| RankedOwner {
                owner,
                distance: i as u32,
            })
            .collect();
        Self { entries }
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.owner.as_str())
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.entries.iter().any(|e| e.owner == owner)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Resolves owners for paths by walking rule files upward from each file's
/// directory.
///
/// Parsed rule files are cached per directory behind one mutex; the cache is
/// populated lazily and never invalidated within a session.
pub struct OwnershipIndex<S: RuleSource> {
    source: S,
    tie_breaker: Box<dyn TieBreaker>,
    cache: Mutex<HashMap<String, Option<Arc<OwnersFile>>>>,
    batch_workers: usize,
}

impl<S: RuleSource> OwnershipIndex<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            tie_breaker: Box::new(RandomTieBreaker),
            cache: Mutex::new(HashMap::new()),
            batch_workers: 8,
        }
    }

    pub fn with_tie_breaker(mut self, tie_breaker: impl TieBreaker + 'static) -> Self {
        self.tie_breaker = Box::new(tie_breaker);
        self
    }

    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers.max(1);
        self
    }

    /// Parsed rules for one directory, populating the cache on first use.
    fn rules_for(&self, directory: &str) -> Result<Option<Arc<OwnersFile>>, OwnersError> {
        let mut cache = self.cache.lock().expect("rule cache poisoned");
        if let Some(cached) = cache.get(directory) {
            return Ok(cached.clone());
        }

        let parsed = match self.source.load(directory)? {
            Some(contents) => Some(Arc::new(OwnersFile::parse(directory, &contents)?)),
            None => None,
        };
        cache.insert(directory.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Owners of `path`, sorted ascending by directory distance.
    ///
    /// Walks from the file's directory to the repository root, stopping above
    /// any rule file that blocks inheritance. An owner granted at several
    /// distances keeps the minimum. Equal distances are ordered by the
    /// injected tie-breaker. A path with no governing rules yields an empty
    /// ranking, which callers must surface as "insufficient" rather than
    /// swallow.
    pub fn list_owners(&self, path: &str) -> Result<OwnerRanking, OwnersError> {
        let path = normalize_path(path);
        let name = basename(&path);

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut directory = parent_dir(&path).to_string();
        let mut distance = 0u32;

        loop {
            if let Some(file) = self.rules_for(&directory)? {
                // Walk order is near-to-far, so the first sighting of an
                // owner is already its minimum distance.
                for owner in file.owners_for(name) {
                    if seen.insert(owner.to_string()) {
                        entries.push(RankedOwner {
                            owner: owner.to_string(),
                            distance,
                        });
                    }
                }
                if file.stops_inheritance() {
                    break;
                }
            }
            if directory.is_empty() {
                break;
            }
            directory = parent_dir(&directory).to_string();
            distance += 1;
        }

        let mut keyed: Vec<(RankedOwner, f64)> = entries
            .into_iter()
            .map(|e| {
                let jitter = self.tie_breaker.jitter();
                (e, jitter)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.distance.cmp(&b.0.distance).then(a.1.total_cmp(&b.1)));

        Ok(OwnerRanking {
            entries: keyed.into_iter().map(|(e, _)| e).collect(),
        })
    }

    /// Resolve many paths on a bounded worker pool.
    ///
    /// Parallelism is over directory-tree walks; first-time population of a
    /// directory's rules is serialized by the cache mutex.
    pub fn batch_list_owners(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, OwnerRanking>, OwnersError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.batch_workers)
            .build()
            .map_err(|e| OwnersError::WorkerPool(e.to_string()))?;

        pool.install(|| {
            paths
                .par_iter()
                .map(|p| Ok((p.clone(), self.list_owners(p)?)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixture() -> OwnershipIndex<MapRuleSource> {
        let mut source = MapRuleSource::new();
        source
            .insert("", "root@example.com\n")
            .insert("a", "alice@example.com\n")
            .insert("a/b", "bob@example.com\nalice@example.com\n")
            .insert("sealed", "set noparent\nsec@example.com\n")
            .insert("bar/everyone", "*\n");
        OwnershipIndex::new(source).with_tie_breaker(NoJitter)
    }

    fn owners(ranking: &OwnerRanking) -> Vec<&str> {
        ranking.owners().collect()
    }

    #[test]
    fn test_distance_ordering() {
        let index = fixture();
        let ranking = index.list_owners("a/b/file.cc").unwrap();
        assert_eq!(
            owners(&ranking),
            vec!["bob@example.com", "alice@example.com", "root@example.com"]
        );
        assert_eq!(ranking.entries[0].distance, 0);
        assert_eq!(ranking.entries[2].distance, 2);
    }

    #[test]
    fn test_minimum_distance_wins() {
        // alice appears at distance 0 (a/b) and distance 1 (a); only the
        // closer grant is kept.
        let index = fixture();
        let ranking = index.list_owners("a/b/file.cc").unwrap();
        let alice = ranking
            .entries
            .iter()
            .find(|e| e.owner == "alice@example.com")
            .unwrap();
        assert_eq!(alice.distance, 0);
        assert_eq!(
            ranking
                .owners()
                .filter(|o| *o == "alice@example.com")
                .count(),
            1
        );
    }

    #[test]
    fn test_noparent_stops_walk() {
        let index = fixture();
        let ranking = index.list_owners("sealed/deep.cc").unwrap();
        assert_eq!(owners(&ranking), vec!["sec@example.com"]);
    }

    #[test]
    fn test_missing_rules_yield_empty_ranking() {
        let index = OwnershipIndex::new(MapRuleSource::new()).with_tie_breaker(NoJitter);
        let ranking = index.list_owners("anywhere/file.cc").unwrap();
        assert!(ranking.is_empty());
    }

    #[test]
    fn test_everyone_is_ranked() {
        let index = fixture();
        let ranking = index.list_owners("bar/everyone/foo.txt").unwrap();
        assert_eq!(owners(&ranking), vec!["*", "root@example.com"]);
    }

    #[test]
    fn test_malformed_rules_are_fatal() {
        let mut source = MapRuleSource::new();
        source.insert("bad", "not a rule line\n");
        let index = OwnershipIndex::new(source);
        let err = index.list_owners("bad/file.cc").unwrap_err();
        assert!(matches!(err, OwnersError::InvalidConfig(_)));
    }

    #[test]
    fn test_tie_breaker_is_injectable() {
        // A jitter that decreases per call reverses the order of owners tied
        // at the same distance.
        struct Reversing(AtomicUsize);
        impl TieBreaker for Reversing {
            fn jitter(&self) -> f64 {
                let n = self.0.fetch_add(1, Ordering::Relaxed);
                0.9 - 0.1 * n as f64
            }
        }

        let mut source = MapRuleSource::new();
        source.insert("t", "first@example.com\nsecond@example.com\n");
        let index = OwnershipIndex::new(source).with_tie_breaker(Reversing(AtomicUsize::new(0)));
        let ranking = index.list_owners("t/x.cc").unwrap();
        assert_eq!(
            owners(&ranking),
            vec!["second@example.com", "first@example.com"]
        );
    }

    #[test]
    fn test_batch_matches_serial() {
        let index = fixture();
        let paths: Vec<String> = vec![
            "a/b/file.cc".into(),
            "a/other.h".into(),
            "sealed/deep.cc".into(),
            "bar/everyone/foo.txt".into(),
            "no/rules/here.py".into(),
        ];
        let batch = index.batch_list_owners(&paths).unwrap();
        assert_eq!(batch.len(), paths.len());
        for path in &paths {
            assert_eq!(batch[path], index.list_owners(path).unwrap());
        }
    }

    #[test]
    fn test_disk_source_with_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("ui")).unwrap();
        std::fs::write(tmp.path().join("ui/OWNERS"), "disk@example.com\n").unwrap();

        let mut overrides = HashMap::new();
        overrides.insert("ui/OWNERS".to_string(), "pinned@example.com\n".to_string());

        let source = DiskRuleSource::with_overrides(tmp.path(), overrides);
        let index = OwnershipIndex::new(source).with_tie_breaker(NoJitter);
        let ranking = index.list_owners("ui/view.cc").unwrap();
        assert_eq!(owners(&ranking), vec!["pinned@example.com"]);
    }
}
