//! Pluggable owner-ranking backends.
//!
//! [`OwnersClient`] is the single capability the rest of the pipeline is
//! written against: rank the owners of a path. [`LocalRuleClient`] resolves
//! against rule files; [`RemoteRankingClient`] asks a code-review server's
//! code-owners endpoint, which pre-ranks by its own internal score.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use clsplit_core::change::normalize_path;

use crate::index::{
    DiskRuleSource, OwnerRanking, OwnersError, OwnershipIndex, RuleSource, TieBreaker,
};
use crate::rules::{InvalidOwnersConfig, OwnersFile, RULES_FILE};

/// Errors from the remote ranking endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("ranking endpoint returned status {status}")]
    Api { status: u16 },
    #[error("response parse error: {0}")]
    Parse(String),
}

/// Ranks the owners of repo-relative paths.
pub trait OwnersClient: Send + Sync {
    /// Owners of one path, strongest first.
    fn list_owners(&self, path: &str) -> Result<OwnerRanking, OwnersError>;

    /// Owners for many paths. Backends override this when they can do better
    /// than one lookup at a time.
    fn batch_list_owners(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, OwnerRanking>, OwnersError> {
        paths
            .iter()
            .map(|p| Ok((p.clone(), self.list_owners(p)?)))
            .collect()
    }
}

/// Rule-file-backed client.
pub struct LocalRuleClient<S: RuleSource> {
    index: OwnershipIndex<S>,
}

impl LocalRuleClient<DiskRuleSource> {
    /// Client over the rule files under `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        Self::new(OwnershipIndex::new(DiskRuleSource::new(
            root.as_ref().to_path_buf(),
        )))
    }

    /// Client over `root` with uncommitted rule files pinned to the given
    /// contents (keyed by repo-relative rule-file path).
    pub fn with_overrides(root: impl AsRef<Path>, overrides: HashMap<String, String>) -> Self {
        Self::new(OwnershipIndex::new(DiskRuleSource::with_overrides(
            root.as_ref().to_path_buf(),
            overrides,
        )))
    }
}

impl<S: RuleSource> LocalRuleClient<S> {
    pub fn new(index: OwnershipIndex<S>) -> Self {
        Self { index }
    }

    pub fn with_tie_breaker(self, tie_breaker: impl TieBreaker + 'static) -> Self {
        Self {
            index: self.index.with_tie_breaker(tie_breaker),
        }
    }

    pub fn with_batch_workers(self, workers: usize) -> Self {
        Self {
            index: self.index.with_batch_workers(workers),
        }
    }
}

impl<S: RuleSource> OwnersClient for LocalRuleClient<S> {
    fn list_owners(&self, path: &str) -> Result<OwnerRanking, OwnersError> {
        self.index.list_owners(path)
    }

    fn batch_list_owners(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, OwnerRanking>, OwnersError> {
        self.index.batch_list_owners(paths)
    }
}

/// Client for a review server's code-owners REST endpoint.
///
/// `GET {base}/projects/{project}/branches/{branch}/code_owners/{path}`
/// returns a JSON array of `{"account": {"email": ...}}`, best reviewer
/// first; the ranking distance is the response index.
pub struct RemoteRankingClient {
    base_url: String,
    project: String,
    branch: String,
    agent: ureq::Agent,
}

impl RemoteRankingClient {
    pub fn new(
        base_url: impl Into<String>,
        project: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            branch: branch.into(),
            agent: ureq::Agent::new_with_config(
                ureq::config::Config::builder()
                    .timeout_global(Some(std::time::Duration::from_secs(60)))
                    .build(),
            ),
        }
    }

    fn fetch(&self, path: &str) -> Result<OwnerRanking, RemoteError> {
        let url = format!(
            "{}/projects/{}/branches/{}/code_owners/{}",
            self.base_url,
            self.project,
            self.branch,
            path.replace('/', "%2F"),
        );

        let mut response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(status) => RemoteError::Api { status },
            other => RemoteError::Http(other.to_string()),
        })?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        // Review servers prefix JSON bodies with an XSSI guard line.
        let body = body.trim_start().trim_start_matches(")]}'").trim_start();
        let accounts: serde_json::Value =
            serde_json::from_str(body).map_err(|e| RemoteError::Parse(e.to_string()))?;

        let emails = accounts
            .as_array()
            .ok_or_else(|| RemoteError::Parse("expected a JSON array".to_string()))?
            .iter()
            .filter_map(|entry| {
                entry
                    .pointer("/account/email")
                    .and_then(|e| e.as_str())
                    .map(str::to_string)
            })
            .collect();

        Ok(OwnerRanking::from_ranked_emails(emails))
    }
}

impl OwnersClient for RemoteRankingClient {
    fn list_owners(&self, path: &str) -> Result<OwnerRanking, OwnersError> {
        Ok(self.fetch(&normalize_path(path))?)
    }
}

/// Parse every rule file under `root`, returning all malformed ones.
///
/// Unlike resolution, which fails fast on the first bad file it meets, this
/// walks the whole tree so a lint pass can report everything at once.
pub fn validate_rules(root: &Path) -> Result<Vec<InvalidOwnersConfig>, OwnersError> {
    let mut findings = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() || entry.file_name() != RULES_FILE {
            continue;
        }

        let rel_dir = entry
            .path()
            .parent()
            .and_then(|dir| dir.strip_prefix(root).ok())
            .map(|dir| normalize_path(&dir.to_string_lossy()))
            .unwrap_or_default();

        let contents =
            std::fs::read_to_string(entry.path()).map_err(|e| OwnersError::Io {
                path: entry.path().display().to_string(),
                source: e,
            })?;

        if let Err(finding) = OwnersFile::parse(&rel_dir, &contents) {
            findings.push(finding);
        }
    }

    Ok(findings)
}
