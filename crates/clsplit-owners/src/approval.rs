//! Per-file review status against known approvers and reviewers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::OwnersClient;
use crate::index::OwnersError;
use crate::rules::EVERYONE;

/// Review status of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// An owner of the file has approved the change.
    Approved,
    /// An owner is a reviewer but has not approved yet.
    Pending,
    /// No owner of the file is among the reviewers.
    InsufficientReviewers,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "APPROVED"),
            Self::Pending => write!(f, "PENDING"),
            Self::InsufficientReviewers => write!(f, "INSUFFICIENT_REVIEWERS"),
        }
    }
}

/// Classify each path given who has approved and who is reviewing.
///
/// Owner-approver intersection wins over owner-reviewer intersection;
/// [`EVERYONE`] intersects any non-empty set. Pure: the only failure mode is
/// a resolution error from the client.
pub fn files_approval_status(
    client: &dyn OwnersClient,
    paths: &[String],
    approvers: &[String],
    reviewers: &[String],
) -> Result<BTreeMap<String, ApprovalStatus>, OwnersError> {
    let approvers: HashSet<&str> = approvers.iter().map(String::as_str).collect();
    let reviewers: HashSet<&str> = reviewers.iter().map(String::as_str).collect();

    let mut status = BTreeMap::new();
    for path in paths {
        let ranking = client.list_owners(path)?;
        let verdict = if intersects(&ranking, &approvers) {
            ApprovalStatus::Approved
        } else if intersects(&ranking, &reviewers) {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::InsufficientReviewers
        };
        status.insert(path.clone(), verdict);
    }
    Ok(status)
}

fn intersects(ranking: &crate::index::OwnerRanking, people: &HashSet<&str>) -> bool {
    if people.is_empty() {
        return false;
    }
    ranking
        .owners()
        .any(|o| o == EVERYONE || people.contains(o))
}
