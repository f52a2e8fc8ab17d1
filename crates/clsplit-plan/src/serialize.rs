//! Plain-text persistence for split plans.
//!
//! A plan file is a sequence of blocks separated by one blank line. Each
//! block is a reviewer line, a description line, and one indented line per
//! file:
//!
//! ```text
//! # anything starting with '#' is ignored
//! Reviewers: alice@example.com, bob@example.com
//! Description: prepare foo/bar for review
//!   M foo/bar/a.cc
//!   D foo/bar/b.cc
//! ```
//!
//! Formatting then parsing reproduces the plan exactly, so a human can edit
//! the file between generation and upload.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use clsplit_core::change::ChangedFile;

use crate::compose::{ClInfo, SplitPlan};

/// Fatal problems with a plan file.
#[derive(Debug, thiserror::Error)]
pub enum ClSplitParseError {
    #[error("failed to read plan file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("plan line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("file {path} is assigned to more than one CL")]
    DuplicateFile { path: String },
    #[error("plan references {path}, which is not part of the change")]
    UnknownFile { path: String },
}

/// Advisory findings from loading a plan, reported beside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    EmptyPlan,
    SuspiciousReviewer { reviewer: String },
    MissingFile { path: String },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPlan => write!(f, "the plan contains no CLs"),
            Self::SuspiciousReviewer { reviewer } => {
                write!(f, "reviewer {reviewer:?} does not look like an email address")
            }
            Self::MissingFile { path } => {
                write!(f, "changed file {path} is not assigned to any CL")
            }
        }
    }
}

/// A parsed plan together with its advisory findings.
#[derive(Debug)]
pub struct LoadedPlan {
    pub plan: SplitPlan,
    pub warnings: Vec<PlanWarning>,
}

/// Render a plan in the block format above, without a preamble.
pub fn format_splittings(plan: &SplitPlan) -> String {
    let mut out = String::new();
    for (idx, cl) in plan.cls.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let reviewers = format!("Reviewers: {}", cl.reviewers.join(", "));
        out.push_str(reviewers.trim_end());
        out.push('\n');
        let description = format!("Description: {}", cl.description);
        out.push_str(description.trim_end());
        out.push('\n');
        for file in &cl.files {
            out.push_str(&format!("  {} {}\n", file.action, file.path));
        }
    }
    out
}

/// Parse the inverse of [`format_splittings`].
///
/// `#` lines are ignored wherever they appear; blank lines close the current
/// block. Anything else must fit the block grammar, with errors reported by
/// line number.
pub fn parse_splittings(text: &str) -> Result<SplitPlan, ClSplitParseError> {
    let mut cls = Vec::new();
    let mut current: Option<ClInfo> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if trimmed.starts_with('#') {
            continue;
        }
        if trimmed.is_empty() {
            if let Some(cl) = current.take() {
                cls.push(finish_block(cl, line_no)?);
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("Reviewers:") {
            if let Some(cl) = current.take() {
                cls.push(finish_block(cl, line_no)?);
            }
            current = Some(ClInfo {
                reviewers: rest
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                description: String::new(),
                files: Vec::new(),
            });
        } else if let Some(rest) = trimmed.strip_prefix("Description:") {
            let Some(cl) = current.as_mut() else {
                return Err(ClSplitParseError::Malformed {
                    line: line_no,
                    message: "Description before any Reviewers line".to_string(),
                });
            };
            if !cl.description.is_empty() || !cl.files.is_empty() {
                return Err(ClSplitParseError::Malformed {
                    line: line_no,
                    message: "unexpected second Description line".to_string(),
                });
            }
            cl.description = rest.trim().to_string();
        } else if raw.starts_with([' ', '\t']) {
            let Some(cl) = current.as_mut() else {
                return Err(ClSplitParseError::Malformed {
                    line: line_no,
                    message: "file entry before any Reviewers line".to_string(),
                });
            };
            let Some((action, path)) = trimmed.split_once(' ') else {
                return Err(ClSplitParseError::Malformed {
                    line: line_no,
                    message: format!("file entry {trimmed:?} is not '<action> <path>'"),
                });
            };
            let action = action.parse().map_err(|e| ClSplitParseError::Malformed {
                line: line_no,
                message: format!("{e}"),
            })?;
            cl.files.push(ChangedFile::new(action, path.trim()));
        } else {
            return Err(ClSplitParseError::Malformed {
                line: line_no,
                message: format!("unrecognized line {trimmed:?}"),
            });
        }
    }

    if let Some(cl) = current.take() {
        let line_no = text.lines().count();
        cls.push(finish_block(cl, line_no)?);
    }

    Ok(SplitPlan { cls })
}

fn finish_block(cl: ClInfo, line_no: usize) -> Result<ClInfo, ClSplitParseError> {
    if cl.description.is_empty() && cl.files.is_empty() {
        return Err(ClSplitParseError::Malformed {
            line: line_no,
            message: "CL block is missing its Description line".to_string(),
        });
    }
    Ok(cl)
}

/// Check a parsed plan against the actual change.
///
/// Duplicate or unknown file assignments are fatal; everything else is a
/// warning the caller can print and move past.
pub fn cross_validate(
    plan: &SplitPlan,
    expected_files: &[ChangedFile],
) -> Result<Vec<PlanWarning>, ClSplitParseError> {
    let expected: HashSet<&str> = expected_files.iter().map(|f| f.path.as_str()).collect();
    let mut warnings = Vec::new();

    if plan.is_empty() {
        warnings.push(PlanWarning::EmptyPlan);
    }

    let mut assigned: HashSet<&str> = HashSet::new();
    for cl in &plan.cls {
        for reviewer in &cl.reviewers {
            if !looks_like_email(reviewer) {
                warnings.push(PlanWarning::SuspiciousReviewer {
                    reviewer: reviewer.clone(),
                });
            }
        }
        for file in &cl.files {
            if !assigned.insert(&file.path) {
                return Err(ClSplitParseError::DuplicateFile {
                    path: file.path.clone(),
                });
            }
            if !expected.contains(file.path.as_str()) {
                return Err(ClSplitParseError::UnknownFile {
                    path: file.path.clone(),
                });
            }
        }
    }

    for file in expected_files {
        if !assigned.contains(file.path.as_str()) {
            warnings.push(PlanWarning::MissingFile {
                path: file.path.clone(),
            });
        }
    }

    Ok(warnings)
}

fn looks_like_email(reviewer: &str) -> bool {
    match reviewer.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

/// Read, parse, and cross-validate a plan file in one step.
pub fn load_splitting_from_file(
    path: &Path,
    expected_files: &[ChangedFile],
) -> Result<LoadedPlan, ClSplitParseError> {
    let text = std::fs::read_to_string(path).map_err(|e| ClSplitParseError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let plan = parse_splittings(&text)?;
    let warnings = cross_validate(&plan, expected_files)?;
    Ok(LoadedPlan { plan, warnings })
}
