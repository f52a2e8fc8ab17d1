//! Changed-file extraction from the local git repository.
//!
//! This is the only place the tool touches version control, and it is
//! read-only: diff the upstream tree against the working directory, and pull
//! the upstream contents of locally modified rule files so ownership is
//! resolved against the committed state, not uncommitted edits.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use git2::{Delta, DiffOptions, Repository};

use clsplit_core::change::{ChangedFile, FileAction, basename, normalize_path};
use clsplit_owners::rules::RULES_FILE;

pub fn open_repository(root: &Path) -> Result<Repository> {
    Repository::discover(root)
        .with_context(|| format!("{} is not inside a git repository", root.display()))
}

/// Files changed between the upstream revision and the working tree
/// (index included), as `(action, path)` entries.
pub fn changed_files(repo: &Repository, upstream: &str) -> Result<Vec<ChangedFile>> {
    let tree = repo
        .revparse_single(upstream)
        .and_then(|obj| obj.peel_to_tree())
        .with_context(|| format!("cannot resolve upstream revision {upstream:?}"))?;

    let mut opts = DiffOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let diff = repo
        .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))
        .context("failed to diff against the upstream tree")?;

    let mut files = Vec::new();
    for delta in diff.deltas() {
        let action = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => FileAction::Added,
            Delta::Modified | Delta::Renamed | Delta::Typechange => FileAction::Modified,
            Delta::Deleted => FileAction::Deleted,
            _ => continue,
        };
        let file = match action {
            FileAction::Deleted => delta.old_file(),
            _ => delta.new_file(),
        };
        if let Some(path) = file.path() {
            files.push(ChangedFile::new(
                action,
                normalize_path(&path.to_string_lossy()),
            ));
        }
    }
    Ok(files)
}

/// Upstream contents for every rule file touched by the change, keyed by
/// repo-relative rule-file path. Rule files added in this change map to
/// empty contents, pinning resolution to "no rules here yet".
pub fn rules_overrides(
    repo: &Repository,
    upstream: &str,
    changed: &[ChangedFile],
) -> Result<HashMap<String, String>> {
    let tree = repo
        .revparse_single(upstream)
        .and_then(|obj| obj.peel_to_tree())
        .with_context(|| format!("cannot resolve upstream revision {upstream:?}"))?;

    let mut overrides = HashMap::new();
    for file in changed {
        if basename(&file.path) != RULES_FILE {
            continue;
        }
        let contents = tree
            .get_path(Path::new(&file.path))
            .ok()
            .and_then(|entry| entry.to_object(repo).ok())
            .and_then(|obj| obj.peel_to_blob().ok())
            .map(|blob| String::from_utf8_lossy(blob.content()).into_owned())
            .unwrap_or_default();
        overrides.insert(file.path.clone(), contents);
    }
    Ok(overrides)
}
