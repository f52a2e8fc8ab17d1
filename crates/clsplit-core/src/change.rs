//! Changed-file model: what the SCM layer hands us for one change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happened to a file in the change under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Added,
    Modified,
    Deleted,
}

impl FileAction {
    /// Single-letter status code, matching `git status --porcelain` output.
    pub const fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error for an unrecognized file-action code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown file action {0:?} (expected A, M, or D)")]
pub struct UnknownAction(pub String);

impl FromStr for FileAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Added),
            "M" => Ok(Self::Modified),
            "D" => Ok(Self::Deleted),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// One `(action, path)` entry in a change.
///
/// The path is repo-relative and normalized (see [`normalize_path`]) at
/// construction; it never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangedFile {
    pub action: FileAction,
    pub path: String,
}

impl ChangedFile {
    pub fn new(action: FileAction, path: impl AsRef<str>) -> Self {
        Self {
            action,
            path: normalize_path(path.as_ref()),
        }
    }

    /// The file's basename (final path segment).
    pub fn basename(&self) -> &str {
        basename(&self.path)
    }

    /// The file's containing directory, empty for top-level files.
    pub fn directory(&self) -> &str {
        parent_dir(&self.path)
    }
}

impl fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.path)
    }
}

/// Normalize a repo-relative path: forward slashes only, no leading `./`,
/// no duplicate or trailing separators.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
    {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Final segment of a normalized path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Containing directory of a normalized path, empty for top-level entries.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Split a normalized path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip() {
        for action in [FileAction::Added, FileAction::Modified, FileAction::Deleted] {
            let code = action.to_string();
            assert_eq!(code.parse::<FileAction>().unwrap(), action);
        }
        assert!("X".parse::<FileAction>().is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./foo/bar.cc"), "foo/bar.cc");
        assert_eq!(normalize_path("foo//bar.cc"), "foo/bar.cc");
        assert_eq!(normalize_path("foo\\bar\\baz.h"), "foo/bar/baz.h");
        assert_eq!(normalize_path("foo/bar/"), "foo/bar");
        assert_eq!(normalize_path("top.gn"), "top.gn");
    }

    #[test]
    fn test_basename_and_directory() {
        let file = ChangedFile::new(FileAction::Modified, "a/b/c.cc");
        assert_eq!(file.basename(), "c.cc");
        assert_eq!(file.directory(), "a/b");

        let top = ChangedFile::new(FileAction::Added, "top.gn");
        assert_eq!(top.basename(), "top.gn");
        assert_eq!(top.directory(), "");
    }

    #[test]
    fn test_display() {
        let file = ChangedFile::new(FileAction::Deleted, "foo/b.cc");
        assert_eq!(file.to_string(), "D foo/b.cc");
    }
}
