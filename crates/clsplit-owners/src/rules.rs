//! Per-directory ownership rule files.
//!
//! Line grammar:
//! - `email@domain` or `*`: unrestricted owner rule
//! - `per-file <glob>=<email>[,<email>...]`: rule scoped to basenames
//!   matching the glob
//! - `set noparent`: stop inheriting rules from parent directories
//! - `set status <file>`: reference to a status sub-file
//! - `# ...`: comment (whole-line or trailing)
//!
//! Anything else is a fatal [`InvalidOwnersConfig`].

use globset::{Glob, GlobMatcher};

/// Wildcard owner matching any reviewer or approver.
pub const EVERYONE: &str = "*";

/// Conventional basename of the rule file in each directory.
pub const RULES_FILE: &str = "OWNERS";

/// An ownership rule file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid owners config in {path} line {line}: {message}")]
pub struct InvalidOwnersConfig {
    /// Repo-relative path of the offending rule file.
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// A basename glob scoping a `per-file` rule.
#[derive(Debug, Clone)]
pub struct PerFilePattern {
    pattern: String,
    matcher: GlobMatcher,
}

impl PerFilePattern {
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let matcher = Glob::new(pattern)?.compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, basename: &str) -> bool {
        self.matcher.is_match(basename)
    }
}

/// One rule inside an ownership file.
#[derive(Debug, Clone, Default)]
pub struct OwnersRule {
    /// Owner emails (or [`EVERYONE`]); empty for bare directives.
    pub owners: Vec<String>,
    /// Restricts the rule to matching basenames; `None` matches everything.
    pub per_file: Option<PerFilePattern>,
    /// Stops upward rule inheritance at this directory.
    pub noparent: bool,
    /// Trailing free-text comment, if any.
    pub comment: Option<String>,
}

impl OwnersRule {
    /// Whether this rule applies to a file with the given basename.
    pub fn applies_to(&self, basename: &str) -> bool {
        match &self.per_file {
            Some(pattern) => pattern.matches(basename),
            None => true,
        }
    }
}

/// A parsed per-directory ownership file.
///
/// Constructed once per resolution session from raw contents (which may come
/// from an uncommitted local override) and immutable afterwards; the index
/// caches one per directory.
#[derive(Debug, Clone)]
pub struct OwnersFile {
    /// Repo-relative directory this file governs (empty for the root).
    pub directory: String,
    pub rules: Vec<OwnersRule>,
    /// Status sub-file referenced by a `set status` directive.
    pub status_file: Option<String>,
}

impl OwnersFile {
    /// Parse raw rule-file contents for a directory.
    pub fn parse(directory: &str, contents: &str) -> Result<Self, InvalidOwnersConfig> {
        let path = rules_file_path(directory);
        let mut rules = Vec::new();
        let mut status_file = None;

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let (text, comment) = split_comment(raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }

            if line == "set noparent" {
                rules.push(OwnersRule {
                    noparent: true,
                    comment,
                    ..Default::default()
                });
            } else if let Some(rest) = line.strip_prefix("set status ") {
                status_file = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("per-file ") {
                rules.push(parse_per_file(&path, line_no, rest, comment)?);
            } else if is_owner_token(line) {
                rules.push(OwnersRule {
                    owners: vec![line.to_string()],
                    comment,
                    ..Default::default()
                });
            } else {
                return Err(InvalidOwnersConfig {
                    path,
                    line: line_no,
                    message: format!("unparsable rule {line:?}"),
                });
            }
        }

        Ok(Self {
            directory: directory.to_string(),
            rules,
            status_file,
        })
    }

    /// Whether any rule here blocks inheritance from parent directories.
    pub fn stops_inheritance(&self) -> bool {
        self.rules.iter().any(|r| r.noparent)
    }

    /// Owners granted to a file with the given basename, in rule order.
    pub fn owners_for<'a>(&'a self, basename: &'a str) -> impl Iterator<Item = &'a str> {
        self.rules
            .iter()
            .filter(move |r| r.applies_to(basename))
            .flat_map(|r| r.owners.iter().map(String::as_str))
    }
}

/// Repo-relative path of the rule file for a directory.
pub fn rules_file_path(directory: &str) -> String {
    if directory.is_empty() {
        RULES_FILE.to_string()
    } else {
        format!("{directory}/{RULES_FILE}")
    }
}

fn split_comment(raw: &str) -> (&str, Option<String>) {
    match raw.find('#') {
        Some(idx) => {
            let comment = raw[idx + 1..].trim();
            let comment = (!comment.is_empty()).then(|| comment.to_string());
            (&raw[..idx], comment)
        }
        None => (raw, None),
    }
}

fn parse_per_file(
    path: &str,
    line_no: usize,
    rest: &str,
    comment: Option<String>,
) -> Result<OwnersRule, InvalidOwnersConfig> {
    let Some((glob, owners)) = rest.split_once('=') else {
        return Err(InvalidOwnersConfig {
            path: path.to_string(),
            line: line_no,
            message: "per-file rule is missing '='".to_string(),
        });
    };

    let per_file = PerFilePattern::new(glob.trim()).map_err(|e| InvalidOwnersConfig {
        path: path.to_string(),
        line: line_no,
        message: format!("bad per-file glob: {e}"),
    })?;

    let owners: Vec<String> = owners
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if owners.is_empty() || !owners.iter().all(|o| is_owner_token(o)) {
        return Err(InvalidOwnersConfig {
            path: path.to_string(),
            line: line_no,
            message: format!("per-file owners list {owners:?} is not a list of emails"),
        });
    }

    Ok(OwnersRule {
        owners,
        per_file: Some(per_file),
        comment,
        ..Default::default()
    })
}

fn is_owner_token(token: &str) -> bool {
    token == EVERYONE
        || (token.contains('@') && !token.contains(char::is_whitespace) && !token.contains(','))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_owners() {
        let file = OwnersFile::parse("foo", "alice@example.com\nbob@example.com\n").unwrap();
        assert_eq!(file.directory, "foo");
        assert_eq!(file.rules.len(), 2);
        let owners: Vec<_> = file.owners_for("anything.cc").collect();
        assert_eq!(owners, vec!["alice@example.com", "bob@example.com"]);
        assert!(!file.stops_inheritance());
    }

    #[test]
    fn test_parse_everyone() {
        let file = OwnersFile::parse("bar/everyone", "*\n").unwrap();
        let owners: Vec<_> = file.owners_for("foo.txt").collect();
        assert_eq!(owners, vec![EVERYONE]);
    }

    #[test]
    fn test_parse_per_file_scoping() {
        let contents = "\
per-file approved.cc=approver@example.com
per-file reviewed.h=reviewer@example.com
missing@example.com
";
        let file = OwnersFile::parse("", contents).unwrap();
        let owners: Vec<_> = file.owners_for("approved.cc").collect();
        assert_eq!(owners, vec!["approver@example.com", "missing@example.com"]);
        let owners: Vec<_> = file.owners_for("other.py").collect();
        assert_eq!(owners, vec!["missing@example.com"]);
    }

    #[test]
    fn test_parse_per_file_glob_and_multiple_owners() {
        let file =
            OwnersFile::parse("ui", "per-file *.gn=build@example.com,infra@example.com\n").unwrap();
        let owners: Vec<_> = file.owners_for("BUILD.gn").collect();
        assert_eq!(owners, vec!["build@example.com", "infra@example.com"]);
        assert!(file.owners_for("main.cc").next().is_none());
    }

    #[test]
    fn test_parse_noparent_and_comments() {
        let contents = "\
# Top comment
set noparent
alice@example.com  # escalation contact
";
        let file = OwnersFile::parse("sec", contents).unwrap();
        assert!(file.stops_inheritance());
        let owner_rule = file.rules.iter().find(|r| !r.owners.is_empty()).unwrap();
        assert_eq!(owner_rule.comment.as_deref(), Some("escalation contact"));
    }

    #[test]
    fn test_parse_status_directive() {
        let file = OwnersFile::parse("gfx", "set status OWNERS.status\nx@example.com\n").unwrap();
        assert_eq!(file.status_file.as_deref(), Some("OWNERS.status"));
    }

    #[test]
    fn test_parse_invalid_directive_is_fatal() {
        let err = OwnersFile::parse("", "foo@example.com\ninvalid directive\n").unwrap_err();
        assert_eq!(err.path, "OWNERS");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unparsable"));
    }

    #[test]
    fn test_parse_per_file_without_equals_is_fatal() {
        let err = OwnersFile::parse("x", "per-file *.cc\n").unwrap_err();
        assert_eq!(err.path, "x/OWNERS");
        assert!(err.message.contains("missing '='"));
    }

    #[test]
    fn test_rules_file_path() {
        assert_eq!(rules_file_path(""), "OWNERS");
        assert_eq!(rules_file_path("a/b"), "a/b/OWNERS");
    }
}
