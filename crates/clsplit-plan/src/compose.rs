//! Turning bins into an ordered split plan with suggested reviewers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use clsplit_core::change::ChangedFile;
use clsplit_owners::client::OwnersClient;
use clsplit_owners::index::OwnersError;
use clsplit_owners::suggest::ReviewerSuggester;

use crate::cluster::Bin;

/// One reviewable sub-change: who reviews it, what it says, what it touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClInfo {
    pub reviewers: Vec<String>,
    pub description: String,
    pub files: Vec<ChangedFile>,
}

/// An ordered list of sub-changes covering one original change exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub cls: Vec<ClInfo>,
}

impl SplitPlan {
    /// Every file referenced by the plan, in plan order.
    pub fn all_files(&self) -> impl Iterator<Item = &ChangedFile> {
        self.cls.iter().flat_map(|cl| cl.files.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.cls.is_empty()
    }
}

/// Advisory findings from plan composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeWarning {
    /// The reviewer search could not cover every file in a sub-change.
    IncompleteCover {
        description: String,
        uncovered: Vec<String>,
    },
}

impl fmt::Display for ComposeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteCover {
                description,
                uncovered,
            } => write!(
                f,
                "no owner covers {} file(s) in {:?}; add reviewers by hand",
                uncovered.len(),
                description,
            ),
        }
    }
}

/// Distinct directories touched by a bin, sorted, with the repository root
/// shown as `.`.
pub fn bin_directories(bin: &Bin) -> Vec<String> {
    let dirs: BTreeSet<String> = bin
        .files
        .iter()
        .map(|f| {
            let dir = f.directory();
            if dir.is_empty() {
                ".".to_string()
            } else {
                dir.to_string()
            }
        })
        .collect();
    dirs.into_iter().collect()
}

/// Substitute `$directory` in a description template with the directory a
/// sub-change touches, or the list of them.
pub fn format_description(template: &str, directories: &[String]) -> String {
    let rendered = match directories {
        [single] => single.clone(),
        many => format!("{many:?}"),
    };
    template.replace("$directory", &rendered)
}

/// Build one [`ClInfo`] per bin, in bin order.
///
/// Reviewers come from the covering-set search over each bin's files; an
/// incomplete cover is reported as a warning beside the plan rather than
/// failing composition. Bins never share files, so neither do the resulting
/// sub-changes.
pub fn compose_plan(
    client: &dyn OwnersClient,
    bins: &[Bin],
    template: &str,
    max_combinations: usize,
) -> Result<(SplitPlan, Vec<ComposeWarning>), OwnersError> {
    let suggester = ReviewerSuggester::new(client).with_max_combinations(max_combinations);
    let mut cls = Vec::with_capacity(bins.len());
    let mut warnings = Vec::new();

    for bin in bins {
        let paths: Vec<String> = bin.files.iter().map(|f| f.path.clone()).collect();
        let suggestion = suggester.suggest_owners(&paths)?;
        let description = format_description(template, &bin_directories(bin));

        if !suggestion.is_complete() {
            warnings.push(ComposeWarning::IncompleteCover {
                description: description.clone(),
                uncovered: suggestion.uncovered.clone(),
            });
        }

        cls.push(ClInfo {
            reviewers: suggestion.owners,
            description,
            files: bin.files.clone(),
        });
    }

    Ok((SplitPlan { cls }, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::cluster_files;
    use clsplit_core::change::FileAction;
    use clsplit_owners::client::LocalRuleClient;
    use clsplit_owners::index::{MapRuleSource, NoJitter, OwnershipIndex};
    use std::collections::BTreeSet;

    fn changed(paths: &[&str]) -> Vec<ChangedFile> {
        paths
            .iter()
            .map(|p| ChangedFile::new(FileAction::Modified, p))
            .collect()
    }

    fn client(source: MapRuleSource) -> LocalRuleClient<MapRuleSource> {
        LocalRuleClient::new(OwnershipIndex::new(source).with_tie_breaker(NoJitter))
    }

    #[test]
    fn test_format_description() {
        let template = "Convert use of X to Y in $directory.";
        assert_eq!(
            format_description(template, &["foo".to_string()]),
            "Convert use of X to Y in foo.",
        );
        assert_eq!(
            format_description(template, &["foo".to_string(), "bar".to_string()]),
            "Convert use of X to Y in [\"foo\", \"bar\"].",
        );
    }

    #[test]
    fn test_bin_directories_root_as_dot() {
        let bin = Bin {
            prefix: String::new(),
            files: changed(&["top.gn", "i/j/k.cc"]),
            has_parent: true,
        };
        assert_eq!(bin_directories(&bin), vec![".".to_string(), "i/j".to_string()]);
    }

    #[test]
    fn test_compose_assigns_reviewers_per_bin() {
        let mut source = MapRuleSource::new();
        source
            .insert("a", "alice@example.com\n")
            .insert("i", "ivan@example.com\n")
            .insert("", "root@example.com\n");
        let client = client(source);

        let files = changed(&["a/one.cc", "a/two.cc", "i/three.cc", "i/four.cc"]);
        let bins = cluster_files(&files, 1, 2);
        let (plan, warnings) =
            compose_plan(&client, &bins, "Split $directory", 10_000).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(plan.cls.len(), bins.len());

        let a_cl = plan.cls.iter().find(|cl| cl.description == "Split a").unwrap();
        assert_eq!(a_cl.reviewers, vec!["alice@example.com"]);
        let i_cl = plan.cls.iter().find(|cl| cl.description == "Split i").unwrap();
        assert_eq!(i_cl.reviewers, vec!["ivan@example.com"]);
    }

    #[test]
    fn test_compose_preserves_partition() {
        let mut source = MapRuleSource::new();
        source.insert("", "root@example.com\n");
        let client = client(source);

        let files = changed(&[
            "a/b/c.cc",
            "a/b/d.h",
            "a/e/f/g/h.hpp",
            "i/j/k.cc",
            "a/l.cpp",
            "top.gn",
        ]);
        let bins = cluster_files(&files, 1, 2);
        let (plan, _) = compose_plan(&client, &bins, "$directory", 10_000).unwrap();

        let expected: BTreeSet<&ChangedFile> = files.iter().collect();
        let mut seen = BTreeSet::new();
        for file in plan.all_files() {
            assert!(seen.insert(file), "file {file} in two sub-changes");
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_compose_warns_on_uncovered_files() {
        // No rules at all: every bin gets an empty reviewer list plus an
        // advisory warning, never an error.
        let client = client(MapRuleSource::new());
        let files = changed(&["x/a.cc"]);
        let bins = cluster_files(&files, 1, 10);
        let (plan, warnings) = compose_plan(&client, &bins, "$directory", 10_000).unwrap();

        assert_eq!(plan.cls.len(), 1);
        assert!(plan.cls[0].reviewers.is_empty());
        assert_eq!(warnings.len(), 1);
        let ComposeWarning::IncompleteCover { uncovered, .. } = &warnings[0];
        assert_eq!(uncovered, &vec!["x/a.cc".to_string()]);
    }
}
