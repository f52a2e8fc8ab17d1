//! Grouping changed files into directory-cohesive, size-bounded bins.

use clsplit_core::change::ChangedFile;

use crate::trie::DirectoryTrie;

/// A cluster of changed files destined to become one reviewable sub-change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    /// Directory prefix the cluster was cut at (empty for the root).
    pub prefix: String,
    pub files: Vec<ChangedFile>,
    /// True when the bin absorbed files from below its own prefix rather
    /// than standing for a single directory.
    pub has_parent: bool,
}

impl Bin {
    fn new(prefix: String, files: Vec<ChangedFile>) -> Self {
        let has_parent = files.iter().any(|f| f.directory() != prefix);
        Self {
            prefix,
            files,
            has_parent,
        }
    }
}

/// A not-yet-emitted cluster bubbling up toward the root.
struct Candidate {
    prefix: String,
    files: Vec<ChangedFile>,
}

/// Partition `files` into bins of `min_files..=max_files` files sharing a
/// directory prefix.
///
/// Directories are visited children-first (reverse arena order stands in for
/// post-order; parents always have smaller indices). A directory whose
/// subtree fits within `max_files` merges into a single candidate: larger
/// granularity is always preferred. When a directory overflows, each
/// subdirectory candidate of at least `min_files` is emitted under its own
/// prefix; everything else pools here, max-sized chunks of the pool are
/// emitted at this prefix, and the remainder bubbles up to be re-evaluated
/// by the parent. The root always emits its remainder, even when undersized
/// or alone, so every input file lands in exactly one bin.
///
/// Returned bins are ordered by prefix.
pub fn cluster_files(files: &[ChangedFile], min_files: usize, max_files: usize) -> Vec<Bin> {
    debug_assert!(min_files >= 1 && min_files <= max_files);

    let mut trie = DirectoryTrie::new();
    trie.add_files(files);

    let mut bins: Vec<Bin> = Vec::new();
    let mut candidates: Vec<Option<Candidate>> = (0..trie.len()).map(|_| None).collect();

    for id in trie.ids().rev() {
        let node = trie.node(id);
        let child_candidates: Vec<Candidate> = node
            .subdirectories
            .values()
            .filter_map(|&child| candidates[child].take())
            .collect();
        let direct = node.files.clone();

        let total: usize = direct.len() + child_candidates.iter().map(|c| c.files.len()).sum::<usize>();
        if total == 0 {
            continue;
        }

        if total <= max_files {
            // The whole subtree fits: merge at this directory.
            let mut merged = direct;
            for candidate in child_candidates {
                merged.extend(candidate.files);
            }
            candidates[id] = Some(Candidate {
                prefix: node.prefix.clone(),
                files: merged,
            });
            continue;
        }

        let mut pool = direct;
        for candidate in child_candidates {
            if candidate.files.len() >= min_files {
                bins.push(Bin::new(candidate.prefix, candidate.files));
            } else {
                pool.extend(candidate.files);
            }
        }
        while pool.len() > max_files {
            let chunk: Vec<ChangedFile> = pool.drain(..max_files).collect();
            bins.push(Bin::new(node.prefix.clone(), chunk));
        }
        if !pool.is_empty() {
            candidates[id] = Some(Candidate {
                prefix: node.prefix.clone(),
                files: pool,
            });
        }
    }

    if let Some(root) = candidates[trie.root()].take() {
        bins.push(Bin::new(root.prefix, root.files));
    }

    bins.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    bins
}
