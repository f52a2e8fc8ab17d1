//! Minimal covering reviewer sets via ordered combination search.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::client::OwnersClient;
use crate::index::OwnersError;
use crate::rules::EVERYONE;

/// Outcome of a reviewer search.
///
/// An incomplete cover is a legitimate state, not an error: it means some
/// paths have no resolvable owner, or the combination ceiling was hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggested owners, in enumeration order (best-scored last).
    pub owners: Vec<String>,
    /// Paths not covered by `owners`; empty for a full cover.
    pub uncovered: Vec<String>,
}

impl Suggestion {
    pub fn is_complete(&self) -> bool {
        self.uncovered.is_empty()
    }
}

/// Searches for a small owner set that collectively covers a file group.
pub struct ReviewerSuggester<'a> {
    client: &'a dyn OwnersClient,
    max_combinations: usize,
}

impl<'a> ReviewerSuggester<'a> {
    pub fn new(client: &'a dyn OwnersClient) -> Self {
        Self {
            client,
            max_combinations: 1_000_000,
        }
    }

    /// Cap on combinations examined before the search gives up and returns
    /// the best partial cover seen.
    pub fn with_max_combinations(mut self, max_combinations: usize) -> Self {
        self.max_combinations = max_combinations.max(1);
        self
    }

    /// Suggest owners covering every path.
    ///
    /// Each candidate owner is scored by its best rank-index across the
    /// paths it owns (index 0 = strongest owner of some path); candidates
    /// are then tried in combinations of growing size, ordered so that
    /// better-scored sets come first (see [`owner_combinations`]). Paths
    /// owned by [`EVERYONE`] need no cover. The first combination covering
    /// everything wins.
    ///
    /// The search space is `O(n choose k)` per size `k`: fine for the
    /// single- and low-double-digit candidate lists seen in practice, but a
    /// cliff for pathological inputs, which is why `max_combinations`
    /// bounds it.
    pub fn suggest_owners(&self, paths: &[String]) -> Result<Suggestion, OwnersError> {
        let mut order: Vec<String> = Vec::new();
        let mut paths_by_owner: HashMap<String, BTreeSet<usize>> = HashMap::new();
        let mut score_by_owner: HashMap<String, usize> = HashMap::new();
        let mut required: BTreeSet<usize> = BTreeSet::new();

        for (path_idx, path) in paths.iter().enumerate() {
            let ranking = self.client.list_owners(path)?;
            if ranking.contains(EVERYONE) {
                // Anyone may review this path; it constrains nothing.
                continue;
            }
            required.insert(path_idx);
            for (rank_idx, owner) in ranking.owners().enumerate() {
                paths_by_owner
                    .entry(owner.to_string())
                    .or_insert_with(|| {
                        order.push(owner.to_string());
                        BTreeSet::new()
                    })
                    .insert(path_idx);
                score_by_owner
                    .entry(owner.to_string())
                    .and_modify(|s| *s = (*s).min(rank_idx))
                    .or_insert(rank_idx);
            }
        }

        if required.is_empty() {
            return Ok(Suggestion::default());
        }

        // Stable sort keeps first-seen order among equal scores.
        let mut owners = order;
        owners.sort_by_key(|o| score_by_owner[o]);

        if owners.len() < 2 {
            let covered = owners
                .first()
                .map(|o| paths_by_owner[o].clone())
                .unwrap_or_default();
            return Ok(build_suggestion(paths, owners, &required, &covered));
        }

        let mut examined = 0usize;
        let mut best_combo: Vec<String> = Vec::new();
        let mut best_covered: BTreeSet<usize> = BTreeSet::new();

        for size in 1..owners.len() {
            for combo in owner_combinations(owners.len(), size) {
                examined += 1;
                let selected: Vec<String> =
                    combo.iter().map(|&i| owners[i].clone()).collect();
                let covered: BTreeSet<usize> = selected
                    .iter()
                    .flat_map(|o| paths_by_owner[o].iter().copied())
                    .collect();

                if covered.is_superset(&required) {
                    return Ok(Suggestion {
                        owners: selected,
                        uncovered: Vec::new(),
                    });
                }
                if covered.len() > best_covered.len() {
                    best_covered = covered;
                    best_combo = selected;
                }
                if examined >= self.max_combinations {
                    tracing::warn!(
                        examined,
                        candidates = owners.len(),
                        "combination ceiling hit; returning best partial cover"
                    );
                    return Ok(build_suggestion(paths, best_combo, &required, &best_covered));
                }
            }
        }

        // No combination of fewer than all candidates covers everything.
        Ok(build_suggestion(paths, best_combo, &required, &best_covered))
    }
}

fn build_suggestion(
    paths: &[String],
    owners: Vec<String>,
    required: &BTreeSet<usize>,
    covered: &BTreeSet<usize>,
) -> Suggestion {
    let uncovered = required
        .difference(covered)
        .map(|&i| paths[i].clone())
        .collect();
    Suggestion { owners, uncovered }
}

/// Size-`size` combinations of `0..count`, each listed highest index first.
///
/// Enumeration order follows the score of a combination, defined as the
/// maximum index of its members (then the remaining members' indices):
///
/// ```
/// # use clsplit_owners::suggest::owner_combinations;
/// let combos: Vec<_> = owner_combinations(4, 2).collect();
/// assert_eq!(
///     combos,
///     vec![
///         // score 1
///         vec![1, 0],
///         // score 2
///         vec![2, 0],
///         vec![2, 1],
///         // score 3
///         vec![3, 0],
///         vec![3, 1],
///         vec![3, 2],
///     ],
/// );
/// ```
pub fn owner_combinations(count: usize, size: usize) -> OwnerCombinations {
    let current = (size > 0 && size <= count).then(|| (0..size).rev().collect());
    OwnerCombinations {
        count,
        size,
        current,
    }
}

/// Iterator behind [`owner_combinations`].
pub struct OwnerCombinations {
    count: usize,
    size: usize,
    /// Next combination to yield, kept strictly descending.
    current: Option<Vec<usize>>,
}

impl Iterator for OwnerCombinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let combo = self.current.take()?;

        // Successor in lexicographic order over descending tuples: bump the
        // rightmost member that has room, reset everything after it to the
        // smallest valid descending tail.
        let mut next = combo.clone();
        let mut advanced = false;
        for i in (0..self.size).rev() {
            let bound = if i == 0 { self.count } else { next[i - 1] };
            if next[i] + 1 < bound {
                next[i] += 1;
                for j in i + 1..self.size {
                    next[j] = self.size - 1 - j;
                }
                advanced = true;
                break;
            }
        }
        if advanced {
            self.current = Some(next);
        }

        Some(combo)
    }
}
