//! Progressive pairwise duplicate finder.
//!
//! Reads are classified in rounds of increasing ambiguity budget. Round `n` looks at every
//! still-unclassified read with at most `n` wildcards and compares it against the
//! representative of each existing cluster. Round 0 only looks for exact copies. This is
//! O(reads × clusters × length) and exists to cross-check the trie pipeline.

use crate::collapse::{
    ambiguous_count, normalize_wildcards, CollapseConfig, CollapseStats, DedupError,
};
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// One canonical sequence and the reads that matched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    /// Read that founded the cluster
    pub seed: usize,
    pub sequence: Vec<u8>,
    /// Every read in the cluster, seed first, in classification order
    pub members: Vec<usize>,
}

impl DuplicateSet {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateSets {
    /// Clusters in creation order
    pub clusters: Vec<DuplicateSet>,
    /// Reads never classified because they exceed the ambiguity budget
    pub unclassified: Vec<usize>,
}

/// Position-by-position comparison over the shorter of the two sequences. Positions past
/// the end of the shorter sequence are ignored and a wildcard on either side always agrees.
pub fn sequences_equal(a: &[u8], b: &[u8], wildcard: u8) -> bool {
    a.iter()
        .zip(b)
        .all(|(&x, &y)| x == y || x == wildcard || y == wildcard)
}

/// Strip leading and trailing runs of `wildcard`
pub fn trim_wildcards(sequence: &[u8], wildcard: u8) -> &[u8] {
    let start = sequence
        .iter()
        .position(|&s| s != wildcard)
        .unwrap_or(sequence.len());
    let end = sequence
        .iter()
        .rposition(|&s| s != wildcard)
        .map_or(start, |i| i + 1);
    &sequence[start..end]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseEngine {
    /// Ignore leading and trailing wildcards when counting and comparing
    pub inner: bool,
}

impl PairwiseEngine {
    pub fn new(inner: bool) -> Self {
        Self { inner }
    }

    pub fn duplicate_sets(
        &self,
        reads: &[Vec<u8>],
        config: &CollapseConfig,
    ) -> Result<(DuplicateSets, CollapseStats), DedupError> {
        config.validate()?;
        let wildcard = config.primary_wildcard();
        let max_ambiguous = config.max_ambiguous_count();

        let sequences = normalize_wildcards(reads, config.wildcard_symbols.as_bytes());
        let keys: Vec<&[u8]> = sequences
            .iter()
            .map(|sequence| {
                if self.inner {
                    trim_wildcards(sequence, wildcard)
                } else {
                    sequence.as_ref()
                }
            })
            .collect();
        let counts: Vec<usize> = keys
            .par_iter()
            .map(|key| ambiguous_count(key, wildcard))
            .collect();

        let mut clusters: Vec<DuplicateSet> = Vec::new();
        let mut exact: FxHashMap<&[u8], usize> = FxHashMap::default();
        let mut pool: Vec<usize> = (0..keys.len()).collect();

        for budget in 0..=max_ambiguous {
            if pool.is_empty() {
                break;
            }
            let scoring = budget > 0;
            pool.retain(|&idx| {
                if counts[idx] > budget {
                    return true;
                }
                let key = keys[idx];
                let hit = if scoring {
                    clusters
                        .iter()
                        .position(|cluster| sequences_equal(key, &cluster.sequence, wildcard))
                } else {
                    exact.get(key).copied()
                };
                match hit {
                    Some(c) => clusters[c].members.push(idx),
                    None => {
                        exact.entry(key).or_insert(clusters.len());
                        clusters.push(DuplicateSet {
                            seed: idx,
                            sequence: key.to_vec(),
                            members: vec![idx],
                        });
                    }
                }
                false
            });
            debug!(
                "Ambiguity budget {}: {} clusters, {} reads left",
                budget,
                clusters.len(),
                pool.len()
            );
        }

        let exact_unique = keys.iter().collect::<FxHashSet<_>>().len();
        let stats = CollapseStats {
            raw_reads: keys.len(),
            exact_unique,
            within_budget: keys.len() - pool.len(),
            canonical: clusters.len(),
            ..Default::default()
        };
        info!(
            "Number of reads (after pairwise dedup) = {}, unclassified = {}",
            clusters.len(),
            pool.len()
        );

        Ok((
            DuplicateSets {
                clusters,
                unclassified: pool,
            },
            stats,
        ))
    }
}
