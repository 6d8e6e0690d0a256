use crate::collapse::{
    collapse_seq, normalize_wildcards, prepare, CollapseConfig, CollapseOutput, Collapsed,
    DedupError, OutputMode,
};
use crate::pairwise::{sequences_equal, trim_wildcards, PairwiseEngine};
use crate::trie::Trie;
use std::time::Instant;

// Trait for the interchangeable duplicate finders
pub trait DedupEngine {
    fn name(&self) -> &'static str;

    /// Whether this engine treats `a` and `b` as duplicates of each other
    fn equivalent(&self, a: &[u8], b: &[u8], config: &CollapseConfig) -> bool;

    fn collapse(
        &self,
        reads: &[Vec<u8>],
        config: &CollapseConfig,
    ) -> Result<CollapseOutput, DedupError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrieEngine;

impl DedupEngine for TrieEngine {
    fn name(&self) -> &'static str {
        "trie"
    }

    fn equivalent(&self, a: &[u8], b: &[u8], config: &CollapseConfig) -> bool {
        let Ok(alphabet) = config.build_alphabet() else {
            return false;
        };
        let mut trie = Trie::new(&alphabet, Some(config.primary_wildcard()));
        trie.add(a).is_ok() && trie.matches(b)
    }

    fn collapse(
        &self,
        reads: &[Vec<u8>],
        config: &CollapseConfig,
    ) -> Result<CollapseOutput, DedupError> {
        collapse_seq(reads, config)
    }
}

impl DedupEngine for PairwiseEngine {
    fn name(&self) -> &'static str {
        "pairwise"
    }

    fn equivalent(&self, a: &[u8], b: &[u8], config: &CollapseConfig) -> bool {
        sequences_equal(a, b, config.primary_wildcard())
    }

    fn collapse(
        &self,
        reads: &[Vec<u8>],
        config: &CollapseConfig,
    ) -> Result<CollapseOutput, DedupError> {
        let start_time = Instant::now();

        if config.output_mode == OutputMode::ExactSortOnly {
            config.validate()?;
            // With `inner`, flanking wildcards are gone before dedup and counting
            let trimmed: Vec<Vec<u8>>;
            let input: &[Vec<u8>] = if self.inner {
                let wildcard = config.primary_wildcard();
                trimmed = normalize_wildcards(reads, config.wildcard_symbols.as_bytes())
                    .iter()
                    .map(|sequence| trim_wildcards(sequence, wildcard).to_vec())
                    .collect();
                &trimmed
            } else {
                reads
            };
            let prepared = prepare(input, config);
            let mut stats = prepared.base_stats();
            stats.canonical = prepared.order.len();
            return Ok(CollapseOutput {
                result: Collapsed::UniqueIndices(prepared.order),
                stats,
                elapsed: start_time.elapsed(),
            });
        }

        let (sets, stats) = self.duplicate_sets(reads, config)?;
        let result = match config.output_mode {
            OutputMode::FullMapping => {
                let mut mapping = vec![None; reads.len()];
                for cluster in &sets.clusters {
                    for &member in &cluster.members {
                        mapping[member] = Some(cluster.seed);
                    }
                }
                Collapsed::Mapping(mapping)
            }
            _ => Collapsed::UniqueIndices(sets.clusters.iter().map(|c| c.seed).collect()),
        };

        Ok(CollapseOutput {
            result,
            stats,
            elapsed: start_time.elapsed(),
        })
    }
}

/// Engine selection by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Trie,
    Pairwise { inner: bool },
}

impl Engine {
    pub fn as_dyn(&self) -> Box<dyn DedupEngine> {
        match *self {
            Engine::Trie => Box::new(TrieEngine),
            Engine::Pairwise { inner } => Box::new(PairwiseEngine::new(inner)),
        }
    }
}
