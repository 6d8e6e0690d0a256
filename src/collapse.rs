//! Canonicalization pipeline: exact dedup, ambiguity filter, ordering and the trie sweep.

use crate::alphabet::{Alphabet, AlphabetError};
use crate::trie::Trie;
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum DedupError {
    Config(String),
    Alphabet(AlphabetError),
    UnknownSymbol { index: usize, symbol: u8 },
}

impl std::fmt::Display for DedupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            DedupError::Alphabet(e) => write!(f, "Alphabet error: {}", e),
            DedupError::UnknownSymbol { index, symbol } => write!(
                f,
                "Read {} contains symbol '{}' which is not in the alphabet",
                index,
                symbol.escape_ascii()
            ),
        }
    }
}

impl std::error::Error for DedupError {}

impl From<AlphabetError> for DedupError {
    fn from(e: AlphabetError) -> Self {
        DedupError::Alphabet(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// Canonical read indices in discovery order
    #[default]
    UniqueIndices,
    /// Exact dedup, filter and sort only; no wildcard matching
    ExactSortOnly,
    /// One entry per input read pointing at its canonical read
    FullMapping,
}

/// What to do with reads holding symbols outside the alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownSymbolPolicy {
    /// Keep the read as canonical but never store it, so nothing can match through it
    #[default]
    Ignore,
    /// Fail the run before the sweep starts
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    pub alphabet: String,
    /// Wildcard symbols; every one after the first is rewritten to the first
    pub wildcard_symbols: String,
    pub max_ambiguous: i64,
    /// Caller asserts the reads are already ascending by ambiguous count
    pub assume_sorted: bool,
    pub output_mode: OutputMode,
    pub unknown_symbols: UnknownSymbolPolicy,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            alphabet: "ACGTN".to_string(),
            wildcard_symbols: "N".to_string(),
            max_ambiguous: 500,
            assume_sorted: false,
            output_mode: OutputMode::UniqueIndices,
            unknown_symbols: UnknownSymbolPolicy::Ignore,
        }
    }
}

impl CollapseConfig {
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.alphabet.is_empty() {
            return Err(DedupError::Config(
                "alphabet must contain at least one symbol".to_string(),
            ));
        }
        if !self.alphabet.is_ascii() || !self.wildcard_symbols.is_ascii() {
            return Err(DedupError::Config(
                "alphabet and wildcard symbols must be ASCII".to_string(),
            ));
        }
        if self.wildcard_symbols.is_empty() {
            return Err(DedupError::Config(
                "at least one wildcard symbol is required".to_string(),
            ));
        }
        if self.max_ambiguous < 0 {
            return Err(DedupError::Config(format!(
                "maximum ambiguous count must not be negative (got {})",
                self.max_ambiguous
            )));
        }
        Ok(())
    }

    /// The wildcard every other wildcard symbol is rewritten to
    pub fn primary_wildcard(&self) -> u8 {
        self.wildcard_symbols.as_bytes().first().copied().unwrap_or(b'N')
    }

    pub fn max_ambiguous_count(&self) -> usize {
        self.max_ambiguous.max(0) as usize
    }

    pub fn build_alphabet(&self) -> Result<Alphabet, DedupError> {
        Ok(Alphabet::new(self.alphabet.as_bytes())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collapsed {
    UniqueIndices(Vec<usize>),
    /// `Some(j)`: read maps to canonical read `j` (itself when canonical). `None`: filtered.
    Mapping(Vec<Option<usize>>),
}

impl Collapsed {
    pub fn as_unique_indices(&self) -> Option<&[usize]> {
        match self {
            Collapsed::UniqueIndices(indices) => Some(indices),
            Collapsed::Mapping(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[Option<usize>]> {
        match self {
            Collapsed::Mapping(mapping) => Some(mapping),
            Collapsed::UniqueIndices(_) => None,
        }
    }

    /// Number of canonical reads
    pub fn canonical_count(&self) -> usize {
        match self {
            Collapsed::UniqueIndices(indices) => indices.len(),
            Collapsed::Mapping(mapping) => mapping
                .iter()
                .enumerate()
                .filter(|(i, m)| **m == Some(*i))
                .count(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseStats {
    pub raw_reads: usize,
    pub exact_unique: usize,
    pub within_budget: usize,
    pub canonical: usize,
    /// Canonical reads that could not be stored because of unregistered symbols
    pub unstorable: usize,
    pub trie_nodes: usize,
}

#[derive(Debug, Clone)]
pub struct CollapseOutput {
    pub result: Collapsed,
    pub stats: CollapseStats,
    pub elapsed: Duration,
}

#[inline]
pub fn ambiguous_count(sequence: &[u8], wildcard: u8) -> usize {
    sequence.iter().filter(|&&symbol| symbol == wildcard).count()
}

/// Rewrite every secondary wildcard to the primary one. Reads without secondary
/// wildcards are borrowed as they are.
pub fn normalize_wildcards<'s>(reads: &'s [Vec<u8>], wildcards: &[u8]) -> Vec<Cow<'s, [u8]>> {
    let Some((&primary, secondary)) = wildcards.split_first() else {
        return reads.iter().map(|read| Cow::Borrowed(read.as_slice())).collect();
    };
    if secondary.is_empty() {
        return reads.iter().map(|read| Cow::Borrowed(read.as_slice())).collect();
    }

    reads
        .par_iter()
        .map(|read| {
            if read.iter().any(|symbol| secondary.contains(symbol)) {
                Cow::Owned(
                    read.iter()
                        .map(|&symbol| {
                            if secondary.contains(&symbol) {
                                primary
                            } else {
                                symbol
                            }
                        })
                        .collect(),
                )
            } else {
                Cow::Borrowed(read.as_slice())
            }
        })
        .collect()
}

/// Reads after normalisation, exact dedup, filtering and ordering
pub(crate) struct Prepared<'s> {
    pub sequences: Vec<Cow<'s, [u8]>>,
    /// Representative (first occurrence) of each read's exact group
    pub group_of: Vec<usize>,
    pub exact_unique: usize,
    /// Surviving representatives in sweep order
    pub order: Vec<usize>,
    pub wildcard: u8,
}

pub(crate) fn prepare<'s>(reads: &'s [Vec<u8>], config: &CollapseConfig) -> Prepared<'s> {
    let wildcard = config.primary_wildcard();
    let max_ambiguous = config.max_ambiguous_count();
    let sequences = normalize_wildcards(reads, config.wildcard_symbols.as_bytes());
    info!("Number of reads (raw) = {}", sequences.len());

    let mut group_of = Vec::with_capacity(sequences.len());
    let mut representatives = Vec::new();
    {
        let mut first_seen: FxHashMap<&[u8], usize> = FxHashMap::default();
        for (idx, sequence) in sequences.iter().enumerate() {
            let rep = *first_seen.entry(sequence.as_ref()).or_insert_with(|| {
                representatives.push(idx);
                idx
            });
            group_of.push(rep);
        }
    }
    let exact_unique = representatives.len();
    info!(
        "Number of reads (filtering out exact matches) = {}",
        exact_unique
    );

    let counts: Vec<usize> = representatives
        .par_iter()
        .map(|&rep| ambiguous_count(&sequences[rep], wildcard))
        .collect();
    let mut survivors: Vec<(usize, usize)> = representatives
        .into_iter()
        .zip(counts)
        .filter(|&(_, count)| count <= max_ambiguous)
        .collect();

    let mut sort = !config.assume_sorted;
    if config.assume_sorted && survivors.windows(2).any(|w| w[1].1 < w[0].1) {
        warn!("Reads are not sorted by ambiguous count although sorted input was assumed; sorting them instead");
        sort = true;
    }
    if sort {
        debug!("Sorting {} reads by ambiguous count", survivors.len());
        survivors.par_sort_by_key(|&(_, count)| count);
    }
    info!(
        "Number of reads (filtering out exact matches) with at most {} ambiguous symbols = {}",
        max_ambiguous,
        survivors.len()
    );

    Prepared {
        sequences,
        group_of,
        exact_unique,
        order: survivors.into_iter().map(|(rep, _)| rep).collect(),
        wildcard,
    }
}

impl Prepared<'_> {
    /// First surviving representative (by read index) holding a symbol outside `alphabet`
    pub(crate) fn first_unknown_symbol(&self, alphabet: &Alphabet) -> Option<(usize, u8)> {
        let mut survivors = self.order.clone();
        survivors.sort_unstable();
        survivors.into_iter().find_map(|rep| {
            self.sequences[rep]
                .iter()
                .find(|&&symbol| !alphabet.contains(symbol))
                .map(|&symbol| (rep, symbol))
        })
    }

    /// Expand a per-representative resolution to every read of its exact group
    pub(crate) fn expand(&self, resolved: &[Option<usize>]) -> Vec<Option<usize>> {
        self.group_of.iter().map(|&rep| resolved[rep]).collect()
    }

    pub(crate) fn base_stats(&self) -> CollapseStats {
        CollapseStats {
            raw_reads: self.sequences.len(),
            exact_unique: self.exact_unique,
            within_budget: self.order.len(),
            ..Default::default()
        }
    }
}

/// Deduplicate `reads` with the wildcard-tolerant trie.
///
/// Reads are swept in ascending order of ambiguous count, so fully specified reads claim
/// canonical status before the ambiguous reads that might match them. Wildcard equality
/// is not transitive and the result depends on that order.
pub fn collapse_seq(
    reads: &[Vec<u8>],
    config: &CollapseConfig,
) -> Result<CollapseOutput, DedupError> {
    config.validate()?;
    let alphabet = config.build_alphabet()?;
    let start_time = Instant::now();

    let prepared = prepare(reads, config);
    if config.unknown_symbols == UnknownSymbolPolicy::Reject {
        if let Some((index, symbol)) = prepared.first_unknown_symbol(&alphabet) {
            return Err(DedupError::UnknownSymbol { index, symbol });
        }
    }
    info!(
        "Preprocessing (exact dedup, filter, sort) done in {:.3} s",
        start_time.elapsed().as_secs_f64()
    );

    let mut stats = prepared.base_stats();
    let mut trie = Trie::new(&alphabet, Some(prepared.wildcard));

    let result = match config.output_mode {
        OutputMode::ExactSortOnly => Collapsed::UniqueIndices(prepared.order.clone()),
        OutputMode::UniqueIndices => {
            let mut unique = Vec::new();
            for &rep in &prepared.order {
                let sequence = prepared.sequences[rep].as_ref();
                if !trie.matches(sequence) {
                    store(&mut trie, rep, sequence, &mut stats);
                    unique.push(rep);
                }
            }
            Collapsed::UniqueIndices(unique)
        }
        OutputMode::FullMapping => {
            let mut resolved: Vec<Option<usize>> = vec![None; prepared.sequences.len()];
            let mut owner: FxHashMap<&[u8], usize> = FxHashMap::default();
            for &rep in &prepared.order {
                let sequence = prepared.sequences[rep].as_ref();
                match trie.match_and_trace(sequence) {
                    None => {
                        store(&mut trie, rep, sequence, &mut stats);
                        owner.insert(sequence, rep);
                        resolved[rep] = Some(rep);
                    }
                    Some(hit) => {
                        resolved[rep] = owner.get(hit.as_slice()).copied();
                    }
                }
            }
            Collapsed::Mapping(prepared.expand(&resolved))
        }
    };

    stats.canonical = result.canonical_count();
    stats.trie_nodes = trie.node_count();
    let elapsed = start_time.elapsed();
    info!(
        "Number of reads (after trie dedup) = {}. Time spent: {:.3} s",
        stats.canonical,
        elapsed.as_secs_f64()
    );
    if stats.unstorable > 0 {
        warn!(
            "{} canonical reads contain symbols outside the alphabet and could not be matched against",
            stats.unstorable
        );
    }

    Ok(CollapseOutput {
        result,
        stats,
        elapsed,
    })
}

fn store(trie: &mut Trie<'_>, rep: usize, sequence: &[u8], stats: &mut CollapseStats) {
    if let Err(e) = trie.add(sequence) {
        debug!("Read {} kept as canonical but not stored: {}", rep, e);
        stats.unstorable += 1;
    }
}
