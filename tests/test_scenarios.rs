//! End-to-end properties of the trie collapse pipeline.

use triededup::collapse::{
    collapse_seq, CollapseConfig, Collapsed, DedupError, OutputMode, UnknownSymbolPolicy,
};

fn reads(seqs: &[&str]) -> Vec<Vec<u8>> {
    seqs.iter().map(|s| s.as_bytes().to_vec()).collect()
}

fn with_mode(output_mode: OutputMode) -> CollapseConfig {
    CollapseConfig {
        output_mode,
        ..Default::default()
    }
}

#[test]
fn test_wildcard_duplicate_maps_to_exact_canonical() {
    let input = reads(&["AACGT", "AACGT", "AANGT", "TTTTT"]);

    let mapping = collapse_seq(&input, &with_mode(OutputMode::FullMapping)).unwrap();
    assert_eq!(
        mapping.result,
        Collapsed::Mapping(vec![Some(0), Some(0), Some(0), Some(3)])
    );

    let unique = collapse_seq(&input, &with_mode(OutputMode::UniqueIndices)).unwrap();
    assert_eq!(unique.result, Collapsed::UniqueIndices(vec![0, 3]));

    let sorted = collapse_seq(&input, &with_mode(OutputMode::ExactSortOnly)).unwrap();
    assert_eq!(sorted.result, Collapsed::UniqueIndices(vec![0, 3, 2]));
}

#[test]
fn test_zero_ambiguity_is_exact_dedup() {
    let input = reads(&["GATTACA", "CAT", "GATTACA", "TAG", "CAT", "GATTAC"]);
    let out = collapse_seq(&input, &CollapseConfig::default()).unwrap();
    // First occurrence of each distinct sequence, in input order
    assert_eq!(out.result, Collapsed::UniqueIndices(vec![0, 1, 3, 5]));
    assert_eq!(out.stats.exact_unique, 4);
}

#[test]
fn test_runs_are_deterministic() {
    let input = reads(&[
        "ACNT", "ACGT", "NCGT", "ACCT", "NNNN", "ACGT", "TCGA", "NCGA", "ACGN",
    ]);
    for mode in [OutputMode::UniqueIndices, OutputMode::FullMapping] {
        let first = collapse_seq(&input, &with_mode(mode)).unwrap();
        for _ in 0..5 {
            let again = collapse_seq(&input, &with_mode(mode)).unwrap();
            assert_eq!(first.result, again.result);
            assert_eq!(first.stats, again.stats);
        }
    }
}

#[test]
fn test_filtered_reads_and_their_copies_are_dropped() {
    let input = reads(&["NNNA", "ACGA", "NNNA", "ANGA"]);
    let config = CollapseConfig {
        max_ambiguous: 2,
        output_mode: OutputMode::FullMapping,
        ..Default::default()
    };
    let out = collapse_seq(&input, &config).unwrap();
    assert_eq!(
        out.result,
        Collapsed::Mapping(vec![None, Some(1), None, Some(1)])
    );
    assert_eq!(out.stats.within_budget, 2);

    let config = CollapseConfig {
        max_ambiguous: 2,
        ..Default::default()
    };
    let out = collapse_seq(&input, &config).unwrap();
    let unique = out.result.as_unique_indices().unwrap();
    assert!(!unique.contains(&0) && !unique.contains(&2));
}

#[test]
fn test_unique_output_is_a_fixed_point() {
    let input = reads(&["ACGT", "TTGA", "ACGT", "ACGA", "TTGA", "CCCC"]);
    let config = CollapseConfig {
        max_ambiguous: 0,
        ..Default::default()
    };
    let first = collapse_seq(&input, &config).unwrap();
    let unique = first.result.as_unique_indices().unwrap();
    let kept: Vec<Vec<u8>> = unique.iter().map(|&i| input[i].clone()).collect();

    let second = collapse_seq(&kept, &config).unwrap();
    let again: Vec<Vec<u8>> = second
        .result
        .as_unique_indices()
        .unwrap()
        .iter()
        .map(|&i| kept[i].clone())
        .collect();
    assert_eq!(again, kept);
}

#[test]
fn test_unregistered_wildcard_with_ignore_policy_keeps_reads_unmatched() {
    // N is the wildcard but not part of the alphabet, so reads holding it are never stored
    let input = reads(&["ACGN", "ACNN"]);
    let config = CollapseConfig {
        alphabet: "ACGT".to_string(),
        unknown_symbols: UnknownSymbolPolicy::Ignore,
        output_mode: OutputMode::FullMapping,
        ..Default::default()
    };
    let out = collapse_seq(&input, &config).unwrap();
    assert_eq!(out.result, Collapsed::Mapping(vec![Some(0), Some(1)]));
    assert_eq!(out.stats.unstorable, 2);

    // With N registered the second read collapses onto the first
    let config = CollapseConfig {
        alphabet: "ACGTN".to_string(),
        ..config
    };
    let out = collapse_seq(&input, &config).unwrap();
    assert_eq!(out.result, Collapsed::Mapping(vec![Some(0), Some(0)]));
}

#[test]
fn test_unregistered_wildcard_with_reject_policy_fails() {
    let input = reads(&["ACGT", "ACGN"]);
    let config = CollapseConfig {
        alphabet: "ACGT".to_string(),
        unknown_symbols: UnknownSymbolPolicy::Reject,
        ..Default::default()
    };
    match collapse_seq(&input, &config) {
        Err(DedupError::UnknownSymbol { index, symbol }) => {
            assert_eq!(index, 1);
            assert_eq!(symbol, b'N');
        }
        other => panic!("expected UnknownSymbol, got {:?}", other),
    }
}
