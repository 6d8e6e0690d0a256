//! Wildcard-tolerant prefix tree over an [`Alphabet`].
//!
//! Nodes live in a single arena and refer to their children by index. Every node keeps
//! the symbols of its children in insertion order with the wildcard child moved to the
//! end, and all searches walk children in that order. As a consequence an exact symbol is
//! always tried before the wildcard, which is what decides the sequence reported by
//! [`Trie::match_and_trace`] when several stored sequences would match.

use crate::alphabet::{Alphabet, AlphabetError, AlphabetMap};

type NodeId = u32;

const ROOT: NodeId = 0;

#[derive(Debug)]
struct TrieNode<'a> {
    children: AlphabetMap<'a, NodeId>,
    // Child symbols in traversal order, wildcard last
    keys: Vec<u8>,
    terminal: bool,
}

impl<'a> TrieNode<'a> {
    fn new(alphabet: &'a Alphabet) -> Self {
        Self {
            children: AlphabetMap::new(alphabet),
            keys: Vec::new(),
            terminal: false,
        }
    }
}

#[derive(Debug)]
pub struct Trie<'a> {
    alphabet: &'a Alphabet,
    wildcard: Option<u8>,
    nodes: Vec<TrieNode<'a>>,
    len: usize,
}

impl<'a> Trie<'a> {
    /// Create an empty trie. `wildcard` is the symbol compatible with every other symbol;
    /// it does not have to be registered in `alphabet` to act as a wildcard in queries.
    pub fn new(alphabet: &'a Alphabet, wildcard: Option<u8>) -> Self {
        Self {
            alphabet,
            wildcard,
            nodes: vec![TrieNode::new(alphabet)],
            len: 0,
        }
    }

    /// Number of distinct sequences stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert `sequence`. A sequence holding a symbol outside the alphabet cannot be
    /// stored; the trie is left untouched and the offending symbol is returned.
    pub fn add(&mut self, sequence: &[u8]) -> Result<(), AlphabetError> {
        if let Some(&symbol) = sequence.iter().find(|&&s| !self.alphabet.contains(s)) {
            return Err(AlphabetError::KeyNotAllowed(symbol));
        }

        let mut node = ROOT;
        for &symbol in sequence {
            node = match self.nodes[node as usize].children.get(symbol) {
                Some(&child) => child,
                None => self.push_child(node, symbol)?,
            };
        }

        let end = &mut self.nodes[node as usize];
        if !end.terminal {
            end.terminal = true;
            self.len += 1;
        }
        Ok(())
    }

    fn push_child(&mut self, parent: NodeId, symbol: u8) -> Result<NodeId, AlphabetError> {
        let child = self.nodes.len() as NodeId;
        let node = &mut self.nodes[parent as usize];
        node.children.set(symbol, child)?;
        match node.keys.last() {
            Some(&last) if Some(last) == self.wildcard => {
                let at = node.keys.len() - 1;
                node.keys.insert(at, symbol);
            }
            _ => node.keys.push(symbol),
        }
        self.nodes.push(TrieNode::new(self.alphabet));
        Ok(child)
    }

    /// True iff `sequence` itself was added
    pub fn contains_exact(&self, sequence: &[u8]) -> bool {
        let mut node = ROOT;
        for &symbol in sequence {
            match self.nodes[node as usize].children.get(symbol) {
                Some(&child) => node = child,
                None => return false,
            }
        }
        self.nodes[node as usize].terminal
    }

    /// True iff some stored sequence of the same length agrees with `sequence` at every
    /// position, counting the wildcard (on either side) as agreeing with anything.
    pub fn matches(&self, sequence: &[u8]) -> bool {
        self.search(sequence).is_some()
    }

    /// Like [`Trie::matches`], but returns the stored sequence that was reached
    pub fn match_and_trace(&self, sequence: &[u8]) -> Option<Vec<u8>> {
        self.search(sequence)
    }

    #[inline]
    fn compatible(&self, wanted: u8, key: u8) -> bool {
        wanted == key || Some(wanted) == self.wildcard || Some(key) == self.wildcard
    }

    // Depth-first backtracking with an explicit stack of (node, next key to try).
    // `path` holds the symbols leading to the node on top of the stack.
    fn search(&self, query: &[u8]) -> Option<Vec<u8>> {
        let mut stack: Vec<(NodeId, usize)> = Vec::with_capacity(query.len() + 1);
        let mut path: Vec<u8> = Vec::with_capacity(query.len());
        stack.push((ROOT, 0));

        while let Some(frame) = stack.last_mut() {
            let depth = path.len();
            let node = &self.nodes[frame.0 as usize];

            if depth == query.len() {
                if node.terminal {
                    return Some(path);
                }
                stack.pop();
                path.pop();
                continue;
            }

            let wanted = query[depth];
            let next = node.keys[frame.1..]
                .iter()
                .position(|&key| self.compatible(wanted, key));

            match next {
                Some(offset) => {
                    let key = node.keys[frame.1 + offset];
                    frame.1 += offset + 1;
                    if let Some(&child) = node.children.get(key) {
                        path.push(key);
                        stack.push((child, 0));
                    }
                }
                None => {
                    stack.pop();
                    path.pop();
                }
            }
        }

        None
    }

    /// All stored sequences, depth-first in key order
    pub fn sequences(&self) -> Vec<Vec<u8>> {
        let mut sequences = Vec::with_capacity(self.len);
        if self.nodes[ROOT as usize].terminal {
            sequences.push(Vec::new());
        }

        let mut stack: Vec<(NodeId, usize)> = vec![(ROOT, 0)];
        let mut path: Vec<u8> = Vec::new();
        while let Some(frame) = stack.last_mut() {
            let node = &self.nodes[frame.0 as usize];
            match node.keys.get(frame.1) {
                Some(&key) => {
                    frame.1 += 1;
                    if let Some(&child) = node.children.get(key) {
                        path.push(key);
                        if self.nodes[child as usize].terminal {
                            sequences.push(path.clone());
                        }
                        stack.push((child, 0));
                    }
                }
                None => {
                    stack.pop();
                    path.pop();
                }
            }
        }

        sequences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dna() -> Alphabet {
        Alphabet::new(b"ACGTN").unwrap()
    }

    #[test]
    fn test_add_and_contains_exact() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        assert!(trie.is_empty());
        trie.add(b"ACGT").unwrap();
        trie.add(b"ACGA").unwrap();
        trie.add(b"ACGT").unwrap();

        assert_eq!(trie.len(), 2);
        assert!(trie.contains_exact(b"ACGT"));
        assert!(trie.contains_exact(b"ACGA"));
        assert!(!trie.contains_exact(b"ACG"));
        assert!(!trie.contains_exact(b"ACGTA"));
        assert!(!trie.contains_exact(b"ACGN"));
        // root + A + C + G + T + A
        assert_eq!(trie.node_count(), 6);
    }

    #[test]
    fn test_matches_wildcard_on_either_side() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        trie.add(b"AACGT").unwrap();
        trie.add(b"TTNTT").unwrap();

        assert!(trie.matches(b"AACGT"));
        assert!(trie.matches(b"AANGT"));
        assert!(trie.matches(b"NNNNT"));
        assert!(trie.matches(b"TTGTT"));
        assert!(!trie.matches(b"AAGGT"));
        assert!(!trie.matches(b"TTGTA"));
    }

    #[test]
    fn test_length_mismatch_never_matches() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        trie.add(b"ACGT").unwrap();

        assert!(!trie.matches(b"ACG"));
        assert!(!trie.matches(b"ACGTA"));
        assert!(!trie.matches(b"NNNNN"));
        assert!(trie.matches(b"NNNN"));
    }

    #[test]
    fn test_wildcard_key_kept_last() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        trie.add(b"N").unwrap();
        trie.add(b"G").unwrap();
        trie.add(b"A").unwrap();
        assert_eq!(trie.nodes[ROOT as usize].keys, b"GAN");
    }

    #[test]
    fn test_trace_prefers_exact_symbol_over_wildcard() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        trie.add(b"ACNT").unwrap();
        trie.add(b"ACGT").unwrap();

        assert_eq!(trie.match_and_trace(b"ACGT"), Some(b"ACGT".to_vec()));
        assert_eq!(trie.match_and_trace(b"ACCT"), Some(b"ACNT".to_vec()));
        // A wildcard query walks non-wildcard children first, in insertion order
        assert_eq!(trie.match_and_trace(b"ACNT"), Some(b"ACGT".to_vec()));
    }

    #[test]
    fn test_trace_backtracks_past_dead_ends() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        trie.add(b"AAG").unwrap();
        trie.add(b"NAT").unwrap();

        assert_eq!(trie.match_and_trace(b"AAT"), Some(b"NAT".to_vec()));
        assert_eq!(trie.match_and_trace(b"AAC"), None);
    }

    #[test]
    fn test_unregistered_symbol_is_rejected_without_side_effects() {
        let alphabet = Alphabet::new(b"ACGT").unwrap();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        assert_eq!(trie.add(b"ACGN"), Err(AlphabetError::KeyNotAllowed(b'N')));
        assert_eq!(trie.node_count(), 1);
        assert!(trie.is_empty());

        trie.add(b"ACGT").unwrap();
        // The query may still use the wildcard even though it cannot be stored
        assert!(trie.matches(b"ACGN"));
        assert!(!trie.matches(b"ACGX"));
    }

    #[test]
    fn test_without_wildcard_only_exact_matches() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, None);
        trie.add(b"ACGT").unwrap();
        assert!(trie.matches(b"ACGT"));
        assert!(!trie.matches(b"ACNT"));
    }

    #[test]
    fn test_empty_sequence() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        assert!(!trie.matches(b""));
        trie.add(b"").unwrap();
        assert!(trie.matches(b""));
        assert!(trie.contains_exact(b""));
        assert_eq!(trie.sequences(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_sequences_enumeration() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        for seq in [&b"ACGT"[..], b"AC", b"NCGT", b"ACGA", b"TT"] {
            trie.add(seq).unwrap();
        }
        let sequences = trie.sequences();
        assert_eq!(sequences.len(), trie.len());
        assert_eq!(
            sequences,
            vec![
                b"AC".to_vec(),
                b"ACGT".to_vec(),
                b"ACGA".to_vec(),
                b"TT".to_vec(),
                b"NCGT".to_vec(),
            ]
        );
    }

    #[test]
    fn test_long_read_does_not_recurse() {
        let alphabet = dna();
        let mut trie = Trie::new(&alphabet, Some(b'N'));
        let long: Vec<u8> = b"ACGT".iter().copied().cycle().take(200_000).collect();
        trie.add(&long).unwrap();

        let mut query = long.clone();
        query[100_000] = b'N';
        assert_eq!(trie.match_and_trace(&query), Some(long.clone()));
        query[150_000] = b'G';
        query[150_001] = b'G';
        assert!(!trie.matches(&query));
    }
}
