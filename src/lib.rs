pub mod alphabet;
pub mod collapse;
pub mod engine;
pub mod output;
pub mod pairwise;
pub mod reads;
pub mod trie;
