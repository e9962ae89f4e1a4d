#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mptdb::merkle::{MerkleTrie, EMPTY_ROOT};
use std::collections::HashMap;

#[derive(Arbitrary, Debug)]
struct TrieInput {
    operations: Vec<TrieOp>,
}

#[derive(Arbitrary, Debug)]
enum TrieOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Get { key: Vec<u8> },
    Remove { key: Vec<u8> },
    ComputeRoot,
    Flush,
    Entries,
    Prove { key: Vec<u8> },
}

fuzz_target!(|input: TrieInput| {
    // Limit operations
    if input.operations.len() > 500 {
        return;
    }

    let mut trie = MerkleTrie::in_memory();
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    for op in input.operations {
        match op {
            TrieOp::Insert { key, value } => {
                // Limit key/value size; empty values act as removals
                if key.is_empty() || key.len() > 64 || value.is_empty() || value.len() > 256 {
                    continue;
                }

                trie.insert(&key, value.clone()).unwrap();
                expected.insert(key, value);
            }
            TrieOp::Get { key } => {
                let result = trie.get(&key).unwrap();
                assert_eq!(result.as_ref(), expected.get(&key));
            }
            TrieOp::Remove { key } => {
                let removed = trie.remove(&key).unwrap();
                assert_eq!(removed, expected.remove(&key));
                assert!(trie.get(&key).unwrap().is_none());
            }
            TrieOp::ComputeRoot => {
                // Root is deterministic and memoized
                let root1 = trie.root_hash();
                let root2 = trie.root_hash();
                assert_eq!(root1, root2);
                assert_eq!(root1 == EMPTY_ROOT, expected.is_empty());
            }
            TrieOp::Flush => {
                let root = trie.flush().unwrap();
                // Flushing never changes what the trie contains
                assert_eq!(trie.root_hash(), root);
            }
            TrieOp::Entries => {
                let entries = trie.entries().unwrap();
                assert_eq!(entries.len(), expected.len());
            }
            TrieOp::Prove { key } => {
                let root = trie.root_hash();
                let proof = trie.get_proof(&key).unwrap();
                assert_eq!(proof.value.as_ref(), expected.get(&key));
                assert!(proof.verify(&root));
            }
        }
    }

    // Final consistency check against the model
    for (key, value) in &expected {
        assert_eq!(trie.get(key).unwrap().as_ref(), Some(value));
    }

    // Rebuilding from scratch reaches the same root
    let mut rebuilt = MerkleTrie::in_memory();
    for (key, value) in &expected {
        rebuilt.insert(key, value.clone()).unwrap();
    }
    assert_eq!(rebuilt.root_hash(), trie.root_hash());
});
