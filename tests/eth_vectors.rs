//! Compatibility tests against the canonical Ethereum test vectors.
//!
//! The encoding scheme (RLP, hex-prefix paths, Keccak-256 digests) is the
//! one used by the Ethereum state trie, so the reference vectors from
//! https://github.com/ethereum/tests pin our wire format:
//!
//! 1. RLP encoding and decoding, from RLPTests/rlptest.json
//! 2. Hex-prefix path encoding, from the trie specification appendix
//! 3. Keccak-256 digests of known inputs
//! 4. Whole-trie root hashes, from TrieTests/trieanyorder.json

use mptdb::merkle::{
    decode_bytes, decode_list, decode_nibbles, keccak256, read_length_header, MerkleTrie,
    RlpEncoder, RlpError, EMPTY_ROOT,
};
use primitive_types::H256;

// ============================================================================
// RLP STRING AND LIST ENCODING
// ============================================================================

mod rlp_encoding {
    use super::*;
    use hex_literal::hex;

    /// Vector: emptystring
    #[test]
    fn test_empty_string() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&[]);
        assert_eq!(enc.as_bytes(), &[0x80]);
    }

    /// Vector: bytestring00..02; single bytes below 0x80 encode as themselves
    #[test]
    fn test_single_bytes() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&[0x00]);
        assert_eq!(enc.as_bytes(), &[0x00]);

        enc.clear();
        enc.encode_bytes(&[0x7f]);
        assert_eq!(enc.as_bytes(), &[0x7f]);

        enc.clear();
        enc.encode_bytes(&[0x80]);
        assert_eq!(enc.as_bytes(), &[0x81, 0x80]);

        enc.clear();
        enc.encode_bytes(&[0xff]);
        assert_eq!(enc.as_bytes(), &[0x81, 0xff]);
    }

    /// Vector: bytestring "dog"
    #[test]
    fn test_dog() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(b"dog");
        assert_eq!(enc.as_bytes(), hex!("83646f67").as_slice());
    }

    /// Vector: shortstring / longstring; the 56-byte boundary switches to
    /// the long form with an explicit length byte
    #[test]
    fn test_length_boundary() {
        let short = [b'x'; 55];
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&short);
        assert_eq!(enc.as_bytes()[0], 0x80 + 55);
        assert_eq!(&enc.as_bytes()[1..], short);

        let long = [b'x'; 56];
        enc.clear();
        enc.encode_bytes(&long);
        assert_eq!(&enc.as_bytes()[..2], &[0xb8, 56]);
        assert_eq!(&enc.as_bytes()[2..], long);
    }

    /// Vector: longstring2 (1024 bytes, two length bytes)
    #[test]
    fn test_two_length_bytes() {
        let data = vec![b'y'; 1024];
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&data);
        assert_eq!(&enc.as_bytes()[..3], &[0xb9, 0x04, 0x00]);
        assert_eq!(enc.as_bytes().len(), 3 + 1024);
    }

    /// Vector: emptylist
    #[test]
    fn test_empty_list() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|_| {});
        assert_eq!(enc.as_bytes(), &[0xc0]);
    }

    /// Vector: stringlist ["cat", "dog"]
    #[test]
    fn test_cat_dog_list() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_bytes(b"cat");
            e.encode_bytes(b"dog");
        });
        assert_eq!(enc.as_bytes(), hex!("c88363617483646f67").as_slice());
    }

    /// Vector: multilist [ [], [[]], [ [], [[]] ] ]
    #[test]
    fn test_nested_lists() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_list(|_| {});
            e.encode_list(|e2| {
                e2.encode_list(|_| {});
            });
            e.encode_list(|e2| {
                e2.encode_list(|_| {});
                e2.encode_list(|e3| {
                    e3.encode_list(|_| {});
                });
            });
        });
        assert_eq!(enc.as_bytes(), hex!("c7c0c1c0c3c0c1c0").as_slice());
    }

    /// A list over the 55-byte payload boundary takes the long list form.
    #[test]
    fn test_long_list() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            for _ in 0..12 {
                e.encode_bytes(b"abcd");
            }
        });
        // 12 items of 5 bytes each is a 60-byte payload.
        assert_eq!(&enc.as_bytes()[..2], &[0xf8, 60]);
        assert_eq!(enc.as_bytes().len(), 2 + 60);
    }

    /// Vectors: zero, smallint, mediumint
    #[test]
    fn test_integers() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x80]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x81, 0x80]),
            (256, &[0x82, 0x01, 0x00]),
            (1024, &[0x82, 0x04, 0x00]),
            (0xff_ffff, &[0x83, 0xff, 0xff, 0xff]),
            (0x0102_0304, &[0x84, 0x01, 0x02, 0x03, 0x04]),
            (u64::MAX, &[0x88, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        ];
        let mut enc = RlpEncoder::new();
        for (value, expected) in cases {
            enc.clear();
            enc.encode_u64(*value);
            assert_eq!(enc.as_bytes(), *expected, "encoding of {value}");
        }
    }
}

// ============================================================================
// RLP DECODING
// The decoder must accept exactly the canonical forms and nothing else
// ============================================================================

mod rlp_decoding {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode_bytes(&[0x80]), Ok(&[][..]));
        assert_eq!(decode_bytes(&[0x05]), Ok(&[0x05][..]));
        assert_eq!(decode_bytes(&hex!("83646f67")), Ok(b"dog".as_slice()));
    }

    #[test]
    fn test_decode_list_items_keep_headers() {
        let items = decode_list(&hex!("c88363617483646f67")).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], hex!("83636174"));
        assert_eq!(decode_bytes(items[0]), Ok(b"cat".as_slice()));
        assert_eq!(decode_bytes(items[1]), Ok(b"dog".as_slice()));
    }

    #[test]
    fn test_decode_nested_list() {
        let items = decode_list(&hex!("c7c0c1c0c3c0c1c0")).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], [0xc0]);
        let inner = decode_list(items[2]).unwrap();
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_length_headers() {
        assert_eq!(read_length_header(&[0x05]), Ok((0, 1)));
        assert_eq!(read_length_header(&[0x80]), Ok((1, 0)));
        assert_eq!(read_length_header(&hex!("83646f67")), Ok((1, 3)));
        assert_eq!(read_length_header(&[0xc0]), Ok((1, 0)));

        let mut long = vec![0xb8, 56];
        long.extend_from_slice(&[0u8; 56]);
        assert_eq!(read_length_header(&long), Ok((2, 56)));
    }

    /// Non-minimal forms are not valid RLP.
    #[test]
    fn test_rejects_non_minimal() {
        // A single byte below 0x80 must encode as itself.
        assert_eq!(decode_bytes(&[0x81, 0x05]), Err(RlpError::InvalidEncoding));
        // Lengths below 56 must use the short form.
        assert_eq!(
            read_length_header(&[0xb8, 0x01, 0xff]),
            Err(RlpError::InvalidEncoding)
        );
        // Multi-byte lengths must not carry leading zeros.
        let mut padded = vec![0xb9, 0x00, 0x38];
        padded.extend_from_slice(&[0u8; 56]);
        assert_eq!(read_length_header(&padded), Err(RlpError::InvalidEncoding));
    }

    /// Truncation is reported as missing bytes, not as a malformed item.
    #[test]
    fn test_rejects_truncation() {
        assert_eq!(read_length_header(&[]), Err(RlpError::NotEnoughBytes));
        assert_eq!(
            read_length_header(&hex!("83646f")),
            Err(RlpError::NotEnoughBytes)
        );
        assert_eq!(read_length_header(&[0xb8]), Err(RlpError::NotEnoughBytes));
        assert_eq!(decode_bytes(&[0x81]), Err(RlpError::NotEnoughBytes));
    }

    /// An item must fill its slice exactly.
    #[test]
    fn test_rejects_trailing_bytes() {
        assert_eq!(decode_bytes(&[0x80, 0x00]), Err(RlpError::InvalidEncoding));
        assert_eq!(decode_list(&[0xc0, 0x00]), Err(RlpError::InvalidEncoding));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        assert_eq!(decode_bytes(&[0xc0]), Err(RlpError::InvalidEncoding));
        assert_eq!(decode_list(&[0x80]), Err(RlpError::InvalidEncoding));
    }
}

// ============================================================================
// HEX-PREFIX PATH ENCODING
// Appendix C of the yellow paper: flag nibble 0/1 extension, 2/3 leaf
// ============================================================================

mod hex_prefix {
    use super::*;

    #[test]
    fn test_leaf_even() {
        let mut enc = RlpEncoder::new();
        enc.encode_nibbles(&[1, 2, 3, 4], true);
        assert_eq!(enc.as_bytes(), &[0x83, 0x20, 0x12, 0x34]);
    }

    #[test]
    fn test_leaf_odd() {
        let mut enc = RlpEncoder::new();
        enc.encode_nibbles(&[1, 2, 3], true);
        assert_eq!(enc.as_bytes(), &[0x82, 0x31, 0x23]);
    }

    #[test]
    fn test_extension_even() {
        let mut enc = RlpEncoder::new();
        enc.encode_nibbles(&[1, 2], false);
        assert_eq!(enc.as_bytes(), &[0x82, 0x00, 0x12]);
    }

    #[test]
    fn test_extension_odd() {
        let mut enc = RlpEncoder::new();
        enc.encode_nibbles(&[1, 2, 3], false);
        assert_eq!(enc.as_bytes(), &[0x82, 0x11, 0x23]);
    }

    #[test]
    fn test_decode_paths() {
        assert_eq!(decode_nibbles(&[0x20, 0x12, 0x34]), Ok((vec![1, 2, 3, 4], true)));
        assert_eq!(decode_nibbles(&[0x31, 0x23]), Ok((vec![1, 2, 3], true)));
        assert_eq!(decode_nibbles(&[0x00, 0x12]), Ok((vec![1, 2], false)));
        assert_eq!(decode_nibbles(&[0x11, 0x23]), Ok((vec![1, 2, 3], false)));
        // Empty leaf path, as produced by a branch collapsing to its value.
        assert_eq!(decode_nibbles(&[0x20]), Ok((vec![], true)));
    }

    #[test]
    fn test_decode_rejects_bad_flags() {
        // Flag nibbles above 3 are undefined.
        assert_eq!(decode_nibbles(&[0x40]), Err(RlpError::InvalidEncoding));
        assert_eq!(decode_nibbles(&[0xff, 0x12]), Err(RlpError::InvalidEncoding));
        // Even-parity paths must pad with a zero nibble.
        assert_eq!(decode_nibbles(&[0x21, 0x12]), Err(RlpError::InvalidEncoding));
        assert_eq!(decode_nibbles(&[]), Err(RlpError::InvalidEncoding));
    }
}

// ============================================================================
// KECCAK-256 DIGESTS
// ============================================================================

mod keccak_vectors {
    use super::*;
    use hex_literal::hex;

    /// Keccak-256 of empty input, the EMPTY_CODE_HASH of Ethereum.
    #[test]
    fn test_empty_input() {
        assert_eq!(
            keccak256(&[]),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    /// Keccak-256 of the RLP empty string is the empty trie root.
    #[test]
    fn test_rlp_empty_string() {
        assert_eq!(keccak256(&[0x80]), EMPTY_ROOT);
        assert_eq!(
            H256(EMPTY_ROOT),
            H256(hex!(
                "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
            ))
        );
    }

    #[test]
    fn test_known_strings() {
        assert_eq!(
            keccak256(b"abc"),
            hex!("4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45")
        );
        assert_eq!(
            keccak256(b"hello"),
            hex!("1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8")
        );
    }

    /// Digest of a 20-byte precompile address, as used for state trie keys.
    #[test]
    fn test_address_digest() {
        let addr = hex!("0000000000000000000000000000000000000001");
        assert_eq!(
            keccak256(&addr),
            hex!("1468288056310c82aa4c01a7e12a10f8111a0560e72b700555479031b86c357d")
        );
    }
}

// ============================================================================
// WHOLE-TRIE ROOT HASHES
// From TrieTests/trieanyorder.json: the root is independent of insertion
// order, so each vector is checked in the given and the reversed order
// ============================================================================

mod root_vectors {
    use super::*;
    use hex_literal::hex;
    use mptdb::merkle::Digest;

    fn root_of(entries: &[(&[u8], &[u8])]) -> Digest {
        let mut trie = MerkleTrie::in_memory();
        for (key, value) in entries {
            trie.insert(key, value.to_vec()).unwrap();
        }
        let forward = trie.root_hash();

        let mut reversed = MerkleTrie::in_memory();
        for (key, value) in entries.iter().rev() {
            reversed.insert(key, value.to_vec()).unwrap();
        }
        assert_eq!(reversed.root_hash(), forward);
        forward
    }

    /// Vector: singleItem
    #[test]
    fn test_single_item() {
        let root = root_of(&[(b"A", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]);
        assert_eq!(
            root,
            hex!("d23786fb4a010da3ce639d66d5e904a11dbc02746d1ce25029e53290cabf28ab")
        );
    }

    /// Vector: dogs
    #[test]
    fn test_dogs() {
        let root = root_of(&[
            (b"doe", b"reindeer"),
            (b"dog", b"puppy"),
            (b"dogglesworth", b"cat"),
        ]);
        assert_eq!(
            root,
            hex!("8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3")
        );
    }

    /// Vector: puppy
    #[test]
    fn test_puppy() {
        let root = root_of(&[
            (b"do", b"verb"),
            (b"horse", b"stallion"),
            (b"doge", b"coin"),
            (b"dog", b"puppy"),
        ]);
        assert_eq!(
            root,
            hex!("5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84")
        );
    }

    /// Vector: foo
    #[test]
    fn test_foo() {
        let root = root_of(&[(b"foo", b"bar"), (b"food", b"bass")]);
        assert_eq!(
            root,
            hex!("17beaa1648bafa633cda809c90c04af50fc8aed3cb40d16efbddee6fdf63c4c3")
        );
    }

    /// Vector: smallValues
    #[test]
    fn test_small_values() {
        let root = root_of(&[(b"be", b"e"), (b"dog", b"puppy"), (b"bed", b"d")]);
        assert_eq!(
            root,
            hex!("3f67c7a47520f79faa29255d2d3c084a7a6df0453116ed7232ff10277a8be68b")
        );
    }

    /// Vector: testy
    #[test]
    fn test_testy() {
        let root = root_of(&[(b"test", b"test"), (b"te", b"testy")]);
        assert_eq!(
            root,
            hex!("8452568af70d8d140f58d941338542f645fcca50094b20f3c3d8c3df49337928")
        );
    }

    /// Vector: emptyValues from TrieTests/trietest.json. Writing an entry
    /// and deleting it again must leave no trace in the root.
    #[test]
    fn test_deletions_restore_canonical_root() {
        let mut trie = MerkleTrie::in_memory();
        trie.insert(b"do", b"verb".to_vec()).unwrap();
        trie.insert(b"ether", b"wookiedoo".to_vec()).unwrap();
        trie.insert(b"horse", b"stallion".to_vec()).unwrap();
        trie.insert(b"shaman", b"horse".to_vec()).unwrap();
        trie.insert(b"doge", b"coin".to_vec()).unwrap();
        trie.remove(b"ether").unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.remove(b"shaman").unwrap();

        assert_eq!(
            trie.root_hash(),
            hex!("5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84")
        );
    }

    /// The vectors hold regardless of whether hashing runs sequentially
    /// or fans out across the root branch.
    #[test]
    fn test_parallel_root_matches_vectors() {
        let mut trie = MerkleTrie::in_memory();
        trie.insert(b"doe", b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.insert(b"dogglesworth", b"cat".to_vec()).unwrap();
        assert_eq!(
            trie.parallel_root_hash(),
            hex!("8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3")
        );
    }

    /// Proofs generated for a vector trie verify against the vector root.
    #[test]
    fn test_proof_against_vector_root() {
        let mut trie = MerkleTrie::in_memory();
        trie.insert(b"doe", b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.insert(b"dogglesworth", b"cat".to_vec()).unwrap();

        let root = hex!("8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3");
        let proof = trie.get_proof(b"dog").unwrap();
        assert!(proof.is_inclusion());
        assert_eq!(proof.value.as_deref(), Some(b"puppy".as_slice()));
        assert!(proof.verify(&root));

        let absent = trie.get_proof(b"cat").unwrap();
        assert!(absent.is_exclusion());
        assert!(absent.verify(&root));
    }

    /// Keys sharing no prefix at all still hash order independently.
    #[test]
    fn test_secure_keys_order_independence() {
        let entries: Vec<(Digest, Vec<u8>)> = (0u64..32)
            .map(|i| (keccak256(&i.to_be_bytes()), format!("account_{i}").into_bytes()))
            .collect();

        let mut forward = MerkleTrie::in_memory();
        for (key, value) in &entries {
            forward.insert(key, value.clone()).unwrap();
        }
        let mut reversed = MerkleTrie::in_memory();
        for (key, value) in entries.iter().rev() {
            reversed.insert(key, value.clone()).unwrap();
        }
        assert_eq!(forward.root_hash(), reversed.root_hash());
        assert_ne!(forward.root_hash(), EMPTY_ROOT);
    }
}
