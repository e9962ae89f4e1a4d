#![no_main]

use libfuzzer_sys::fuzz_target;
use mptdb::merkle::{decode_bytes, decode_list, decode_nibbles, keccak256, read_length_header, Node};

fuzz_target!(|data: &[u8]| {
    // None of the decoders may panic on arbitrary input
    let _ = read_length_header(data);
    let _ = decode_bytes(data);
    let _ = decode_list(data);
    let _ = decode_nibbles(data);

    if let Ok(mut node) = Node::<Vec<u8>>::decode(data, None) {
        // A decoded node keeps its encoding verbatim
        assert_eq!(node.serialize(), data);
        assert_eq!(node.hash(), keccak256(data));
    }
});
