#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mptdb::data::NibblePath;

#[derive(Arbitrary, Debug)]
struct NibblePathInput {
    bytes: Vec<u8>,
    operations: Vec<NibbleOp>,
}

#[derive(Arbitrary, Debug)]
enum NibbleOp {
    Get(usize),
    SliceFrom(usize),
    SliceTo(usize),
    CommonPrefix(Vec<u8>),
    Prepend(u8),
    Join(Vec<u8>),
    Iterate,
    RoundTrip,
}

fuzz_target!(|input: NibblePathInput| {
    // Limit input size
    if input.bytes.len() > 1000 || input.operations.len() > 100 {
        return;
    }

    let path = NibblePath::from_bytes(&input.bytes);
    let len = path.len();
    assert_eq!(len, input.bytes.len() * 2);

    for op in input.operations {
        match op {
            NibbleOp::Get(idx) => {
                if len > 0 {
                    let nibble = path.get(idx % len);
                    assert!(nibble < 16);
                }
            }
            NibbleOp::SliceFrom(start) => {
                let sliced = path.slice_from(start);
                if start < len {
                    assert_eq!(sliced.len(), len - start);
                    if !sliced.is_empty() {
                        assert_eq!(sliced.get(0), path.get(start));
                    }
                } else {
                    assert!(sliced.is_empty());
                }
            }
            NibbleOp::SliceTo(count) => {
                let sliced = path.slice_to(count);
                assert_eq!(sliced.len(), count.min(len));
            }
            NibbleOp::CommonPrefix(other_bytes) => {
                let other = NibblePath::from_bytes(&other_bytes);
                let common = path.common_prefix_len(&other);
                assert!(common <= len);
                assert!(common <= other.len());
                for i in 0..common {
                    assert_eq!(path.get(i), other.get(i));
                }
            }
            NibbleOp::Prepend(nibble) => {
                let prefixed = path.prepend(nibble & 0x0F);
                assert_eq!(prefixed.len(), len + 1);
                assert_eq!(prefixed.get(0), nibble & 0x0F);
                assert_eq!(&prefixed.as_slice()[1..], path.as_slice());
            }
            NibbleOp::Join(other_bytes) => {
                let other = NibblePath::from_bytes(&other_bytes);
                let joined = path.join(&other);
                assert_eq!(joined.len(), len + other.len());
                assert_eq!(&joined.as_slice()[..len], path.as_slice());
                assert_eq!(&joined.as_slice()[len..], other.as_slice());
            }
            NibbleOp::Iterate => {
                let collected: Vec<u8> = path.iter().collect();
                assert_eq!(collected.len(), len);
                assert_eq!(collected.as_slice(), path.as_slice());
                for nibble in collected {
                    assert!(nibble < 16);
                }
            }
            NibbleOp::RoundTrip => {
                // Paths built from whole bytes pack back to the same bytes
                assert_eq!(path.to_bytes(), input.bytes);
            }
        }
    }
});
