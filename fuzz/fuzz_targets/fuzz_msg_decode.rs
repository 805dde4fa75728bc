#![no_main]

use libfuzzer_sys::fuzz_target;

use tnc_pts::{AttrRegistry, PaTncMsg};

fuzz_target!(|data: &[u8]| {
    // Decoding never panics; any failure must come with an error attribute.
    let registry = AttrRegistry::standard();
    let mut msg = PaTncMsg::decode(&registry, data);
    assert_eq!(msg.failure().is_some(), msg.error_attr().is_some());

    // Whatever decoded cleanly must encode again.
    if msg.failure().is_none() {
        let _ = msg.encode();
    }
});
