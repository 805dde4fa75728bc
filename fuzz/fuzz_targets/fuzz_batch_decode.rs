#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use tnc_pts::frame::codec::BatchCodec;
use tnc_pts::frame::Batch;
use tnc_pts::{AttrRegistry, PaTncMsg};

fuzz_target!(|data: &[u8]| {
    let registry = AttrRegistry::standard();
    let mut codec = BatchCodec::new();
    let mut buf = BytesMut::from(data);

    // Split the stream into batches, then parse each down to its attributes.
    loop {
        match codec.decode(&mut buf) {
            Ok(Some(raw)) => {
                if let Ok(batch) = Batch::decode(&raw) {
                    for body in batch.pts_messages() {
                        let _ = PaTncMsg::decode(&registry, body);
                    }
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
});
