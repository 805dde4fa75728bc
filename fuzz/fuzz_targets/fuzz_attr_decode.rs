#![no_main]

use libfuzzer_sys::fuzz_target;

use tnc_pts::attr::ietf::PaTncError;
use tnc_pts::attr::pts::{
    DhNonceFinish, DhNonceParamsReq, DhNonceParamsResp, FileMeas, ReqFileMeas,
};
use tnc_pts::AttrBody;

fuzz_target!(|data: &[u8]| {
    // Variable-length bodies straight from the wire: no panics, no overreads.
    let _ = DhNonceParamsReq::decode(data);
    let _ = DhNonceParamsResp::decode(data);
    let _ = DhNonceFinish::decode(data);
    let _ = ReqFileMeas::decode(data);
    let _ = FileMeas::decode(data);
    let _ = PaTncError::decode(data);
});
