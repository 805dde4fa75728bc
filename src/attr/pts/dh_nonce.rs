//! PTS Diffie-Hellman nonce negotiation attributes.
//!
//! DH Nonce Parameters Request (verifier to attestor):
//!
//! ```text
//! |   Reserved    | Min. Nonce Len|        D-H Group Set          |
//! ```
//!
//! DH Nonce Parameters Response (attestor to verifier):
//!
//! ```text
//! |                   Reserved                    |   Nonce Len   |
//! |      Selected D-H Group       |      Hash Algorithm Set       |
//! |                  D-H Responder Nonce ...                      |
//! |               D-H Responder Public Value ...                  |
//! ```
//!
//! DH Nonce Finish (verifier to attestor):
//!
//! ```text
//! |   Reserved    |   Nonce Len   |   Selected Hash Algorithm     |
//! |               D-H Initiator Public Value ...                  |
//! |                  D-H Initiator Nonce ...                      |
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{DhGroup, DhGroupSet, HashAlgo, HashAlgoSet};
use crate::attr::{require_len, AttrBody, AttrType};
use crate::error::AttrError;

const PARAMS_REQ_SIZE: usize = 4;
const PARAMS_RESP_SIZE: usize = 16;
const FINISH_SIZE: usize = 12;

/// Bytes preceding the nonce in the response.
const PARAMS_RESP_FIXED: usize = 8;
/// Bytes preceding the public value in the finish.
const FINISH_FIXED: usize = 4;

/// Largest nonce the 8-bit length field can describe.
pub const MAX_NONCE_LEN: usize = u8::MAX as usize;

fn check_nonce(nonce: &[u8]) -> Result<(), AttrError> {
    if nonce.len() > MAX_NONCE_LEN {
        return Err(AttrError::FieldTooLong {
            field: "nonce",
            len: nonce.len(),
            max: MAX_NONCE_LEN,
        });
    }
    Ok(())
}

/// DH Nonce Parameters Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhNonceParamsReq {
    /// Smallest responder nonce the verifier will accept.
    pub min_nonce_len: u8,
    /// Groups the verifier offers.
    pub dh_groups: DhGroupSet,
}

impl AttrBody for DhNonceParamsReq {
    const TYPE: AttrType = super::DH_NONCE_PARAMS_REQ;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(PARAMS_REQ_SIZE);
        buf.put_u8(0);
        buf.put_u8(self.min_nonce_len);
        buf.put_u16(self.dh_groups.raw());
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, PARAMS_REQ_SIZE, 0)?;
        let _reserved = value.get_u8();
        let min_nonce_len = value.get_u8();
        let dh_groups = DhGroupSet::from_raw(value.get_u16());
        Ok(Self {
            min_nonce_len,
            dh_groups,
        })
    }
}

/// DH Nonce Parameters Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhNonceParamsResp {
    dh_group: DhGroup,
    hash_algo_set: HashAlgoSet,
    responder_nonce: Bytes,
    responder_value: Bytes,
}

impl DhNonceParamsResp {
    /// Fails if the nonce does not fit the 8-bit length field.
    pub fn new(
        dh_group: DhGroup,
        hash_algo_set: HashAlgoSet,
        responder_nonce: Bytes,
        responder_value: Bytes,
    ) -> Result<Self, AttrError> {
        check_nonce(&responder_nonce)?;
        Ok(Self {
            dh_group,
            hash_algo_set,
            responder_nonce,
            responder_value,
        })
    }

    pub fn dh_group(&self) -> DhGroup {
        self.dh_group
    }

    pub fn hash_algo_set(&self) -> HashAlgoSet {
        self.hash_algo_set
    }

    pub fn responder_nonce(&self) -> &Bytes {
        &self.responder_nonce
    }

    pub fn responder_value(&self) -> &Bytes {
        &self.responder_value
    }
}

impl AttrBody for DhNonceParamsResp {
    const TYPE: AttrType = super::DH_NONCE_PARAMS_RESP;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(
            PARAMS_RESP_FIXED + self.responder_nonce.len() + self.responder_value.len(),
        );
        buf.put_uint(0, 3);
        buf.put_u8(self.responder_nonce.len() as u8);
        buf.put_u16(self.dh_group.raw());
        buf.put_u16(self.hash_algo_set.raw());
        buf.put_slice(&self.responder_nonce);
        buf.put_slice(&self.responder_value);
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, PARAMS_RESP_SIZE, 0)?;
        let _reserved = value.get_uint(3);
        let nonce_len = value.get_u8() as usize;
        let dh_group = DhGroup::from_raw(value.get_u16());
        let hash_algo_set = HashAlgoSet::from_raw(value.get_u16());
        // Offset 0 is reported for a short nonce as well as a short header.
        require_len(value, nonce_len, 0)?;
        let responder_nonce = Bytes::copy_from_slice(&value[..nonce_len]);
        let responder_value = Bytes::copy_from_slice(&value[nonce_len..]);
        Ok(Self {
            dh_group,
            hash_algo_set,
            responder_nonce,
            responder_value,
        })
    }
}

/// DH Nonce Finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhNonceFinish {
    hash_algo: HashAlgo,
    initiator_value: Bytes,
    initiator_nonce: Bytes,
}

impl DhNonceFinish {
    pub fn new(
        hash_algo: HashAlgo,
        initiator_value: Bytes,
        initiator_nonce: Bytes,
    ) -> Result<Self, AttrError> {
        check_nonce(&initiator_nonce)?;
        Ok(Self {
            hash_algo,
            initiator_value,
            initiator_nonce,
        })
    }

    pub fn hash_algo(&self) -> HashAlgo {
        self.hash_algo
    }

    pub fn initiator_value(&self) -> &Bytes {
        &self.initiator_value
    }

    pub fn initiator_nonce(&self) -> &Bytes {
        &self.initiator_nonce
    }
}

impl AttrBody for DhNonceFinish {
    const TYPE: AttrType = super::DH_NONCE_FINISH;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(FINISH_FIXED + self.initiator_value.len() + self.initiator_nonce.len());
        buf.put_u8(0);
        buf.put_u8(self.initiator_nonce.len() as u8);
        buf.put_u16(self.hash_algo.raw());
        buf.put_slice(&self.initiator_value);
        buf.put_slice(&self.initiator_nonce);
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, FINISH_SIZE, 0)?;
        let _reserved = value.get_u8();
        let nonce_len = value.get_u8() as usize;
        let hash_algo = HashAlgo::from_raw(value.get_u16());
        require_len(value, nonce_len, 0)?;
        let split = value.len() - nonce_len;
        let initiator_value = Bytes::copy_from_slice(&value[..split]);
        let initiator_nonce = Bytes::copy_from_slice(&value[split..]);
        Ok(Self {
            hash_algo,
            initiator_value,
            initiator_nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Attr, Attribute};

    fn response(nonce_len: usize, value_len: usize) -> DhNonceParamsResp {
        DhNonceParamsResp::new(
            DhGroup::MODP2048,
            HashAlgoSet::from(HashAlgo::SHA256),
            Bytes::from(vec![0xAA; nonce_len]),
            Bytes::from(vec![0x55; value_len]),
        )
        .unwrap()
    }

    #[test]
    fn response_wire_layout() {
        let mut attr = Attr::new(response(20, 256));
        let value = attr.serialize();

        assert_eq!(value.len(), 8 + 20 + 256);
        assert_eq!(&value[..3], &[0, 0, 0]);
        assert_eq!(value[3], 20);
        assert_eq!(&value[4..6], &0x2000u16.to_be_bytes());
        assert_eq!(&value[6..8], &0x4000u16.to_be_bytes());
        assert_eq!(&value[8..28], &[0xAA; 20]);
        assert_eq!(&value[28..284], &[0x55; 256][..]);

        let mut parsed = Attr::<DhNonceParamsResp>::from_value(value.clone());
        parsed.parse().unwrap();
        let body = parsed.body().unwrap();
        assert_eq!(body, attr.body().unwrap());
        assert_eq!(body.dh_group(), DhGroup::MODP2048);
        assert_eq!(body.hash_algo_set(), HashAlgoSet::from(HashAlgo::SHA256));
        assert_eq!(parsed.value(), &value);
    }

    #[test]
    fn response_short_buffer_reports_offset_zero() {
        let buf = [0u8; 10];
        assert_eq!(
            DhNonceParamsResp::decode(&buf),
            Err(AttrError::InsufficientData { offset: 0 })
        );
        for len in 0..PARAMS_RESP_SIZE {
            assert_eq!(
                DhNonceParamsResp::decode(&vec![0u8; len]),
                Err(AttrError::InsufficientData { offset: 0 }),
                "length {len}"
            );
        }
    }

    #[test]
    fn response_nonce_boundaries() {
        // (nonce length field, total length) -> expected nonce/value split
        for (nonce_len, total) in [(0usize, 16usize), (1, 16), (0, 40), (1, 300), (255, 263), (255, 400)] {
            let mut buf = vec![0u8; total];
            buf[3] = nonce_len as u8;
            for (i, b) in buf.iter_mut().enumerate().skip(8) {
                *b = i as u8;
            }
            let decoded = DhNonceParamsResp::decode(&buf).unwrap();
            assert_eq!(decoded.responder_nonce().len(), nonce_len);
            assert_eq!(decoded.responder_value().len(), total - 8 - nonce_len);
            assert_eq!(&decoded.responder_nonce()[..], &buf[8..8 + nonce_len]);
            assert_eq!(&decoded.responder_value()[..], &buf[8 + nonce_len..]);
        }
    }

    #[test]
    fn response_nonce_exceeding_data_fails() {
        for (nonce_len, total) in [(9usize, 16usize), (255, 16), (255, 262), (100, 107)] {
            let mut buf = vec![0u8; total];
            buf[3] = nonce_len as u8;
            assert_eq!(
                DhNonceParamsResp::decode(&buf),
                Err(AttrError::InsufficientData { offset: 0 }),
                "nonce {nonce_len}, total {total}"
            );
        }
    }

    #[test]
    fn response_fields_outlive_input() {
        let mut attr = Attr::new(response(17, 64));
        let value = attr.serialize();
        let decoded = {
            let owned = value.to_vec();
            DhNonceParamsResp::decode(&owned).unwrap()
        };
        assert_eq!(decoded.responder_nonce().len(), 17);
        assert_eq!(decoded.responder_value().len(), 64);
    }

    #[test]
    fn response_rejects_oversized_nonce() {
        let err = DhNonceParamsResp::new(
            DhGroup::IKE19,
            HashAlgoSet::from(HashAlgo::SHA384),
            Bytes::from(vec![0; 256]),
            Bytes::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AttrError::FieldTooLong { len: 256, .. }));
    }

    #[test]
    fn serialize_is_deterministic() {
        let mut a = Attr::new(response(32, 96));
        let mut b = Attr::new(response(32, 96));
        assert_eq!(a.serialize(), b.serialize());
        assert_eq!(a.serialize(), a.serialize());
    }

    #[test]
    fn request_layout() {
        let req = DhNonceParamsReq {
            min_nonce_len: 17,
            dh_groups: DhGroup::IKE14 | DhGroup::IKE19,
        };
        let mut buf = BytesMut::new();
        req.encode(&mut buf);
        assert_eq!(&buf[..], &[0, 17, 0x30, 0x00]);
        assert_eq!(DhNonceParamsReq::decode(&buf).unwrap(), req);
        assert_eq!(
            DhNonceParamsReq::decode(&buf[..3]),
            Err(AttrError::InsufficientData { offset: 0 })
        );
    }

    #[test]
    fn finish_roundtrip_places_nonce_last() {
        let finish = DhNonceFinish::new(
            HashAlgo::SHA256,
            Bytes::from(vec![0x11; 64]),
            Bytes::from(vec![0x22; 20]),
        )
        .unwrap();
        let mut buf = BytesMut::new();
        finish.encode(&mut buf);
        assert_eq!(buf.len(), 4 + 64 + 20);
        assert_eq!(buf[1], 20);
        assert_eq!(&buf[4..68], &[0x11; 64][..]);
        assert_eq!(&buf[68..], &[0x22; 20]);
        assert_eq!(DhNonceFinish::decode(&buf).unwrap(), finish);
    }

    #[test]
    fn finish_nonce_exceeding_data_fails() {
        let mut buf = vec![0u8; FINISH_SIZE];
        buf[1] = 9;
        assert_eq!(
            DhNonceFinish::decode(&buf),
            Err(AttrError::InsufficientData { offset: 0 })
        );
        assert_eq!(
            DhNonceFinish::decode(&buf[..11]),
            Err(AttrError::InsufficientData { offset: 0 })
        );
    }
}
