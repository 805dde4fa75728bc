//! PTS protocol capability and measurement algorithm attributes.
//!
//! Both capability attributes share one 4-byte layout:
//!
//! ```text
//! |                   Reserved                      |C|V|D|T|X|
//! ```
//!
//! Both algorithm attributes share:
//!
//! ```text
//! |          Reserved             |       Hash Algorithm Set      |
//! ```

use bytes::{Buf, BufMut, BytesMut};

use super::{HashAlgo, HashAlgoSet};
use crate::attr::{require_len, AttrBody, AttrType};
use crate::error::AttrError;

const CAPS_SIZE: usize = 4;
const ALGO_SIZE: usize = 4;

/// PTS protocol capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PtsCapabilities(u8);

impl PtsCapabilities {
    /// Current integrity report (TPM quote) supported.
    pub const CURRENT: PtsCapabilities = PtsCapabilities(0x10);
    /// Verification of simple component evidence supported.
    pub const VERIFICATION: PtsCapabilities = PtsCapabilities(0x08);
    /// DH nonce negotiation supported.
    pub const DH_NONCE: PtsCapabilities = PtsCapabilities(0x04);
    /// Trusted platform evidence.
    pub const TRUSTED: PtsCapabilities = PtsCapabilities(0x02);
    /// XML integrity report format supported.
    pub const XML: PtsCapabilities = PtsCapabilities(0x01);

    const MASK: u8 = 0x1F;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_raw(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

fn encode_caps(caps: PtsCapabilities, buf: &mut BytesMut) {
    buf.put_u32(caps.raw() as u32);
}

fn decode_caps(mut value: &[u8]) -> Result<PtsCapabilities, AttrError> {
    require_len(value, CAPS_SIZE, 0)?;
    let raw = value.get_u32();
    Ok(PtsCapabilities::from_raw((raw & PtsCapabilities::MASK as u32) as u8))
}

fn encode_algos(algorithms: HashAlgoSet, buf: &mut BytesMut) {
    buf.put_u16(0);
    buf.put_u16(algorithms.raw());
}

fn decode_algos(mut value: &[u8]) -> Result<HashAlgoSet, AttrError> {
    require_len(value, ALGO_SIZE, 0)?;
    let _reserved = value.get_u16();
    Ok(HashAlgoSet::from_raw(value.get_u16()))
}

/// Request PTS Protocol Capabilities: the sender's own capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqProtoCaps {
    pub caps: PtsCapabilities,
}

impl AttrBody for ReqProtoCaps {
    const TYPE: AttrType = super::REQ_PROTO_CAPS;

    fn encode(&self, buf: &mut BytesMut) {
        encode_caps(self.caps, buf);
    }

    fn decode(value: &[u8]) -> Result<Self, AttrError> {
        Ok(Self {
            caps: decode_caps(value)?,
        })
    }
}

/// PTS Protocol Capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoCaps {
    pub caps: PtsCapabilities,
}

impl AttrBody for ProtoCaps {
    const TYPE: AttrType = super::PROTO_CAPS;

    fn encode(&self, buf: &mut BytesMut) {
        encode_caps(self.caps, buf);
    }

    fn decode(value: &[u8]) -> Result<Self, AttrError> {
        Ok(Self {
            caps: decode_caps(value)?,
        })
    }
}

/// PTS Measurement Algorithms: hash algorithms the verifier accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasAlgo {
    pub algorithms: HashAlgoSet,
}

impl AttrBody for MeasAlgo {
    const TYPE: AttrType = super::MEAS_ALGO;

    fn encode(&self, buf: &mut BytesMut) {
        encode_algos(self.algorithms, buf);
    }

    fn decode(value: &[u8]) -> Result<Self, AttrError> {
        Ok(Self {
            algorithms: decode_algos(value)?,
        })
    }
}

/// PTS Measurement Algorithm Selection: the single algorithm the attestor
/// will measure with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasAlgoSelection {
    pub algorithm: HashAlgo,
}

impl AttrBody for MeasAlgoSelection {
    const TYPE: AttrType = super::MEAS_ALGO_SELECTION;

    fn encode(&self, buf: &mut BytesMut) {
        encode_algos(HashAlgoSet::from(self.algorithm), buf);
    }

    fn decode(value: &[u8]) -> Result<Self, AttrError> {
        let set = decode_algos(value)?;
        let mut members = set.iter();
        match (members.next(), members.next()) {
            (Some(algorithm), None) => Ok(Self { algorithm }),
            _ => Err(AttrError::InvalidField {
                field: "hash algorithm selection",
                offset: 2,
            }),
        }
    }
}
