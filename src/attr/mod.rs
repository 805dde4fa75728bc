//! PA-TNC attribute framework.
//!
//! Every attribute on the wire is a self-describing TLV unit:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Flags     |          Attribute Vendor ID                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Attribute Type                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Attribute Length                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Attribute Value (variable length)             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Concrete kinds implement [`AttrBody`] (their binary layout only) and are
//! carried by the generic [`Attr`] wrapper, which provides the uniform
//! [`Attribute`] surface used by the message envelope and the registry.

pub mod ietf;
pub mod opaque;
pub mod pts;
pub mod registry;

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::AttrError;

/// Size of the PA-TNC attribute header in bytes.
pub const ATTR_HEADER_SIZE: usize = 12;

/// Largest value a 24-bit vendor id can take.
pub const PEN_MAX: u32 = 0x00FF_FFFF;

/// Private Enterprise Number namespacing an attribute's type space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pen(u32);

impl Pen {
    /// IETF standard namespace.
    pub const IETF: Pen = Pen(0);
    /// Trusted Computing Group, home of the PTS attributes.
    pub const TCG: Pen = Pen(0x0055_97);

    /// Create a vendor id, truncated to 24 bits.
    pub const fn new(value: u32) -> Self {
        Self(value & PEN_MAX)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Pen::IETF => f.write_str("IETF"),
            Pen::TCG => f.write_str("TCG"),
            Pen(other) => write!(f, "PEN {other}"),
        }
    }
}

/// Attribute identity: (vendor id, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrType {
    pub vendor: Pen,
    pub code: u32,
}

impl AttrType {
    pub const fn new(vendor: Pen, code: u32) -> Self {
        Self { vendor, code }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:#010x}", self.vendor, self.code)
    }
}

/// Attribute flags (bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrFlags(pub(crate) u8);

impl AttrFlags {
    pub const NOSKIP: u8 = 0x80;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_raw(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn noskip(noskip: bool) -> Self {
        if noskip {
            Self(Self::NOSKIP)
        } else {
            Self(0)
        }
    }

    pub const fn is_noskip(self) -> bool {
        self.0 & Self::NOSKIP != 0
    }
}

/// A parsed PA-TNC attribute header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrHeader {
    pub flags: AttrFlags,
    pub attr_type: AttrType,
    /// Total attribute length including this header.
    pub length: u32,
}

impl AttrHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags.0);
        buf.put_uint(self.attr_type.vendor.raw() as u64, 3);
        buf.put_u32(self.attr_type.code);
        buf.put_u32(self.length);
    }

    /// Decode a header from the front of `buf`. Returns `None` if fewer than
    /// [`ATTR_HEADER_SIZE`] bytes are present.
    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < ATTR_HEADER_SIZE {
            return None;
        }
        let flags = AttrFlags(buf.get_u8());
        let vendor = Pen::new(buf.get_uint(3) as u32);
        let code = buf.get_u32();
        let length = buf.get_u32();
        Some(Self {
            flags,
            attr_type: AttrType::new(vendor, code),
            length,
        })
    }

    /// Length of the attribute value (total length minus header).
    pub fn value_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(ATTR_HEADER_SIZE)
    }
}

/// A single wire attribute.
///
/// Sender side: constructed from typed fields, `value` is empty until
/// [`serialize`](Attribute::serialize) runs. Receiver side: constructed from
/// raw bytes, typed fields are empty until [`parse`](Attribute::parse) runs.
pub trait Attribute: fmt::Debug + Send + Sync {
    /// Vendor id and type of this attribute.
    fn identify(&self) -> AttrType;

    /// Encode the typed fields into `value` and return it.
    fn serialize(&mut self) -> Bytes;

    /// Populate the typed fields from `value`.
    fn parse(&mut self) -> Result<(), AttrError>;

    /// Current wire encoding.
    fn value(&self) -> &Bytes;

    /// Whether a recipient that cannot interpret this attribute must fail.
    fn is_mandatory(&self) -> bool;

    fn set_mandatory(&mut self, noskip: bool);

    fn as_any(&self) -> &dyn Any;

    /// Header describing this attribute with its current `value`.
    fn header(&self) -> AttrHeader {
        AttrHeader {
            flags: AttrFlags::noskip(self.is_mandatory()),
            attr_type: self.identify(),
            length: (ATTR_HEADER_SIZE + self.value().len()) as u32,
        }
    }
}

impl dyn Attribute {
    /// Typed fields of a parsed or locally built attribute of kind `B`.
    pub fn body<B: AttrBody>(&self) -> Option<&B> {
        self.as_any().downcast_ref::<Attr<B>>()?.body()
    }

    pub fn is<B: AttrBody>(&self) -> bool {
        self.as_any().is::<Attr<B>>()
    }
}

/// Binary layout of one concrete attribute kind.
pub trait AttrBody: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Identity of this kind on the wire.
    const TYPE: AttrType;

    /// Append the encoded value to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decode from a complete attribute value. Must never read past `value`.
    fn decode(value: &[u8]) -> Result<Self, AttrError>;
}

/// Generic attribute carrying typed fields of kind `B`.
#[derive(Debug, Clone)]
pub struct Attr<B> {
    body: Option<B>,
    value: Bytes,
    noskip: bool,
}

impl<B: AttrBody> Attr<B> {
    /// Sender side: build from typed fields.
    pub fn new(body: B) -> Self {
        Self {
            body: Some(body),
            value: Bytes::new(),
            noskip: false,
        }
    }

    /// Receiver side: wrap raw value bytes, to be parsed later.
    pub fn from_value(value: Bytes) -> Self {
        Self {
            body: None,
            value,
            noskip: false,
        }
    }

    /// Same as [`Attr::new`] with the noskip flag set.
    pub fn mandatory(body: B) -> Self {
        Self {
            noskip: true,
            ..Self::new(body)
        }
    }

    pub fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<B> {
        self.body
    }

    /// Boxed constructor suitable for [`registry::AttrRegistry::register`].
    pub fn construct(value: Bytes) -> Box<dyn Attribute> {
        Box::new(Self::from_value(value))
    }
}

impl<B: AttrBody> Attribute for Attr<B> {
    fn identify(&self) -> AttrType {
        B::TYPE
    }

    fn serialize(&mut self) -> Bytes {
        if let Some(body) = &self.body {
            let mut buf = BytesMut::new();
            body.encode(&mut buf);
            self.value = buf.freeze();
        }
        self.value.clone()
    }

    fn parse(&mut self) -> Result<(), AttrError> {
        self.body = Some(B::decode(&self.value)?);
        Ok(())
    }

    fn value(&self) -> &Bytes {
        &self.value
    }

    fn is_mandatory(&self) -> bool {
        self.noskip
    }

    fn set_mandatory(&mut self, noskip: bool) {
        self.noskip = noskip;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fail with `InsufficientData` at `offset` unless `value` holds `min` bytes.
pub(crate) fn require_len(value: &[u8], min: usize, offset: u32) -> Result<(), AttrError> {
    if value.len() < min {
        return Err(AttrError::InsufficientData { offset });
    }
    Ok(())
}
