//! PA-TNC message envelope (RFC 5792).
//!
//! ```text
//! |    Version    |                    Reserved                   |
//! |                       Message Identifier                      |
//! |                    Attribute 1 (header + value)               |
//! ...
//! ```

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::attr::ietf::{ErrorInfo, PaTncError};
use crate::attr::registry::AttrRegistry;
use crate::attr::{
    Attr, AttrBody, AttrFlags, AttrHeader, AttrType, Attribute, Pen, ATTR_HEADER_SIZE,
};
use crate::error::AttrError;

/// Size of the PA-TNC message header in bytes.
pub const MSG_HEADER_SIZE: usize = 8;

/// Supported PA-TNC message version.
pub const PA_TNC_VERSION: u8 = 1;

/// Placeholder identity used in error attributes when the failure is not
/// tied to any attribute (e.g. a truncated message header).
const NO_ATTR: AttrType = AttrType::new(Pen::IETF, 0);

/// A parsed PA-TNC message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub version: u8,
    pub identifier: u32,
}

impl MsgHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_uint(0, 3);
        buf.put_u32(self.identifier);
    }

    /// Returns `None` if fewer than [`MSG_HEADER_SIZE`] bytes are present.
    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < MSG_HEADER_SIZE {
            return None;
        }
        let version = buf.get_u8();
        let _reserved = buf.get_uint(3);
        let identifier = buf.get_u32();
        Some(Self {
            version,
            identifier,
        })
    }

    pub fn to_bytes(self) -> [u8; MSG_HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(MSG_HEADER_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; MSG_HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }
}

/// The first fatal failure met while decoding a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Attribute being decoded, if the failure is tied to one.
    pub attr_type: Option<AttrType>,
    /// Position of that attribute's header within the message.
    pub position: usize,
    pub error: AttrError,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attr_type {
            Some(attr_type) => write!(
                f,
                "{attr_type} at message offset {}: {}",
                self.position, self.error
            ),
            None => write!(f, "message offset {}: {}", self.position, self.error),
        }
    }
}

/// An ordered set of attributes exchanged in one negotiation round.
#[derive(Debug, Default)]
pub struct PaTncMsg {
    identifier: u32,
    attrs: Vec<Box<dyn Attribute>>,
    error: Option<Attr<PaTncError>>,
    failure: Option<DecodeFailure>,
}

impl PaTncMsg {
    pub fn new(identifier: u32) -> Self {
        Self {
            identifier,
            ..Default::default()
        }
    }

    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    /// Append an attribute; wire order follows insertion order.
    pub fn add<A: Attribute + 'static>(&mut self, attr: A) {
        self.attrs.push(Box::new(attr));
    }

    pub fn add_boxed(&mut self, attr: Box<dyn Attribute>) {
        self.attrs.push(attr);
    }

    pub fn attrs(&self) -> impl Iterator<Item = &(dyn Attribute + 'static)> {
        self.attrs.iter().map(|a| a.as_ref())
    }

    pub fn into_attrs(self) -> Vec<Box<dyn Attribute>> {
        self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// First attribute of kind `B`.
    pub fn find<B: AttrBody>(&self) -> Option<&B> {
        self.attrs().find_map(|a| a.body::<B>())
    }

    /// Every attribute of kind `B`, in order.
    pub fn find_all<B: AttrBody>(&self) -> impl Iterator<Item = &B> {
        self.attrs().filter_map(|a| a.body::<B>())
    }

    /// Error attribute synthesized for the first decode failure.
    pub fn error_attr(&self) -> Option<&Attr<PaTncError>> {
        self.error.as_ref()
    }

    pub fn take_error_attr(&mut self) -> Option<Attr<PaTncError>> {
        self.error.take()
    }

    pub fn failure(&self) -> Option<&DecodeFailure> {
        self.failure.as_ref()
    }

    /// Serialize every attribute, in insertion order, behind a message header.
    pub fn encode(&mut self) -> Bytes {
        let mut buf = BytesMut::new();
        MsgHeader {
            version: PA_TNC_VERSION,
            identifier: self.identifier,
        }
        .encode(&mut buf);
        for attr in &mut self.attrs {
            let value = attr.serialize();
            buf.reserve(ATTR_HEADER_SIZE + value.len());
            attr.header().encode(&mut buf);
            buf.put_slice(&value);
        }
        buf.freeze()
    }

    /// Decode a complete message.
    ///
    /// Decoding stops at the first fatal failure; attributes decoded before
    /// it are kept, and a PA-TNC Error attribute describing it is available
    /// through [`error_attr`](Self::error_attr).
    pub fn decode(registry: &AttrRegistry, data: &[u8]) -> Self {
        let Some(header) = MsgHeader::decode(data) else {
            let mut msg = Self::new(0);
            msg.fail(
                [0; MSG_HEADER_SIZE],
                DecodeFailure {
                    attr_type: None,
                    position: 0,
                    error: AttrError::InsufficientData { offset: 0 },
                },
                AttrFlags::empty(),
            );
            return msg;
        };

        let mut msg = Self::new(header.identifier);
        let raw_header = header.to_bytes();

        if header.version != PA_TNC_VERSION {
            tracing::warn!(version = header.version, "unsupported PA-TNC version");
            msg.failure = Some(DecodeFailure {
                attr_type: None,
                position: 0,
                error: AttrError::UnsupportedVersion(header.version),
            });
            msg.error = Some(Attr::new(PaTncError {
                msg_header: raw_header,
                info: ErrorInfo::VersionNotSupported {
                    max_version: PA_TNC_VERSION,
                    min_version: PA_TNC_VERSION,
                },
            }));
            return msg;
        }

        let mut pos = MSG_HEADER_SIZE;
        while pos < data.len() {
            let Some(attr_header) = AttrHeader::decode(&data[pos..]) else {
                msg.fail(
                    raw_header,
                    DecodeFailure {
                        attr_type: None,
                        position: pos,
                        error: AttrError::InsufficientData { offset: pos as u32 },
                    },
                    AttrFlags::empty(),
                );
                break;
            };

            let end = attr_header
                .value_len()
                .map(|len| pos + ATTR_HEADER_SIZE + len)
                .filter(|&end| end <= data.len());
            let Some(end) = end else {
                msg.fail(
                    raw_header,
                    DecodeFailure {
                        attr_type: Some(attr_header.attr_type),
                        position: pos,
                        error: AttrError::InvalidLength {
                            offset: pos as u32,
                            length: attr_header.length,
                        },
                    },
                    attr_header.flags,
                );
                break;
            };

            let value = Bytes::copy_from_slice(&data[pos + ATTR_HEADER_SIZE..end]);
            let decoded = registry
                .dispatch(&attr_header, value)
                .and_then(|mut attr| attr.parse().map(|()| attr));
            match decoded {
                Ok(attr) => msg.attrs.push(attr),
                Err(error) => {
                    msg.fail(
                        raw_header,
                        DecodeFailure {
                            attr_type: Some(attr_header.attr_type),
                            position: pos,
                            error,
                        },
                        attr_header.flags,
                    );
                    break;
                }
            }
            pos = end;
        }
        msg
    }

    fn fail(&mut self, msg_header: [u8; MSG_HEADER_SIZE], failure: DecodeFailure, flags: AttrFlags) {
        tracing::warn!(failure = %failure, "PA-TNC message decoding failed");
        let attr_type = failure.attr_type.unwrap_or(NO_ATTR);
        let info = match &failure.error {
            AttrError::UnknownMandatory(_) => ErrorInfo::AttrTypeNotSupported { flags, attr_type },
            error => ErrorInfo::InvalidParameter {
                flags,
                attr_type,
                offset: error.offset().unwrap_or(0),
            },
        };
        self.error = Some(Attr::new(PaTncError { msg_header, info }));
        self.failure = Some(failure);
    }
}
