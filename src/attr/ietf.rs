//! IETF PA-TNC attributes (RFC 5792) used by the negotiation.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{require_len, AttrBody, AttrFlags, AttrType, Pen};
use crate::error::AttrError;
use crate::msg::MSG_HEADER_SIZE;

pub const PA_TNC_ERROR: AttrType = AttrType::new(Pen::IETF, 8);
pub const ASSESSMENT_RESULT: AttrType = AttrType::new(Pen::IETF, 9);

const ERROR_SIZE: usize = 8;

const CODE_INVALID_PARAMETER: u32 = 1;
const CODE_VERSION_NOT_SUPPORTED: u32 = 2;
const CODE_ATTR_TYPE_NOT_SUPPORTED: u32 = 3;

/// Error-specific information of a PA-TNC Error attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorInfo {
    /// An attribute could not be parsed. `offset` is the value offset the
    /// attribute's parser reported.
    InvalidParameter {
        flags: AttrFlags,
        attr_type: AttrType,
        offset: u32,
    },
    /// The PA-TNC message version is not supported.
    VersionNotSupported { max_version: u8, min_version: u8 },
    /// A noskip attribute was not recognized.
    AttrTypeNotSupported { flags: AttrFlags, attr_type: AttrType },
    /// Vendor-specific or unrecognized error code, kept opaque.
    Other { vendor: Pen, code: u32, info: Bytes },
}

impl ErrorInfo {
    fn vendor_and_code(&self) -> (Pen, u32) {
        match self {
            Self::InvalidParameter { .. } => (Pen::IETF, CODE_INVALID_PARAMETER),
            Self::VersionNotSupported { .. } => (Pen::IETF, CODE_VERSION_NOT_SUPPORTED),
            Self::AttrTypeNotSupported { .. } => (Pen::IETF, CODE_ATTR_TYPE_NOT_SUPPORTED),
            Self::Other { vendor, code, .. } => (*vendor, *code),
        }
    }
}

/// PA-TNC Error.
///
/// ```text
/// |   Reserved    |            PA-TNC Error Code Vendor ID        |
/// |                        PA-TNC Error Code                      |
/// |               Copy of PA-TNC Message Header (8 bytes)         |
/// |                 Error Information (code specific)             |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaTncError {
    /// Header of the message that triggered the error.
    pub msg_header: [u8; MSG_HEADER_SIZE],
    pub info: ErrorInfo,
}

fn put_attr_ident(buf: &mut BytesMut, flags: AttrFlags, attr_type: AttrType) {
    buf.put_u8(flags.raw());
    buf.put_uint(attr_type.vendor.raw() as u64, 3);
    buf.put_u32(attr_type.code);
}

fn get_attr_ident(buf: &mut &[u8]) -> (AttrFlags, AttrType) {
    let flags = AttrFlags::from_raw(buf.get_u8());
    let vendor = Pen::new(buf.get_uint(3) as u32);
    let code = buf.get_u32();
    (flags, AttrType::new(vendor, code))
}

impl AttrBody for PaTncError {
    const TYPE: AttrType = PA_TNC_ERROR;

    fn encode(&self, buf: &mut BytesMut) {
        let (vendor, code) = self.info.vendor_and_code();
        buf.put_u8(0);
        buf.put_uint(vendor.raw() as u64, 3);
        buf.put_u32(code);
        if let ErrorInfo::Other { info, .. } = &self.info {
            buf.put_slice(info);
            return;
        }
        buf.put_slice(&self.msg_header);
        match &self.info {
            ErrorInfo::InvalidParameter {
                flags,
                attr_type,
                offset,
            } => {
                put_attr_ident(buf, *flags, *attr_type);
                buf.put_u32(*offset);
            }
            ErrorInfo::VersionNotSupported {
                max_version,
                min_version,
            } => {
                buf.put_u8(*max_version);
                buf.put_u8(*min_version);
                buf.put_u16(0);
            }
            ErrorInfo::AttrTypeNotSupported { flags, attr_type } => {
                put_attr_ident(buf, *flags, *attr_type);
            }
            ErrorInfo::Other { .. } => {}
        }
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, ERROR_SIZE, 0)?;
        let _reserved = value.get_u8();
        let vendor = Pen::new(value.get_uint(3) as u32);
        let code = value.get_u32();

        let info_len = match (vendor, code) {
            (Pen::IETF, CODE_INVALID_PARAMETER) => 12,
            (Pen::IETF, CODE_VERSION_NOT_SUPPORTED) => 4,
            (Pen::IETF, CODE_ATTR_TYPE_NOT_SUPPORTED) => 8,
            _ => {
                return Ok(Self {
                    msg_header: [0; MSG_HEADER_SIZE],
                    info: ErrorInfo::Other {
                        vendor,
                        code,
                        info: Bytes::copy_from_slice(value),
                    },
                })
            }
        };
        require_len(value, MSG_HEADER_SIZE + info_len, ERROR_SIZE as u32)?;
        let mut msg_header = [0u8; MSG_HEADER_SIZE];
        value.copy_to_slice(&mut msg_header);

        let info = match code {
            CODE_INVALID_PARAMETER => {
                let (flags, attr_type) = get_attr_ident(&mut value);
                ErrorInfo::InvalidParameter {
                    flags,
                    attr_type,
                    offset: value.get_u32(),
                }
            }
            CODE_VERSION_NOT_SUPPORTED => ErrorInfo::VersionNotSupported {
                max_version: value.get_u8(),
                min_version: value.get_u8(),
            },
            _ => {
                let (flags, attr_type) = get_attr_ident(&mut value);
                ErrorInfo::AttrTypeNotSupported { flags, attr_type }
            }
        };
        Ok(Self { msg_header, info })
    }
}

impl fmt::Display for PaTncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            ErrorInfo::InvalidParameter {
                attr_type, offset, ..
            } => write!(f, "invalid parameter in {attr_type} at offset {offset}"),
            ErrorInfo::VersionNotSupported {
                max_version,
                min_version,
            } => write!(
                f,
                "version not supported (supported {min_version}..={max_version})"
            ),
            ErrorInfo::AttrTypeNotSupported { attr_type, .. } => {
                write!(f, "attribute type {attr_type} not supported")
            }
            ErrorInfo::Other { vendor, code, .. } => {
                write!(f, "error code {code} (vendor {vendor})")
            }
        }
    }
}

/// Outcome of an integrity assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AssessmentResult {
    Compliant = 0,
    NonCompliantMinor = 1,
    NonCompliantMajor = 2,
    Error = 3,
    DontKnow = 4,
}

impl AssessmentResult {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Compliant),
            1 => Some(Self::NonCompliantMinor),
            2 => Some(Self::NonCompliantMajor),
            3 => Some(Self::Error),
            4 => Some(Self::DontKnow),
            _ => None,
        }
    }

    pub const fn is_compliant(self) -> bool {
        matches!(self, Self::Compliant)
    }
}

/// Assessment Result attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub result: AssessmentResult,
}

impl AttrBody for Assessment {
    const TYPE: AttrType = ASSESSMENT_RESULT;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.result as u32);
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, 4, 0)?;
        let result = AssessmentResult::from_u32(value.get_u32()).ok_or(AttrError::InvalidField {
            field: "assessment result",
            offset: 0,
        })?;
        Ok(Self { result })
    }
}
