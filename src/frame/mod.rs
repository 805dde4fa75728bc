//! PB-TNC batch framing (RFC 5793 subset).
//!
//! ```text
//! |    Version    |D|     Reserved                        | B-Type|
//! |                       Batch Length                            |
//! |                 PB-TNC messages (variable)                    |
//! ```
//!
//! Each PB-TNC message carries a 12-byte header (flags, vendor id, type,
//! length). Only PB-PA and PB-Assessment-Result are understood; other
//! messages are skipped unless marked noskip.

pub mod codec;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::attr::ietf::AssessmentResult;
use crate::attr::Pen;
use crate::error::FrameError;

/// Current PB-TNC version.
pub const PB_TNC_VERSION: u8 = 2;

/// Fixed batch header size in bytes.
pub const BATCH_HEADER_SIZE: usize = 8;

/// PB-TNC message header size in bytes.
pub const PB_MSG_HEADER_SIZE: usize = 12;

/// Fixed part of a PB-PA message body.
pub const PB_PA_HEADER_SIZE: usize = 12;

/// Default maximum batch size: 1 MiB.
pub const MAX_BATCH_SIZE: u32 = 1024 * 1024;

const DIRECTION_SERVER: u8 = 0x80;
const BATCH_TYPE_MASK: u8 = 0x0F;
const NOSKIP: u8 = 0x80;
const EXCLUSIVE: u8 = 0x80;

const PB_MSG_PA: u32 = 1;
const PB_MSG_ASSESSMENT_RESULT: u32 = 2;

/// PA message subtype for the PTS integrity measurement component.
pub const PA_SUBTYPE_PTS: u32 = 1;

/// Batch types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchType {
    ClientData = 1,
    ServerData = 2,
    Result = 3,
    ClientRetry = 4,
    ServerRetry = 5,
    Close = 6,
}

impl BatchType {
    pub fn from_u8(v: u8) -> Result<Self, FrameError> {
        match v {
            1 => Ok(Self::ClientData),
            2 => Ok(Self::ServerData),
            3 => Ok(Self::Result),
            4 => Ok(Self::ClientRetry),
            5 => Ok(Self::ServerRetry),
            6 => Ok(Self::Close),
            other => Err(FrameError::UnknownBatchType(other)),
        }
    }
}

/// A parsed batch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHeader {
    /// Set when the batch travels from the TNCCS server to the client.
    pub from_server: bool,
    pub batch_type: BatchType,
    /// Total batch length including this header.
    pub length: u32,
}

impl BatchHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(PB_TNC_VERSION);
        buf.put_u8(if self.from_server { DIRECTION_SERVER } else { 0 });
        buf.put_u8(0);
        buf.put_u8(self.batch_type as u8);
        buf.put_u32(self.length);
    }

    /// Decode a header from the front of `buf` without consuming it.
    /// Returns `None` if not enough bytes.
    pub fn decode(mut buf: &[u8]) -> Result<Option<Self>, FrameError> {
        if buf.len() < BATCH_HEADER_SIZE {
            return Ok(None);
        }

        let version = buf.get_u8();
        if version != PB_TNC_VERSION {
            return Err(FrameError::UnsupportedVersion(version));
        }
        let direction = buf.get_u8();
        let _reserved = buf.get_u8();
        let batch_type = BatchType::from_u8(buf.get_u8() & BATCH_TYPE_MASK)?;
        let length = buf.get_u32();
        if (length as usize) < BATCH_HEADER_SIZE {
            return Err(FrameError::InvalidLength { offset: 0, length });
        }

        Ok(Some(Self {
            from_server: direction & DIRECTION_SERVER != 0,
            batch_type,
            length,
        }))
    }
}

/// PB-PA message: one PA-TNC message addressed to a PA subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbPaMessage {
    pub exclusive: bool,
    pub pa_vendor: Pen,
    pub pa_subtype: u32,
    pub collector_id: u16,
    pub validator_id: u16,
    /// Encoded PA-TNC message.
    pub body: Bytes,
}

impl PbPaMessage {
    /// PB-PA message for the PTS subtype.
    pub fn pts(body: Bytes) -> Self {
        Self {
            exclusive: false,
            pa_vendor: Pen::TCG,
            pa_subtype: PA_SUBTYPE_PTS,
            collector_id: 1,
            validator_id: 1,
            body,
        }
    }

    pub fn is_pts(&self) -> bool {
        self.pa_vendor == Pen::TCG && self.pa_subtype == PA_SUBTYPE_PTS
    }
}

/// PB-TNC messages understood by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PbMessage {
    Pa(PbPaMessage),
    AssessmentResult(AssessmentResult),
}

impl PbMessage {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Pa(pa) => {
                put_msg_header(buf, PB_MSG_PA, PB_PA_HEADER_SIZE + pa.body.len());
                buf.put_u8(if pa.exclusive { EXCLUSIVE } else { 0 });
                buf.put_uint(pa.pa_vendor.raw() as u64, 3);
                buf.put_u32(pa.pa_subtype);
                buf.put_u16(pa.collector_id);
                buf.put_u16(pa.validator_id);
                buf.put_slice(&pa.body);
            }
            Self::AssessmentResult(result) => {
                put_msg_header(buf, PB_MSG_ASSESSMENT_RESULT, 4);
                buf.put_u32(*result as u32);
            }
        }
    }
}

fn put_msg_header(buf: &mut BytesMut, msg_type: u32, body_len: usize) {
    buf.put_u8(NOSKIP);
    buf.put_uint(Pen::IETF.raw() as u64, 3);
    buf.put_u32(msg_type);
    buf.put_u32((PB_MSG_HEADER_SIZE + body_len) as u32);
}

/// A complete PB-TNC batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub from_server: bool,
    pub batch_type: BatchType,
    pub messages: Vec<PbMessage>,
}

impl Batch {
    pub fn new(from_server: bool, batch_type: BatchType) -> Self {
        Self {
            from_server,
            batch_type,
            messages: Vec::new(),
        }
    }

    /// Batch carrying a single PTS PA-TNC message.
    pub fn with_pa(from_server: bool, batch_type: BatchType, pa_msg: Bytes) -> Self {
        Self {
            from_server,
            batch_type,
            messages: vec![PbMessage::Pa(PbPaMessage::pts(pa_msg))],
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        for msg in &self.messages {
            msg.encode(&mut body);
        }
        let mut buf = BytesMut::with_capacity(BATCH_HEADER_SIZE + body.len());
        BatchHeader {
            from_server: self.from_server,
            batch_type: self.batch_type,
            length: (BATCH_HEADER_SIZE + body.len()) as u32,
        }
        .encode(&mut buf);
        buf.put_slice(&body);
        buf.freeze()
    }

    /// Decode one complete batch. PA message bodies are copied out of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let header = BatchHeader::decode(data)?.ok_or(FrameError::Incomplete {
            expected: BATCH_HEADER_SIZE,
            actual: data.len(),
        })?;
        if header.length as usize != data.len() {
            return Err(FrameError::Incomplete {
                expected: header.length as usize,
                actual: data.len(),
            });
        }

        let mut batch = Self::new(header.from_server, header.batch_type);
        let mut pos = BATCH_HEADER_SIZE;
        while pos < data.len() {
            let mut cursor = &data[pos..];
            if cursor.len() < PB_MSG_HEADER_SIZE {
                return Err(FrameError::Incomplete {
                    expected: pos + PB_MSG_HEADER_SIZE,
                    actual: data.len(),
                });
            }
            let flags = cursor.get_u8();
            let vendor = cursor.get_uint(3) as u32;
            let msg_type = cursor.get_u32();
            let length = cursor.get_u32();
            let end = pos + length as usize;
            if (length as usize) < PB_MSG_HEADER_SIZE || end > data.len() {
                return Err(FrameError::InvalidLength {
                    offset: pos,
                    length,
                });
            }
            let mut body = &data[pos + PB_MSG_HEADER_SIZE..end];

            match (Pen::new(vendor), msg_type) {
                (Pen::IETF, PB_MSG_PA) => {
                    if body.len() < PB_PA_HEADER_SIZE {
                        return Err(FrameError::InvalidLength {
                            offset: pos,
                            length,
                        });
                    }
                    let exclusive = body.get_u8() & EXCLUSIVE != 0;
                    let pa_vendor = Pen::new(body.get_uint(3) as u32);
                    let pa_subtype = body.get_u32();
                    let collector_id = body.get_u16();
                    let validator_id = body.get_u16();
                    batch.messages.push(PbMessage::Pa(PbPaMessage {
                        exclusive,
                        pa_vendor,
                        pa_subtype,
                        collector_id,
                        validator_id,
                        body: Bytes::copy_from_slice(body),
                    }));
                }
                (Pen::IETF, PB_MSG_ASSESSMENT_RESULT) => {
                    if body.len() != 4 {
                        return Err(FrameError::InvalidLength {
                            offset: pos,
                            length,
                        });
                    }
                    let raw = body.get_u32();
                    let result = AssessmentResult::from_u32(raw)
                        .ok_or(FrameError::InvalidAssessmentResult(raw))?;
                    batch.messages.push(PbMessage::AssessmentResult(result));
                }
                _ if flags & NOSKIP != 0 => {
                    return Err(FrameError::UnsupportedMessage { vendor, msg_type });
                }
                _ => {
                    tracing::debug!(vendor, msg_type, "skipping PB-TNC message");
                }
            }
            pos = end;
        }
        Ok(batch)
    }

    /// PA-TNC message bodies addressed to the PTS subtype, in order.
    pub fn pts_messages(&self) -> impl Iterator<Item = &Bytes> {
        self.messages.iter().filter_map(|m| match m {
            PbMessage::Pa(pa) if pa.is_pts() => Some(&pa.body),
            _ => None,
        })
    }

    pub fn assessment_result(&self) -> Option<AssessmentResult> {
        self.messages.iter().find_map(|m| match m {
            PbMessage::AssessmentResult(result) => Some(*result),
            _ => None,
        })
    }
}
