//! PTS file measurement request and response.
//!
//! Request File Measurement:
//!
//! ```text
//! |     Flags     |   Reserved    |          Request ID           |
//! |                          Delimiter                            |
//! |              Fully Qualified File Pathname (Variable)         |
//! ```
//!
//! File Measurement:
//!
//! ```text
//! |                   Number of Files included                    |
//! |                   Number of Files included                    |
//! |          Request ID           |      Measurement Length       |
//! |                   Measurement #1 (Variable)                   |
//! |      Filename Length          | Filename (Variable Length)    |
//! ...
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::attr::{require_len, AttrBody, AttrType};
use crate::error::AttrError;

const REQ_FILE_MEAS_SIZE: usize = 8;
const FILE_MEAS_SIZE: usize = 12;

/// Default delimiter: '/'.
pub const SOLIDUS_UTF: u32 = 0x2F;

const DIRECTORY_FLAG: u8 = 0x80;

/// Request File Measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqFileMeas {
    /// Measure every file in the named directory instead of a single file.
    pub directory: bool,
    pub request_id: u16,
    pub delimiter: u32,
    pub pathname: String,
}

impl ReqFileMeas {
    pub fn file(request_id: u16, pathname: impl Into<String>) -> Self {
        Self {
            directory: false,
            request_id,
            delimiter: SOLIDUS_UTF,
            pathname: pathname.into(),
        }
    }
}

impl AttrBody for ReqFileMeas {
    const TYPE: AttrType = super::REQ_FILE_MEAS;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(REQ_FILE_MEAS_SIZE + self.pathname.len());
        buf.put_u8(if self.directory { DIRECTORY_FLAG } else { 0 });
        buf.put_u8(0);
        buf.put_u16(self.request_id);
        buf.put_u32(self.delimiter);
        buf.put_slice(self.pathname.as_bytes());
    }

    fn decode(mut value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, REQ_FILE_MEAS_SIZE, 0)?;
        let flags = value.get_u8();
        let _reserved = value.get_u8();
        let request_id = value.get_u16();
        let delimiter = value.get_u32();
        let pathname = std::str::from_utf8(value)
            .map_err(|_| AttrError::InvalidField {
                field: "pathname",
                offset: REQ_FILE_MEAS_SIZE as u32,
            })?
            .to_owned();
        Ok(Self {
            directory: flags & DIRECTORY_FLAG != 0,
            request_id,
            delimiter,
            pathname,
        })
    }
}

/// One measured file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeasurement {
    pub filename: String,
    pub digest: Bytes,
}

/// File Measurement: digests for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeas {
    request_id: u16,
    meas_len: u16,
    files: Vec<FileMeasurement>,
}

impl FileMeas {
    /// Every digest must be `meas_len` bytes long.
    pub fn new(
        request_id: u16,
        meas_len: u16,
        files: Vec<FileMeasurement>,
    ) -> Result<Self, AttrError> {
        for file in &files {
            if file.digest.len() != meas_len as usize {
                return Err(AttrError::InvalidField {
                    field: "measurement length",
                    offset: 10,
                });
            }
            if file.filename.len() > u16::MAX as usize {
                return Err(AttrError::FieldTooLong {
                    field: "filename",
                    len: file.filename.len(),
                    max: u16::MAX as usize,
                });
            }
        }
        Ok(Self {
            request_id,
            meas_len,
            files,
        })
    }

    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    pub fn meas_len(&self) -> u16 {
        self.meas_len
    }

    pub fn files(&self) -> &[FileMeasurement] {
        &self.files
    }
}

impl AttrBody for FileMeas {
    const TYPE: AttrType = super::FILE_MEAS;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.files.len() as u64);
        buf.put_u16(self.request_id);
        buf.put_u16(self.meas_len);
        for file in &self.files {
            buf.put_slice(&file.digest);
            buf.put_u16(file.filename.len() as u16);
            buf.put_slice(file.filename.as_bytes());
        }
    }

    fn decode(value: &[u8]) -> Result<Self, AttrError> {
        require_len(value, FILE_MEAS_SIZE, 0)?;
        let mut cursor = value;
        let count = cursor.get_u64();
        let request_id = cursor.get_u16();
        let meas_len = cursor.get_u16();

        let mut files = Vec::new();
        for _ in 0..count {
            // Offset of the entry that could not be read.
            let offset = (value.len() - cursor.len()) as u32;
            require_len(cursor, meas_len as usize + 2, offset)?;
            let digest = Bytes::copy_from_slice(&cursor[..meas_len as usize]);
            cursor.advance(meas_len as usize);
            let name_len = cursor.get_u16() as usize;
            require_len(cursor, name_len, offset)?;
            let filename = std::str::from_utf8(&cursor[..name_len])
                .map_err(|_| AttrError::InvalidField {
                    field: "filename",
                    offset,
                })?
                .to_owned();
            cursor.advance(name_len);
            files.push(FileMeasurement { filename, digest });
        }
        if !cursor.is_empty() {
            return Err(AttrError::InvalidField {
                field: "trailing data",
                offset: (value.len() - cursor.len()) as u32,
            });
        }

        Ok(Self {
            request_id,
            meas_len,
            files,
        })
    }
}
