use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{BatchHeader, BATCH_HEADER_SIZE};
use crate::error::FrameError;

/// Upper bound on a single incremental reservation while a batch is
/// still arriving.
const MAX_RESERVE: usize = 64 * 1024;

/// Tokio codec splitting a byte stream into complete raw PB-TNC batches.
#[derive(Debug)]
pub struct BatchCodec {
    /// Cached header from a partial decode.
    current_header: Option<BatchHeader>,
    /// Configured maximum batch size (enforced on both directions).
    max_batch_size: u32,
}

impl Default for BatchCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCodec {
    pub fn new() -> Self {
        Self::with_max_batch_size(super::MAX_BATCH_SIZE)
    }

    /// Create a codec with a custom maximum batch size.
    pub fn with_max_batch_size(max_batch_size: u32) -> Self {
        Self {
            current_header: None,
            max_batch_size,
        }
    }
}

impl Decoder for BatchCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.current_header.take() {
            Some(h) => h,
            None => match BatchHeader::decode(src)? {
                Some(h) => h,
                None => {
                    src.reserve(BATCH_HEADER_SIZE - src.len());
                    return Ok(None);
                }
            },
        };

        if header.length > self.max_batch_size {
            return Err(FrameError::BatchTooLarge {
                size: header.length,
                max: self.max_batch_size,
            });
        }

        let length = header.length as usize;
        if src.len() < length {
            src.reserve((length - src.len()).min(MAX_RESERVE));
            self.current_header = Some(header);
            return Ok(None);
        }

        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for BatchCodec {
    type Error = FrameError;

    fn encode(&mut self, batch: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if batch.len() > self.max_batch_size as usize {
            return Err(FrameError::BatchTooLarge {
                size: batch.len().min(u32::MAX as usize) as u32,
                max: self.max_batch_size,
            });
        }
        dst.extend_from_slice(&batch);
        Ok(())
    }
}
