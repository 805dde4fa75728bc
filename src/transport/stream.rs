use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use super::{Transport, TransportKind};
use crate::error::{Error, SessionError};
use crate::frame::codec::BatchCodec;

/// [`Transport`] framing batches over an `AsyncRead + AsyncWrite` stream,
/// e.g. the plaintext side of a TLS session.
#[derive(Debug)]
pub struct StreamTransport<T> {
    io: T,
    kind: TransportKind,
    read_buf: BytesMut,
    codec: BatchCodec,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamTransport<T> {
    pub fn new(io: T, kind: TransportKind) -> Self {
        Self::with_max_batch_size(io, kind, crate::frame::MAX_BATCH_SIZE)
    }

    /// Create a transport enforcing a custom maximum batch size.
    pub fn with_max_batch_size(io: T, kind: TransportKind, max_batch_size: u32) -> Self {
        Self {
            io,
            kind,
            read_buf: BytesMut::new(),
            codec: BatchCodec::with_max_batch_size(max_batch_size),
        }
    }

    pub fn into_inner(self) -> T {
        self.io
    }
}

#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for StreamTransport<T> {
    async fn send(&mut self, batch: Bytes) -> Result<(), Error> {
        let mut buf = BytesMut::new();
        self.codec.encode(batch, &mut buf).map_err(Error::Frame)?;
        self.io.write_all(&buf).await.map_err(Error::Io)?;
        self.io.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes, Error> {
        loop {
            if let Some(batch) = self.codec.decode(&mut self.read_buf).map_err(Error::Frame)? {
                return Ok(batch);
            }
            let n = self
                .io
                .read_buf(&mut self.read_buf)
                .await
                .map_err(Error::Io)?;
            if n == 0 {
                return Err(SessionError::Closed.into());
            }
        }
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}
