/// Batch transport over any async byte stream.
pub mod stream;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;

pub use stream::StreamTransport;

/// How the TNCCS exchange reaches the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Tunneled inside a TLS session (PT-TLS).
    Tls,
    /// Carried in-band by EAP (PT-EAP).
    Eap,
}

/// Reliable, ordered, already-secured carrier of whole PB-TNC batches.
#[async_trait]
pub trait Transport: Send {
    /// Deliver one complete batch.
    async fn send(&mut self, batch: Bytes) -> Result<(), Error>;

    /// Wait for the next complete batch.
    async fn receive(&mut self) -> Result<Bytes, Error>;

    fn kind(&self) -> TransportKind;
}
