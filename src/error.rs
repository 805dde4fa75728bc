use std::io;

use crate::attr::AttrType;

/// Errors from attribute serialization and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    #[error("insufficient data at offset {offset}")]
    InsufficientData { offset: u32 },

    #[error("unsupported mandatory attribute {0}")]
    UnknownMandatory(AttrType),

    #[error("invalid attribute length {length} at offset {offset}")]
    InvalidLength { offset: u32, length: u32 },

    #[error("unsupported PA-TNC message version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid {field} at offset {offset}")]
    InvalidField { field: &'static str, offset: u32 },

    #[error("{field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl AttrError {
    /// Byte offset carried by the error, if any.
    pub fn offset(&self) -> Option<u32> {
        match self {
            Self::InsufficientData { offset }
            | Self::InvalidLength { offset, .. }
            | Self::InvalidField { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Errors from PB-TNC batch framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unsupported PB-TNC version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown batch type: {0}")]
    UnknownBatchType(u8),

    #[error("batch too large: {size} bytes (max {max})")]
    BatchTooLarge { size: u32, max: u32 },

    #[error("invalid length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: u32 },

    #[error("incomplete batch: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("unsupported mandatory PB-TNC message (vendor {vendor:#08x}, type {msg_type})")]
    UnsupportedMessage { vendor: u32, msg_type: u32 },

    #[error("invalid assessment result: {0}")]
    InvalidAssessmentResult(u32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by attestation collaborators and measurement checks.
#[derive(Debug, thiserror::Error)]
pub enum AttestError {
    #[error("key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("measurement failed: {0}")]
    MeasurementFailed(String),

    #[error("measurement verification failed: {0}")]
    VerificationFailed(String),

    #[error("missing measurement: {0}")]
    MissingMeasurement(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Errors from PTS negotiation and TNCCS session handling.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("negotiation mismatch: {0}")]
    NegotiationMismatch(String),

    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: String,
    },

    #[error("peer reported error: {0}")]
    PeerError(String),

    #[error("untrusted peer identity: {0}")]
    UntrustedPeer(String),

    #[error("round timeout")]
    Timeout,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("session closed")]
    Closed,

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Attr(#[from] AttrError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Attestation(#[from] AttestError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
