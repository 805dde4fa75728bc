pub mod types;

#[cfg(feature = "mock")]
pub mod mock;

use bytes::Bytes;

use crate::attr::pts::{DhGroup, FileMeasurement, HashAlgo, ReqFileMeas};
use crate::error::AttestError;

/// Supplies Diffie-Hellman public values for the nonce exchange.
///
/// Only the public value travels on the wire; the negotiation never needs
/// the shared secret.
pub trait KeyAgreement: Send + Sync {
    /// Fresh public value for `group`, exactly
    /// [`DhGroup::public_value_len`] bytes long.
    fn public_value(&self, group: DhGroup) -> Result<Bytes, AttestError>;
}

/// Produces file digests on the attestor side.
pub trait MeasurementProvider: Send + Sync {
    /// Measure the file (or every file of the directory) named by `request`.
    /// Each returned digest is [`HashAlgo::digest_len`] bytes long.
    fn measure(
        &self,
        request: &ReqFileMeas,
        algorithm: HashAlgo,
    ) -> Result<Vec<FileMeasurement>, AttestError>;
}
