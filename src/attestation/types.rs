use std::collections::BTreeMap;

use crate::attr::pts::{FileMeasurement, HashAlgo};
use crate::error::AttestError;

/// Reference digests to verify reported file measurements against.
///
/// Maps file names to their expected digest under `algorithm`. Only the
/// files present in this map are checked; other reported files are ignored.
#[derive(Debug, Clone)]
pub struct ExpectedMeasurements {
    pub algorithm: HashAlgo,
    pub values: BTreeMap<String, Vec<u8>>,
}

impl ExpectedMeasurements {
    pub fn new(algorithm: HashAlgo, values: BTreeMap<String, Vec<u8>>) -> Self {
        Self { algorithm, values }
    }

    /// Verify that every expected file was reported with a matching digest.
    pub fn verify(
        &self,
        algorithm: HashAlgo,
        actual: &[FileMeasurement],
    ) -> Result<(), AttestError> {
        if algorithm != self.algorithm {
            return Err(AttestError::UnsupportedAlgorithm(format!(
                "reference values use {}, measurements use {algorithm}",
                self.algorithm
            )));
        }
        for (filename, expected) in &self.values {
            match actual.iter().find(|m| &m.filename == filename) {
                Some(measured) => {
                    if measured.digest.as_ref() != expected.as_slice() {
                        return Err(AttestError::VerificationFailed(format!(
                            "{filename} mismatch: expected {}, got {}",
                            hex::encode(expected),
                            hex::encode(&measured.digest),
                        )));
                    }
                }
                None => {
                    return Err(AttestError::MissingMeasurement(filename.clone()));
                }
            }
        }
        Ok(())
    }
}
