use std::collections::BTreeMap;

use bytes::Bytes;
use rand::Rng;
use sha2::{Digest, Sha256, Sha384};

use super::{KeyAgreement, MeasurementProvider};
use crate::attr::pts::{DhGroup, FileMeasurement, HashAlgo, ReqFileMeas};
use crate::error::AttestError;

/// Mock key agreement producing random public values of the right size.
///
/// # Security Warning
///
/// The values are not real Diffie-Hellman public keys and must never be
/// used in production. Enable it only via `features = ["mock"]` for
/// development and testing.
#[derive(Debug, Default)]
pub struct MockKeyAgreement;

impl MockKeyAgreement {
    pub fn new() -> Self {
        Self
    }
}

impl KeyAgreement for MockKeyAgreement {
    fn public_value(&self, group: DhGroup) -> Result<Bytes, AttestError> {
        let len = group.public_value_len();
        if len == 0 {
            return Err(AttestError::KeyAgreement(format!(
                "unsupported DH group {group}"
            )));
        }
        let mut value = vec![0u8; len];
        rand::thread_rng().fill(value.as_mut_slice());
        Ok(Bytes::from(value))
    }
}

/// Mock measurement provider hashing in-memory file contents.
#[derive(Debug, Default, Clone)]
pub struct MockMeasurer {
    files: BTreeMap<String, Vec<u8>>,
}

impl MockMeasurer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Digest of `content` under `algorithm`.
    pub fn digest(algorithm: HashAlgo, content: &[u8]) -> Result<Vec<u8>, AttestError> {
        match algorithm {
            HashAlgo::SHA256 => Ok(Sha256::digest(content).to_vec()),
            HashAlgo::SHA384 => Ok(Sha384::digest(content).to_vec()),
            other => Err(AttestError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn measure_one(
        algorithm: HashAlgo,
        path: &str,
        content: &[u8],
    ) -> Result<FileMeasurement, AttestError> {
        Ok(FileMeasurement {
            filename: path.to_string(),
            digest: Bytes::from(Self::digest(algorithm, content)?),
        })
    }
}

impl MeasurementProvider for MockMeasurer {
    fn measure(
        &self,
        request: &ReqFileMeas,
        algorithm: HashAlgo,
    ) -> Result<Vec<FileMeasurement>, AttestError> {
        if !request.directory {
            let content = self
                .files
                .get(&request.pathname)
                .ok_or_else(|| AttestError::MeasurementFailed(request.pathname.clone()))?;
            return Ok(vec![Self::measure_one(
                algorithm,
                &request.pathname,
                content,
            )?]);
        }

        let prefix = format!("{}/", request.pathname.trim_end_matches('/'));
        self.files
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, content)| Self::measure_one(algorithm, path, content))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_value_sizes() {
        let ka = MockKeyAgreement::new();
        assert_eq!(ka.public_value(DhGroup::MODP2048).unwrap().len(), 256);
        assert_eq!(ka.public_value(DhGroup::ECP256).unwrap().len(), 64);
        assert!(ka.public_value(DhGroup::NONE).is_err());
    }

    #[test]
    fn measure_file_and_directory() {
        let measurer = MockMeasurer::new()
            .with_file("/etc/a", "alpha")
            .with_file("/etc/b", "beta")
            .with_file("/usr/c", "gamma");

        let single = measurer
            .measure(&ReqFileMeas::file(1, "/etc/a"), HashAlgo::SHA256)
            .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(
            single[0].digest.as_ref(),
            Sha256::digest(b"alpha").as_slice()
        );

        let dir = ReqFileMeas {
            directory: true,
            ..ReqFileMeas::file(2, "/etc")
        };
        let all = measurer.measure(&dir, HashAlgo::SHA384).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.digest.len() == 48));
    }

    #[test]
    fn missing_file_and_unsupported_algorithm() {
        let measurer = MockMeasurer::new().with_file("/etc/a", "alpha");
        assert!(matches!(
            measurer.measure(&ReqFileMeas::file(1, "/nope"), HashAlgo::SHA256),
            Err(AttestError::MeasurementFailed(_))
        ));
        assert!(matches!(
            measurer.measure(&ReqFileMeas::file(1, "/etc/a"), HashAlgo::SHA1),
            Err(AttestError::UnsupportedAlgorithm(_))
        ));
    }
}
