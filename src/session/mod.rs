pub mod channel;
pub mod identity;
pub mod pts;
pub mod tnccs;

use std::time::Duration;

use crate::attestation::types::ExpectedMeasurements;
use crate::attr::pts::{
    prefer_strongest_group, prefer_strongest_hash, DhGroup, DhGroupSet, HashAlgo, HashAlgoSet,
    Preference, PtsCapabilities,
};
use crate::error::{Error, SessionError};
use crate::frame::BATCH_HEADER_SIZE;

/// Smallest nonce the PTS protocol accepts.
pub const PTS_MIN_NONCE_LEN: u8 = 17;

/// File measurement requests are numbered 1..=65535 within a session.
pub const MAX_MEASUREMENT_PATHS: usize = u16::MAX as usize;

/// Configuration shared by the verifier and attestor sides of a session.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum PB-TNC batch size in bytes (default: 1 MiB).
    pub max_batch_size: u32,

    /// Maximum time to wait for the peer's next batch (default: 30s).
    pub round_timeout: Duration,

    /// DH groups offered (verifier) or accepted (attestor).
    pub dh_groups: DhGroupSet,

    /// Measurement hash algorithms offered (verifier) or supported (attestor).
    pub hash_algorithms: HashAlgoSet,

    /// PTS protocol capabilities announced to the peer.
    pub capabilities: PtsCapabilities,

    /// Length of locally generated nonces (default: 20).
    pub nonce_len: u8,

    /// Smallest responder nonce the verifier accepts (default: 17).
    pub min_nonce_len: u8,

    /// Files the verifier requests measurements for.
    pub measurement_paths: Vec<String>,

    /// Reference values the verifier checks reported measurements against.
    pub expected_measurements: Option<ExpectedMeasurements>,

    /// Refuse to create a session unless the peer identity is trusted.
    pub require_trusted_peer: bool,

    /// Picks the DH group out of the overlap with the peer.
    pub dh_preference: Preference<DhGroup>,

    /// Picks the hash algorithm out of the overlap with the peer.
    pub hash_preference: Preference<HashAlgo>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_batch_size: crate::frame::MAX_BATCH_SIZE,
            round_timeout: Duration::from_secs(30),
            dh_groups: DhGroup::IKE14 | DhGroup::IKE19 | DhGroup::IKE20,
            hash_algorithms: HashAlgo::SHA256 | HashAlgo::SHA384,
            capabilities: PtsCapabilities::DH_NONCE.union(PtsCapabilities::VERIFICATION),
            nonce_len: 20,
            min_nonce_len: PTS_MIN_NONCE_LEN,
            measurement_paths: Vec::new(),
            expected_measurements: None,
            require_trusted_peer: false,
            dh_preference: prefer_strongest_group,
            hash_preference: prefer_strongest_hash,
        }
    }
}

impl SessionConfig {
    /// Create a builder for constructing a `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn max_batch_size(mut self, size: u32) -> Self {
        self.config.max_batch_size = size;
        self
    }

    pub fn round_timeout(mut self, timeout: Duration) -> Self {
        self.config.round_timeout = timeout;
        self
    }

    pub fn dh_groups(mut self, groups: impl Into<DhGroupSet>) -> Self {
        self.config.dh_groups = groups.into();
        self
    }

    pub fn hash_algorithms(mut self, algorithms: impl Into<HashAlgoSet>) -> Self {
        self.config.hash_algorithms = algorithms.into();
        self
    }

    pub fn capabilities(mut self, capabilities: PtsCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn nonce_len(mut self, len: u8) -> Self {
        self.config.nonce_len = len;
        self
    }

    pub fn min_nonce_len(mut self, len: u8) -> Self {
        self.config.min_nonce_len = len;
        self
    }

    /// Request a measurement of `path`; may be called repeatedly.
    pub fn measure(mut self, path: impl Into<String>) -> Self {
        self.config.measurement_paths.push(path.into());
        self
    }

    pub fn expected_measurements(mut self, measurements: ExpectedMeasurements) -> Self {
        self.config.expected_measurements = Some(measurements);
        self
    }

    pub fn require_trusted_peer(mut self, require: bool) -> Self {
        self.config.require_trusted_peer = require;
        self
    }

    pub fn dh_preference(mut self, preference: Preference<DhGroup>) -> Self {
        self.config.dh_preference = preference;
        self
    }

    pub fn hash_preference(mut self, preference: Preference<HashAlgo>) -> Self {
        self.config.hash_preference = preference;
        self
    }

    /// Build the `SessionConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<SessionConfig, Error> {
        let config = self.config;
        let invalid = |msg: String| -> Result<SessionConfig, Error> {
            Err(SessionError::InvalidConfig(msg).into())
        };

        if (config.max_batch_size as usize) <= BATCH_HEADER_SIZE {
            return invalid(format!(
                "max_batch_size must be > {BATCH_HEADER_SIZE}"
            ));
        }
        if config.round_timeout.is_zero() {
            return invalid("round_timeout must be > 0".into());
        }
        if config.dh_groups.is_empty() {
            return invalid("at least one DH group is required".into());
        }
        if config.hash_algorithms.is_empty() {
            return invalid("at least one hash algorithm is required".into());
        }
        if config.min_nonce_len == 0 {
            return invalid("min_nonce_len must be > 0".into());
        }
        if config.nonce_len < config.min_nonce_len {
            return invalid(format!(
                "nonce_len {} is below min_nonce_len {}",
                config.nonce_len, config.min_nonce_len
            ));
        }
        if config.measurement_paths.len() > MAX_MEASUREMENT_PATHS {
            return invalid(format!(
                "{} measurement paths, at most {MAX_MEASUREMENT_PATHS}",
                config.measurement_paths.len()
            ));
        }
        if let Some(expected) = &config.expected_measurements {
            if !config.hash_algorithms.contains(expected.algorithm) {
                return invalid(format!(
                    "reference values use {} which is not among {}",
                    expected.algorithm, config.hash_algorithms
                ));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.max_batch_size, 1024 * 1024);
        assert_eq!(config.nonce_len, 20);
        assert_eq!(config.min_nonce_len, PTS_MIN_NONCE_LEN);
        assert!(config.dh_groups.contains(DhGroup::MODP2048));
        assert!(config.capabilities.contains(PtsCapabilities::DH_NONCE));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = SessionConfig::builder()
            .round_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_sets() {
        assert!(SessionConfig::builder()
            .dh_groups(DhGroupSet::empty())
            .build()
            .is_err());
        assert!(SessionConfig::builder()
            .hash_algorithms(HashAlgoSet::empty())
            .build()
            .is_err());
    }

    #[test]
    fn rejects_short_nonce() {
        assert!(SessionConfig::builder().nonce_len(16).build().is_err());
        assert!(SessionConfig::builder()
            .min_nonce_len(0)
            .nonce_len(0)
            .build()
            .is_err());
        assert!(SessionConfig::builder()
            .min_nonce_len(8)
            .nonce_len(8)
            .build()
            .is_ok());
    }

    #[test]
    fn rejects_tiny_batches() {
        assert!(SessionConfig::builder().max_batch_size(8).build().is_err());
    }

    #[test]
    fn reference_algorithm_must_be_offered() {
        let expected = ExpectedMeasurements::new(HashAlgo::SHA1, BTreeMap::new());
        assert!(SessionConfig::builder()
            .expected_measurements(expected)
            .build()
            .is_err());
    }

    #[test]
    fn measurement_paths_capped_at_request_id_space() {
        let at_limit = (0..MAX_MEASUREMENT_PATHS)
            .fold(SessionConfig::builder(), |b, i| b.measure(format!("/f{i}")));
        assert!(at_limit.build().is_ok());

        let over = (0..=MAX_MEASUREMENT_PATHS)
            .fold(SessionConfig::builder(), |b, i| b.measure(format!("/f{i}")));
        assert!(matches!(
            over.build(),
            Err(Error::Session(SessionError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn builder_collects_paths() {
        let config = SessionConfig::builder()
            .measure("/bin/sh")
            .measure("/etc/hosts")
            .dh_groups(DhGroup::ECP256)
            .build()
            .unwrap();
        assert_eq!(config.measurement_paths, vec!["/bin/sh", "/etc/hosts"]);
        assert_eq!(config.dh_groups, DhGroupSet::from(DhGroup::ECP256));
    }
}
