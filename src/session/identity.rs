use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// Name a TNCCS endpoint is known by (e.g. the subject of its certificate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Trust anchor material bound to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub identity: Identity,
    /// Key identifier (e.g. SHA-1 of the subject public key).
    pub key_id: Bytes,
}

/// Source of trusted peer credentials.
pub trait CredentialStore: Send + Sync {
    fn lookup_trusted_identity(&self, identity: &Identity) -> Option<Credential>;
}

/// Credential store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: HashMap<Identity, Credential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, credential: Credential) {
        self.credentials
            .insert(credential.identity.clone(), credential);
    }

    pub fn with(mut self, identity: impl Into<Identity>, key_id: Bytes) -> Self {
        let identity = identity.into();
        self.insert(Credential { identity, key_id });
        self
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn lookup_trusted_identity(&self, identity: &Identity) -> Option<Credential> {
        self.credentials.get(identity).cloned()
    }
}
