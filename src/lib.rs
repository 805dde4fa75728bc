//! PA-TNC attribute codec and PTS measurement negotiation carried inside a
//! TNCCS (PB-TNC) session.

pub mod attestation;
pub mod attr;
pub mod error;
pub mod frame;
pub mod msg;
pub mod session;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use attr::registry::AttrRegistry;
pub use attr::{Attr, AttrBody, AttrType, Attribute, Pen};
pub use error::{Error, Result};
pub use msg::PaTncMsg;
pub use session::channel::run_session;
pub use session::identity::{Credential, CredentialStore, Identity, InMemoryCredentialStore};
pub use session::pts::{PtsRole, PtsSession, PtsState, Verdict};
pub use session::tnccs::{TnccsRole, TnccsSession};
pub use session::SessionConfig;
pub use transport::{StreamTransport, Transport, TransportKind};

pub use attestation::{KeyAgreement, MeasurementProvider};

#[cfg(feature = "mock")]
pub use attestation::mock::{MockKeyAgreement, MockMeasurer};
