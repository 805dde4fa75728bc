//! TNCCS session: binds the endpoint identities and one PTS negotiation to
//! the PB-TNC batch exchange.

use std::sync::Arc;

use bytes::Bytes;

use super::identity::{Credential, CredentialStore, Identity};
use super::pts::{PtsRole, PtsSession, PtsState, Verdict};
use crate::error::{Error, FrameError, SessionError};
use crate::frame::{Batch, BatchType, PbMessage, PbPaMessage};
use crate::msg::PaTncMsg;
use crate::transport::TransportKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TnccsRole {
    /// TNC server; runs the verifier.
    Server,
    /// TNC client; runs the attestor.
    Client,
}

impl TnccsRole {
    fn pts_role(self) -> PtsRole {
        match self {
            Self::Server => PtsRole::Verifier,
            Self::Client => PtsRole::Attestor,
        }
    }
}

#[derive(Debug)]
pub struct TnccsSession {
    role: TnccsRole,
    server_id: Identity,
    peer_id: Identity,
    peer_credential: Option<Credential>,
    transport_kind: TransportKind,
    pts: PtsSession,
    finished: bool,
}

impl TnccsSession {
    /// Bind `pts` to a new session.
    ///
    /// Fails if the PTS role does not fit `role`, or if the configuration
    /// requires a trusted peer and `credentials` has none for `peer_id`.
    pub fn new(
        role: TnccsRole,
        server_id: Identity,
        peer_id: Identity,
        transport_kind: TransportKind,
        pts: PtsSession,
        credentials: &dyn CredentialStore,
    ) -> Result<Self, Error> {
        if pts.role() != role.pts_role() {
            return Err(SessionError::InvalidConfig(format!(
                "{role:?} session cannot run a {:?} PTS negotiation",
                pts.role()
            ))
            .into());
        }

        let peer_credential = credentials.lookup_trusted_identity(&peer_id);
        match &peer_credential {
            Some(credential) => tracing::debug!(
                peer = %peer_id,
                key_id = hex::encode(&credential.key_id),
                "peer identity trusted"
            ),
            None if pts.config().require_trusted_peer => {
                tracing::warn!(peer = %peer_id, "no trusted credential for peer");
                return Err(SessionError::UntrustedPeer(peer_id.to_string()).into());
            }
            None => {}
        }

        tracing::info!(
            role = ?role,
            server = %server_id,
            peer = %peer_id,
            transport = ?transport_kind,
            "TNCCS session created"
        );
        Ok(Self {
            role,
            server_id,
            peer_id,
            peer_credential,
            transport_kind,
            pts,
            finished: false,
        })
    }

    pub fn role(&self) -> TnccsRole {
        self.role
    }

    pub fn server_id(&self) -> &Identity {
        &self.server_id
    }

    pub fn peer_id(&self) -> &Identity {
        &self.peer_id
    }

    pub fn peer_credential(&self) -> Option<&Credential> {
        self.peer_credential.as_ref()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn pts(&self) -> &PtsSession {
        &self.pts
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn verdict(&self) -> Verdict {
        self.pts.verdict()
    }

    /// First batch of the exchange. Only the client opens.
    pub fn start(&mut self) -> Option<Bytes> {
        if self.finished || self.role != TnccsRole::Client {
            return None;
        }
        let mut msg = self.pts.start()?;
        Some(self.batch(BatchType::ClientData, vec![msg.encode()]).encode())
    }

    /// Handle one complete inbound batch and return the batch to send back.
    pub fn handle_inbound(&mut self, data: &[u8]) -> Option<Bytes> {
        if self.finished {
            tracing::debug!(len = data.len(), "ignoring batch after session end");
            return None;
        }

        let max = self.pts.config().max_batch_size;
        if data.len() > max as usize {
            let e = FrameError::BatchTooLarge {
                size: data.len().min(u32::MAX as usize) as u32,
                max,
            };
            return Some(self.abort(e.to_string()));
        }

        let batch = match Batch::decode(data) {
            Ok(batch) => batch,
            Err(e) => return Some(self.abort(format!("malformed batch: {e}"))),
        };
        tracing::debug!(
            batch_type = ?batch.batch_type,
            messages = batch.messages.len(),
            len = data.len(),
            "received batch"
        );

        if batch.from_server != (self.role == TnccsRole::Client) {
            return Some(self.abort("batch direction flag does not match peer role".into()));
        }

        match (self.role, batch.batch_type) {
            (_, BatchType::Close) => {
                self.pts.fail("peer closed the session");
                self.finished = true;
                None
            }
            (TnccsRole::Server, BatchType::ClientData)
            | (TnccsRole::Client, BatchType::ServerData | BatchType::Result) => {
                self.exchange(&batch)
            }
            (_, other) => Some(self.abort(format!("unexpected {other:?} batch"))),
        }
    }

    /// End the session locally, e.g. on timeout or transport failure.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.pts.fail(reason);
        self.finished = true;
    }

    fn exchange(&mut self, batch: &Batch) -> Option<Bytes> {
        let registry = Arc::clone(self.pts.registry());
        let mut replies = Vec::new();
        for body in batch.pts_messages() {
            let msg = PaTncMsg::decode(&registry, body);
            if let Some(mut reply) = self.pts.process(msg) {
                replies.push(reply.encode());
            }
        }

        if batch.batch_type == BatchType::Result {
            if let Some(result) = batch.assessment_result() {
                self.pts.adopt(result);
            }
            if self.pts.verdict() == Verdict::Pending {
                self.pts.fail("result batch without assessment");
            }
            self.finished = true;
            tracing::info!(verdict = ?self.pts.verdict(), "TNCCS session finished");
            return None;
        }

        Some(self.reply(replies))
    }

    fn reply(&mut self, replies: Vec<Bytes>) -> Bytes {
        if self.role == TnccsRole::Server {
            if let Some(result) = self.pts.assessment() {
                self.finished = true;
                tracing::info!(verdict = ?self.pts.verdict(), "TNCCS session finished");
                let mut batch = self.batch(BatchType::Result, replies);
                batch.messages.push(PbMessage::AssessmentResult(result));
                return batch.encode();
            }
        }

        if self.pts.state() == PtsState::Failed {
            self.finished = true;
            return self.batch(BatchType::Close, replies).encode();
        }

        let batch_type = match self.role {
            TnccsRole::Server => BatchType::ServerData,
            TnccsRole::Client => BatchType::ClientData,
        };
        self.batch(batch_type, replies).encode()
    }

    fn abort(&mut self, reason: String) -> Bytes {
        self.fail(reason);
        self.batch(BatchType::Close, Vec::new()).encode()
    }

    fn batch(&self, batch_type: BatchType, pa_messages: Vec<Bytes>) -> Batch {
        Batch {
            from_server: self.role == TnccsRole::Server,
            batch_type,
            messages: pa_messages
                .into_iter()
                .map(|body| PbMessage::Pa(PbPaMessage::pts(body)))
                .collect(),
        }
    }
}
