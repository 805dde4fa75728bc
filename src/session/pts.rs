//! PTS measurement negotiation.
//!
//! Round sequence (verifier = TNCCS server, attestor = TNCCS client):
//!
//! ```text
//! attestor                                   verifier
//!  | -- ProtoCaps ------------------------------> |
//!  | <-- ReqProtoCaps, DhNonceParamsReq, MeasAlgo |
//!  | -- DhNonceParamsResp, MeasAlgoSelection ---> |
//!  | <-- DhNonceFinish, ReqFileMeas* ------------ |
//!  | -- FileMeas* ------------------------------> |
//!  | <-- Assessment ----------------------------- |
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;

use super::SessionConfig;
use crate::attestation::{KeyAgreement, MeasurementProvider};
use crate::attr::ietf::{Assessment, AssessmentResult, PaTncError};
use crate::attr::pts::{
    DhGroup, DhNonceFinish, DhNonceParamsReq, DhNonceParamsResp, FileMeas, HashAlgo, MeasAlgo,
    MeasAlgoSelection, ProtoCaps, PtsCapabilities, ReqFileMeas, ReqProtoCaps,
};
use crate::attr::registry::AttrRegistry;
use crate::attr::{Attr, AttrBody};
use crate::error::{AttestError, Error, SessionError};
use crate::msg::PaTncMsg;

/// Side of the measurement exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsRole {
    /// Requests and checks evidence.
    Verifier,
    /// Supplies evidence.
    Attestor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsState {
    Init,
    CapabilitiesSent,
    CapabilitiesReceived,
    NonceExchange,
    MeasurementExchange,
    Verified,
    Failed,
}

impl PtsState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

impl fmt::Display for PtsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::CapabilitiesSent => "capabilities-sent",
            Self::CapabilitiesReceived => "capabilities-received",
            Self::NonceExchange => "nonce-exchange",
            Self::MeasurementExchange => "measurement-exchange",
            Self::Verified => "verified",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Success,
    Failed,
}

/// One PTS negotiation, driven by [`start`](Self::start) and
/// [`process`](Self::process). State only changes inside those calls.
pub struct PtsSession {
    role: PtsRole,
    state: PtsState,
    round: u32,
    config: Arc<SessionConfig>,
    registry: Arc<AttrRegistry>,
    key_agreement: Arc<dyn KeyAgreement>,
    measurer: Option<Arc<dyn MeasurementProvider>>,
    peer_capabilities: Option<PtsCapabilities>,
    dh_group: Option<DhGroup>,
    hash_algo: Option<HashAlgo>,
    initiator_nonce: Option<Bytes>,
    responder_nonce: Option<Bytes>,
    pending_requests: Vec<u16>,
    assessment: Option<AssessmentResult>,
    failure: Option<String>,
    next_msg_id: u32,
}

impl fmt::Debug for PtsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtsSession")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("round", &self.round)
            .field("dh_group", &self.dh_group)
            .field("hash_algo", &self.hash_algo)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl PtsSession {
    pub fn verifier(
        config: Arc<SessionConfig>,
        registry: Arc<AttrRegistry>,
        key_agreement: Arc<dyn KeyAgreement>,
    ) -> Self {
        Self::new(PtsRole::Verifier, config, registry, key_agreement, None)
    }

    pub fn attestor(
        config: Arc<SessionConfig>,
        registry: Arc<AttrRegistry>,
        key_agreement: Arc<dyn KeyAgreement>,
        measurer: Arc<dyn MeasurementProvider>,
    ) -> Self {
        Self::new(
            PtsRole::Attestor,
            config,
            registry,
            key_agreement,
            Some(measurer),
        )
    }

    fn new(
        role: PtsRole,
        config: Arc<SessionConfig>,
        registry: Arc<AttrRegistry>,
        key_agreement: Arc<dyn KeyAgreement>,
        measurer: Option<Arc<dyn MeasurementProvider>>,
    ) -> Self {
        Self {
            role,
            state: PtsState::Init,
            round: 0,
            config,
            registry,
            key_agreement,
            measurer,
            peer_capabilities: None,
            dh_group: None,
            hash_algo: None,
            initiator_nonce: None,
            responder_nonce: None,
            pending_requests: Vec::new(),
            assessment: None,
            failure: None,
            next_msg_id: 1,
        }
    }

    pub fn role(&self) -> PtsRole {
        self.role
    }

    pub fn state(&self) -> PtsState {
        self.state
    }

    /// Number of `start`/`process` calls that did work.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn verdict(&self) -> Verdict {
        match self.state {
            PtsState::Verified => Verdict::Success,
            PtsState::Failed => Verdict::Failed,
            _ => Verdict::Pending,
        }
    }

    pub fn config(&self) -> &Arc<SessionConfig> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AttrRegistry> {
        &self.registry
    }

    pub fn peer_capabilities(&self) -> Option<PtsCapabilities> {
        self.peer_capabilities
    }

    pub fn dh_group(&self) -> Option<DhGroup> {
        self.dh_group
    }

    pub fn hash_algo(&self) -> Option<HashAlgo> {
        self.hash_algo
    }

    pub fn initiator_nonce(&self) -> Option<&Bytes> {
        self.initiator_nonce.as_ref()
    }

    pub fn responder_nonce(&self) -> Option<&Bytes> {
        self.responder_nonce.as_ref()
    }

    /// Assessment issued (verifier) or received (attestor).
    pub fn assessment(&self) -> Option<AssessmentResult> {
        self.assessment
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Emit the opening message. Only the attestor speaks first; returns
    /// `None` for the verifier or once the session has started.
    pub fn start(&mut self) -> Option<PaTncMsg> {
        if self.role != PtsRole::Attestor || self.state != PtsState::Init {
            return None;
        }
        self.round += 1;
        let mut msg = self.next_message();
        msg.add(Attr::new(ProtoCaps {
            caps: self.config.capabilities,
        }));
        self.transition(PtsState::CapabilitiesSent);
        Some(msg)
    }

    /// Handle one inbound message and return the reply, if any.
    pub fn process(&mut self, mut msg: PaTncMsg) -> Option<PaTncMsg> {
        if self.state.is_terminal() {
            tracing::debug!(state = %self.state, "ignoring message after completion");
            return None;
        }
        self.round += 1;

        if let Some(failure) = msg.failure() {
            let reason = format!("malformed PA-TNC message: {failure}");
            let error = msg.take_error_attr();
            self.fail(reason);
            let mut reply = self.next_message();
            if let Some(error) = error {
                reply.add(error);
            }
            return Some(reply);
        }

        if let Some(error) = msg.find::<PaTncError>() {
            self.fail(SessionError::PeerError(error.to_string()).to_string());
            return None;
        }

        let result = match (self.role, self.state) {
            (PtsRole::Verifier, PtsState::Init) => self.on_capabilities(&msg),
            (PtsRole::Attestor, PtsState::CapabilitiesSent) => self.on_nonce_request(&msg),
            (PtsRole::Verifier, PtsState::CapabilitiesReceived) => self.on_nonce_response(&msg),
            (PtsRole::Attestor, PtsState::NonceExchange) => self.on_nonce_finish(&msg),
            (PtsRole::Verifier, PtsState::MeasurementExchange) => self.on_measurements(&msg),
            (PtsRole::Attestor, PtsState::MeasurementExchange) => self.on_assessment(&msg),
            (_, state) => Err(SessionError::UnexpectedMessage {
                expected: "no message",
                actual: format!("{} in state {state}", describe(&msg)),
            }
            .into()),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                self.fail(e.to_string());
                None
            }
        }
    }

    /// Take over an assessment decided by the verifier.
    pub fn adopt(&mut self, result: AssessmentResult) {
        if self.state.is_terminal() {
            return;
        }
        self.assessment = Some(result);
        if result.is_compliant() {
            tracing::info!(role = ?self.role, "platform assessed compliant");
            self.transition(PtsState::Verified);
        } else {
            self.fail(format!("platform assessed {result:?}"));
        }
    }

    /// Move to `Failed`. No-op once the session is terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let reason = reason.into();
        tracing::warn!(
            role = ?self.role,
            state = %self.state,
            round = self.round,
            reason = %reason,
            "PTS negotiation failed"
        );
        self.state = PtsState::Failed;
        self.failure = Some(reason);
    }

    fn transition(&mut self, next: PtsState) {
        tracing::debug!(role = ?self.role, from = %self.state, to = %next, "PTS state");
        self.state = next;
    }

    fn next_message(&mut self) -> PaTncMsg {
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        PaTncMsg::new(id)
    }

    fn negotiated(&self) -> Result<(DhGroup, HashAlgo), SessionError> {
        match (self.dh_group, self.hash_algo) {
            (Some(group), Some(hash)) => Ok((group, hash)),
            _ => Err(SessionError::NegotiationMismatch(
                "parameters not negotiated".into(),
            )),
        }
    }

    fn on_capabilities(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let caps = require::<ProtoCaps>(msg, "PTS protocol capabilities")?.caps;
        self.peer_capabilities = Some(caps);
        if !caps.contains(PtsCapabilities::DH_NONCE) {
            return Err(SessionError::NegotiationMismatch(format!(
                "peer lacks DH nonce support (capabilities {:#04x})",
                caps.raw()
            ))
            .into());
        }

        let config = Arc::clone(&self.config);
        let mut reply = self.next_message();
        reply.add(Attr::new(ReqProtoCaps {
            caps: config.capabilities,
        }));
        reply.add(Attr::new(DhNonceParamsReq {
            min_nonce_len: config.min_nonce_len,
            dh_groups: config.dh_groups,
        }));
        reply.add(Attr::new(MeasAlgo {
            algorithms: config.hash_algorithms,
        }));
        self.transition(PtsState::CapabilitiesReceived);
        Ok(Some(reply))
    }

    fn on_nonce_request(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let request = require::<DhNonceParamsReq>(msg, "DH nonce parameters request")?;
        let offered = require::<MeasAlgo>(msg, "measurement algorithms")?;
        if let Some(caps) = msg.find::<ReqProtoCaps>() {
            self.peer_capabilities = Some(caps.caps);
        }

        let config = Arc::clone(&self.config);
        let group = request
            .dh_groups
            .intersection(config.dh_groups)
            .select(config.dh_preference)
            .ok_or_else(|| {
                SessionError::NegotiationMismatch(format!(
                    "no common DH group: offered {}, supported {}",
                    request.dh_groups, config.dh_groups
                ))
            })?;
        let supported = offered.algorithms.intersection(config.hash_algorithms);
        let hash = supported.select(config.hash_preference).ok_or_else(|| {
            SessionError::NegotiationMismatch(format!(
                "no common hash algorithm: offered {}, supported {}",
                offered.algorithms, config.hash_algorithms
            ))
        })?;

        let nonce = random_nonce(config.nonce_len.max(request.min_nonce_len) as usize);
        let value = self.key_agreement.public_value(group)?;
        let response = DhNonceParamsResp::new(group, supported, nonce.clone(), value)?;

        tracing::info!(
            dh_group = %group,
            hash_algo = %hash,
            responder_nonce = hex::encode(&nonce),
            "selected PTS parameters"
        );
        self.dh_group = Some(group);
        self.hash_algo = Some(hash);
        self.responder_nonce = Some(nonce);

        let mut reply = self.next_message();
        reply.add(Attr::new(response));
        reply.add(Attr::new(MeasAlgoSelection { algorithm: hash }));
        self.transition(PtsState::NonceExchange);
        Ok(Some(reply))
    }

    fn on_nonce_response(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let response = require::<DhNonceParamsResp>(msg, "DH nonce parameters response")?;
        let selection = require::<MeasAlgoSelection>(msg, "measurement algorithm selection")?;
        let config = Arc::clone(&self.config);

        let group = response.dh_group();
        if !group.is_single() {
            return Err(mismatch(format!(
                "peer selected DH group {:#06x}, expected a single group",
                group.raw()
            )));
        }
        if !config.dh_groups.contains(group) {
            return Err(mismatch(format!(
                "peer selected DH group {group} outside offered {}",
                config.dh_groups
            )));
        }
        let hash = selection.algorithm;
        if !config.hash_algorithms.contains(hash) || !response.hash_algo_set().contains(hash) {
            return Err(mismatch(format!(
                "peer selected hash algorithm {hash} outside offered {}",
                config.hash_algorithms
            )));
        }
        let nonce_len = response.responder_nonce().len();
        if nonce_len == 0 || nonce_len < config.min_nonce_len as usize {
            return Err(mismatch(format!(
                "responder nonce of {nonce_len} bytes, at least {} required",
                config.min_nonce_len
            )));
        }
        let value_len = response.responder_value().len();
        if value_len != group.public_value_len() {
            return Err(mismatch(format!(
                "public value of {value_len} bytes for {group}, expected {}",
                group.public_value_len()
            )));
        }

        let initiator_nonce = random_nonce(nonce_len);
        let value = self.key_agreement.public_value(group)?;
        let finish = DhNonceFinish::new(hash, value, initiator_nonce.clone())?;

        tracing::info!(
            dh_group = %group,
            hash_algo = %hash,
            responder_nonce = hex::encode(response.responder_nonce()),
            initiator_nonce = hex::encode(&initiator_nonce),
            "accepted PTS parameters"
        );
        self.dh_group = Some(group);
        self.hash_algo = Some(hash);
        self.responder_nonce = Some(response.responder_nonce().clone());
        self.initiator_nonce = Some(initiator_nonce);

        let mut reply = self.next_message();
        reply.add(Attr::new(finish));
        for (i, path) in config.measurement_paths.iter().enumerate() {
            let request_id = u16::try_from(i + 1).map_err(|_| {
                SessionError::InvalidConfig(format!(
                    "{} measurement paths exceed the request id space",
                    config.measurement_paths.len()
                ))
            })?;
            reply.add(Attr::new(ReqFileMeas::file(request_id, path.clone())));
            self.pending_requests.push(request_id);
        }
        self.transition(PtsState::MeasurementExchange);
        Ok(Some(reply))
    }

    fn on_nonce_finish(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let finish = require::<DhNonceFinish>(msg, "DH nonce finish")?;
        let (group, hash) = self.negotiated()?;

        if finish.hash_algo() != hash {
            return Err(mismatch(format!(
                "finish uses {}, selected {hash}",
                finish.hash_algo()
            )));
        }
        let expected_len = self.responder_nonce.as_ref().map_or(0, Bytes::len);
        if finish.initiator_nonce().len() != expected_len {
            return Err(mismatch(format!(
                "initiator nonce of {} bytes, expected {expected_len}",
                finish.initiator_nonce().len()
            )));
        }
        if finish.initiator_value().len() != group.public_value_len() {
            return Err(mismatch(format!(
                "public value of {} bytes for {group}, expected {}",
                finish.initiator_value().len(),
                group.public_value_len()
            )));
        }
        self.initiator_nonce = Some(finish.initiator_nonce().clone());

        let measurer = self
            .measurer
            .clone()
            .ok_or_else(|| AttestError::MeasurementFailed("no measurement provider".into()))?;
        let mut reply = self.next_message();
        for request in msg.find_all::<ReqFileMeas>() {
            let files = measurer.measure(request, hash)?;
            tracing::debug!(
                request_id = request.request_id,
                path = %request.pathname,
                files = files.len(),
                "measured"
            );
            let meas = FileMeas::new(request.request_id, hash.digest_len() as u16, files)?;
            reply.add(Attr::new(meas));
        }
        self.transition(PtsState::MeasurementExchange);
        Ok(Some(reply))
    }

    fn on_measurements(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let (_, hash) = self.negotiated()?;

        let mut answered = Vec::new();
        let mut files = Vec::new();
        for meas in msg.find_all::<FileMeas>() {
            if !self.pending_requests.contains(&meas.request_id()) {
                return Err(SessionError::UnexpectedMessage {
                    expected: "file measurement for an outstanding request",
                    actual: format!("request id {}", meas.request_id()),
                }
                .into());
            }
            if meas.meas_len() as usize != hash.digest_len() {
                return Err(mismatch(format!(
                    "{}-byte measurements, {hash} needs {}",
                    meas.meas_len(),
                    hash.digest_len()
                )));
            }
            answered.push(meas.request_id());
            files.extend(meas.files().iter().cloned());
        }

        let config = Arc::clone(&self.config);
        let outcome = match self
            .pending_requests
            .iter()
            .find(|id| !answered.contains(*id))
        {
            Some(missing) => Err(AttestError::MissingMeasurement(format!(
                "no response to request {missing}"
            ))),
            None => match &config.expected_measurements {
                Some(expected) => expected.verify(hash, &files),
                None => Ok(()),
            },
        };
        self.pending_requests.clear();

        let result = match outcome {
            Ok(()) => {
                tracing::info!(files = files.len(), hash_algo = %hash, "measurements verified");
                self.transition(PtsState::Verified);
                AssessmentResult::Compliant
            }
            Err(e) => {
                self.fail(e.to_string());
                AssessmentResult::NonCompliantMajor
            }
        };
        self.assessment = Some(result);

        let mut reply = self.next_message();
        reply.add(Attr::new(Assessment { result }));
        Ok(Some(reply))
    }

    fn on_assessment(&mut self, msg: &PaTncMsg) -> Result<Option<PaTncMsg>, Error> {
        let assessment = require::<Assessment>(msg, "assessment result")?;
        self.adopt(assessment.result);
        Ok(None)
    }
}

fn require<'a, B: AttrBody>(
    msg: &'a PaTncMsg,
    expected: &'static str,
) -> Result<&'a B, SessionError> {
    msg.find::<B>()
        .ok_or_else(|| SessionError::UnexpectedMessage {
            expected,
            actual: describe(msg),
        })
}

fn describe(msg: &PaTncMsg) -> String {
    if msg.is_empty() {
        return "empty message".into();
    }
    msg.attrs()
        .map(|a| a.identify().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn mismatch(reason: String) -> Error {
    SessionError::NegotiationMismatch(reason).into()
}

fn random_nonce(len: usize) -> Bytes {
    let mut nonce = vec![0u8; len];
    rand::thread_rng().fill(nonce.as_mut_slice());
    Bytes::from(nonce)
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::attestation::mock::{MockKeyAgreement, MockMeasurer};
    use crate::attestation::types::ExpectedMeasurements;
    use crate::attr::ietf::ErrorInfo;
    use crate::attr::pts::HashAlgoSet;
    use crate::attr::{AttrFlags, AttrType, Pen};
    use crate::msg::MSG_HEADER_SIZE;

    const MOTD: &[u8] = b"welcome";

    fn registry() -> Arc<AttrRegistry> {
        Arc::new(AttrRegistry::standard())
    }

    fn verifier_config() -> SessionConfig {
        let digest = MockMeasurer::digest(HashAlgo::SHA384, MOTD).unwrap();
        SessionConfig::builder()
            .measure("/etc/motd")
            .expected_measurements(ExpectedMeasurements::new(
                HashAlgo::SHA384,
                BTreeMap::from([("/etc/motd".to_string(), digest)]),
            ))
            .build()
            .unwrap()
    }

    fn pair(verifier: SessionConfig, attestor: SessionConfig, content: &[u8]) -> (PtsSession, PtsSession) {
        let registry = registry();
        let v = PtsSession::verifier(
            Arc::new(verifier),
            Arc::clone(&registry),
            Arc::new(MockKeyAgreement::new()),
        );
        let a = PtsSession::attestor(
            Arc::new(attestor),
            registry,
            Arc::new(MockKeyAgreement::new()),
            Arc::new(MockMeasurer::new().with_file("/etc/motd", content.to_vec())),
        );
        (v, a)
    }

    /// Encode and decode as the peer would see it.
    fn wire(msg: Option<PaTncMsg>) -> PaTncMsg {
        let mut msg = msg.expect("expected a message");
        PaTncMsg::decode(&AttrRegistry::standard(), &msg.encode())
    }

    fn run(v: &mut PtsSession, a: &mut PtsSession) {
        let mut to_verifier = a.start();
        while let Some(msg) = to_verifier.take() {
            let Some(reply) = v.process(wire(Some(msg))) else {
                break;
            };
            to_verifier = a.process(wire(Some(reply)));
        }
    }

    #[test]
    fn full_exchange_verifies() {
        let (mut v, mut a) = pair(verifier_config(), SessionConfig::default(), MOTD);

        let caps = a.start();
        assert_eq!(a.state(), PtsState::CapabilitiesSent);
        assert!(a.start().is_none());

        let req = v.process(wire(caps));
        assert_eq!(v.state(), PtsState::CapabilitiesReceived);
        assert_eq!(v.peer_capabilities(), Some(SessionConfig::default().capabilities));

        let resp = a.process(wire(req));
        assert_eq!(a.state(), PtsState::NonceExchange);
        assert_eq!(a.dh_group(), Some(DhGroup::ECP384));
        assert_eq!(a.hash_algo(), Some(HashAlgo::SHA384));
        assert_eq!(a.responder_nonce().unwrap().len(), 20);

        let finish = v.process(wire(resp));
        assert_eq!(v.state(), PtsState::MeasurementExchange);
        assert_eq!(v.responder_nonce(), a.responder_nonce());

        let meas = a.process(wire(finish));
        assert_eq!(a.state(), PtsState::MeasurementExchange);
        assert_eq!(a.initiator_nonce(), v.initiator_nonce());
        assert_eq!(a.initiator_nonce().unwrap().len(), 20);

        let result = v.process(wire(meas));
        assert_eq!(v.verdict(), Verdict::Success);
        assert_eq!(v.assessment(), Some(AssessmentResult::Compliant));

        assert!(a.process(wire(result)).is_none());
        assert_eq!(a.verdict(), Verdict::Success);
        assert_eq!(a.round(), 4);
        assert_eq!(v.round(), 3);
    }

    #[test]
    fn verifier_does_not_start() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        assert!(v.start().is_none());
        assert_eq!(v.state(), PtsState::Init);
    }

    #[test]
    fn measurement_mismatch_fails_both_sides() {
        let (mut v, mut a) = pair(verifier_config(), SessionConfig::default(), b"tampered");
        run(&mut v, &mut a);
        assert_eq!(v.verdict(), Verdict::Failed);
        assert_eq!(v.assessment(), Some(AssessmentResult::NonCompliantMajor));
        assert!(v.failure_reason().unwrap().contains("/etc/motd"));
        assert_eq!(a.verdict(), Verdict::Failed);
        assert_eq!(a.assessment(), Some(AssessmentResult::NonCompliantMajor));
    }

    #[test]
    fn disjoint_dh_groups_fail() {
        let attestor = SessionConfig::builder()
            .dh_groups(DhGroup::MODP1024)
            .build()
            .unwrap();
        let (mut v, mut a) = pair(verifier_config(), attestor, MOTD);
        run(&mut v, &mut a);
        assert_eq!(a.verdict(), Verdict::Failed);
        assert!(a.failure_reason().unwrap().contains("no common DH group"));
        assert_eq!(v.state(), PtsState::CapabilitiesReceived);
    }

    #[test]
    fn preference_picks_weakest_when_asked() {
        fn weakest(a: DhGroup, b: DhGroup) -> std::cmp::Ordering {
            b.strength().cmp(&a.strength())
        }
        let attestor = SessionConfig::builder()
            .dh_preference(weakest)
            .build()
            .unwrap();
        let (mut v, mut a) = pair(verifier_config(), attestor, MOTD);
        run(&mut v, &mut a);
        assert_eq!(a.dh_group(), Some(DhGroup::MODP2048));
        assert_eq!(v.dh_group(), Some(DhGroup::MODP2048));
        assert_eq!(v.verdict(), Verdict::Success);
    }

    #[test]
    fn attestor_raises_nonce_to_requested_minimum() {
        let verifier = SessionConfig::builder()
            .min_nonce_len(32)
            .nonce_len(32)
            .build()
            .unwrap();
        let (mut v, mut a) = pair(verifier, SessionConfig::default(), MOTD);
        run(&mut v, &mut a);
        assert_eq!(a.responder_nonce().unwrap().len(), 32);
        assert_eq!(v.verdict(), Verdict::Success);
    }

    #[test]
    fn verifier_rejects_short_nonce() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        let mut caps = PaTncMsg::new(1);
        caps.add(Attr::new(ProtoCaps {
            caps: PtsCapabilities::DH_NONCE,
        }));
        v.process(wire(Some(caps)));

        let mut resp = PaTncMsg::new(2);
        resp.add(Attr::new(
            DhNonceParamsResp::new(
                DhGroup::ECP256,
                HashAlgoSet::from(HashAlgo::SHA384),
                Bytes::from(vec![1u8; 8]),
                Bytes::from(vec![2u8; 64]),
            )
            .unwrap(),
        ));
        resp.add(Attr::new(MeasAlgoSelection {
            algorithm: HashAlgo::SHA384,
        }));
        assert!(v.process(wire(Some(resp))).is_none());
        assert_eq!(v.verdict(), Verdict::Failed);
        assert!(v.failure_reason().unwrap().contains("8 bytes"));
    }

    /// Drive the verifier to `NonceExchange`, then feed it a response
    /// selecting `group` with a public value of `value_len` bytes.
    fn verifier_after_response(config: SessionConfig, group: DhGroup, value_len: usize) -> PtsSession {
        let (mut v, _) = pair(config, SessionConfig::default(), MOTD);
        let mut caps = PaTncMsg::new(1);
        caps.add(Attr::new(ProtoCaps {
            caps: PtsCapabilities::DH_NONCE,
        }));
        v.process(wire(Some(caps)));

        let mut resp = PaTncMsg::new(2);
        resp.add(Attr::new(
            DhNonceParamsResp::new(
                group,
                HashAlgoSet::from(HashAlgo::SHA384),
                Bytes::from(vec![1u8; 20]),
                Bytes::from(vec![2u8; value_len]),
            )
            .unwrap(),
        ));
        resp.add(Attr::new(MeasAlgoSelection {
            algorithm: HashAlgo::SHA384,
        }));
        assert!(v.process(wire(Some(resp))).is_none());
        v
    }

    #[test]
    fn verifier_rejects_unoffered_dh_group() {
        let config = SessionConfig::builder()
            .dh_groups(DhGroup::ECP384 | DhGroup::MODP2048)
            .measure("/etc/motd")
            .build()
            .unwrap();
        let v = verifier_after_response(config, DhGroup::ECP256, 64);
        assert_eq!(v.state(), PtsState::Failed);
        assert_eq!(v.verdict(), Verdict::Failed);
        assert!(v.failure_reason().unwrap().contains("DH group"));
        assert_eq!(v.dh_group(), None);
    }

    #[test]
    fn verifier_rejects_multi_bit_dh_group() {
        let combined = DhGroup::from_raw(DhGroup::IKE14.raw() | DhGroup::IKE19.raw());
        assert!(!combined.is_single());
        let v = verifier_after_response(SessionConfig::default(), combined, 0);
        assert_eq!(v.state(), PtsState::Failed);
        assert!(v.failure_reason().unwrap().contains("DH group"));
        assert_eq!(v.dh_group(), None);
    }

    #[test]
    fn verifier_requires_dh_nonce_capability() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        let mut caps = PaTncMsg::new(1);
        caps.add(Attr::new(ProtoCaps {
            caps: PtsCapabilities::VERIFICATION,
        }));
        assert!(v.process(wire(Some(caps))).is_none());
        assert_eq!(v.verdict(), Verdict::Failed);
    }

    #[test]
    fn peer_error_attribute_fails() {
        let (_, mut a) = pair(verifier_config(), SessionConfig::default(), MOTD);
        a.start();
        let mut err = PaTncMsg::new(1);
        err.add(Attr::new(PaTncError {
            msg_header: [1, 0, 0, 0, 0, 0, 0, 1],
            info: ErrorInfo::InvalidParameter {
                flags: AttrFlags::empty(),
                attr_type: crate::attr::pts::PROTO_CAPS,
                offset: 0,
            },
        }));
        assert!(a.process(wire(Some(err))).is_none());
        assert_eq!(a.verdict(), Verdict::Failed);
        assert!(a.failure_reason().unwrap().contains("peer reported error"));
    }

    #[test]
    fn malformed_message_replies_with_error() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        let truncated = [
            1, 0, 0, 0, 0, 0, 0, 7, // message header
            0, 0, 0x55, 0x97, 0, 0, 0x83, 0, 0, 0, 0, 22, // DH response header
            0, 0, 0, 20, 0x20, 0, 0x40, 0, 0xAA, 0xAA, // 10-byte value
        ];
        let reply = v.process(PaTncMsg::decode(&AttrRegistry::standard(), &truncated));
        assert_eq!(v.verdict(), Verdict::Failed);

        let reply = wire(reply);
        let error = reply.find::<PaTncError>().unwrap();
        assert_eq!(&error.msg_header[..MSG_HEADER_SIZE], &truncated[..MSG_HEADER_SIZE]);
        assert_eq!(
            error.info,
            ErrorInfo::InvalidParameter {
                flags: AttrFlags::empty(),
                attr_type: AttrType::new(Pen::TCG, 0x8300),
                offset: 0,
            }
        );
    }

    #[test]
    fn out_of_order_message_fails() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        let mut msg = PaTncMsg::new(1);
        msg.add(Attr::new(MeasAlgoSelection {
            algorithm: HashAlgo::SHA256,
        }));
        assert!(v.process(wire(Some(msg))).is_none());
        assert!(v
            .failure_reason()
            .unwrap()
            .contains("PTS protocol capabilities"));
    }

    #[test]
    fn terminal_state_ignores_input() {
        let (mut v, _) = pair(verifier_config(), SessionConfig::default(), MOTD);
        v.fail("test");
        let rounds = v.round();
        assert!(v.process(PaTncMsg::new(1)).is_none());
        assert_eq!(v.round(), rounds);
        v.fail("again");
        assert_eq!(v.failure_reason(), Some("test"));
    }
}
