//! Drives a TNCCS session over a transport, one round at a time.

use bytes::Bytes;

use crate::error::{Error, SessionError};
use crate::transport::Transport;

use super::pts::Verdict;
use super::tnccs::TnccsSession;

/// Drive `session` over `transport` until it finishes.
///
/// Each wait for the peer is bounded by the configured round timeout. A
/// timeout or transport failure moves the session to `Failed` and is
/// returned as an error; a negotiated failure is returned as
/// `Ok(Verdict::Failed)`.
pub async fn run_session<T>(
    session: &mut TnccsSession,
    transport: &mut T,
) -> Result<Verdict, Error>
where
    T: Transport + ?Sized,
{
    if transport.kind() != session.transport_kind() {
        let reason = format!(
            "session expects {:?} transport, got {:?}",
            session.transport_kind(),
            transport.kind()
        );
        session.fail(reason.clone());
        return Err(SessionError::InvalidConfig(reason).into());
    }

    let round_timeout = session.pts().config().round_timeout;

    if let Some(batch) = session.start() {
        send(session, transport, batch).await?;
    }

    while !session.is_finished() {
        let inbound = match tokio::time::timeout(round_timeout, transport.receive()).await {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                session.fail(format!("transport failure: {e}"));
                return Err(SessionError::TransportFailure(e.to_string()).into());
            }
            Err(_) => {
                session.fail("round timeout");
                return Err(SessionError::Timeout.into());
            }
        };

        if let Some(reply) = session.handle_inbound(&inbound) {
            send(session, transport, reply).await?;
        }
    }

    tracing::debug!(
        peer = %session.peer_id(),
        verdict = ?session.verdict(),
        rounds = session.pts().round(),
        "session loop finished"
    );
    Ok(session.verdict())
}

async fn send<T>(session: &mut TnccsSession, transport: &mut T, batch: Bytes) -> Result<(), Error>
where
    T: Transport + ?Sized,
{
    if let Err(e) = transport.send(batch).await {
        session.fail(format!("transport failure: {e}"));
        return Err(SessionError::TransportFailure(e.to_string()).into());
    }
    Ok(())
}
