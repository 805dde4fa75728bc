use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tnc_pts::attestation::types::ExpectedMeasurements;
use tnc_pts::attr::pts::HashAlgo;
use tnc_pts::{
    run_session, AttrRegistry, Identity, InMemoryCredentialStore, MockKeyAgreement, MockMeasurer,
    PtsSession, SessionConfig, StreamTransport, TnccsRole, TnccsSession, TransportKind,
};

const KERNEL: &[u8] = b"vmlinuz contents";

/// PTS integrity check between a verifier and an attestor over TCP with
/// mock key agreement and measurement.
///
/// Run with: `RUST_LOG=tnc_pts=debug cargo run --example loopback --features mock`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let addr: SocketAddr = "127.0.0.1:9877".parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("verifier listening on {addr}");

    let registry = Arc::new(AttrRegistry::standard());

    let client_registry = Arc::clone(&registry);
    let client_handle = tokio::spawn(async move {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let measurer = MockMeasurer::new().with_file("/boot/vmlinuz", KERNEL.to_vec());
        let pts = PtsSession::attestor(
            Arc::new(SessionConfig::default()),
            client_registry,
            Arc::new(MockKeyAgreement::new()),
            Arc::new(measurer),
        );
        let mut session = TnccsSession::new(
            TnccsRole::Client,
            Identity::from("verifier.local"),
            Identity::from("verifier.local"),
            TransportKind::Tls,
            pts,
            &InMemoryCredentialStore::new(),
        )?;
        let mut transport = StreamTransport::new(stream, TransportKind::Tls);
        let verdict = run_session(&mut session, &mut transport).await?;
        println!("[attestor] verdict: {verdict:?}");
        Ok::<_, tnc_pts::Error>(())
    });

    let (stream, peer_addr) = listener.accept().await?;
    stream.set_nodelay(true)?;
    println!("accepted connection from {peer_addr}");

    let expected = BTreeMap::from([(
        "/boot/vmlinuz".to_string(),
        MockMeasurer::digest(HashAlgo::SHA384, KERNEL)?,
    )]);
    let config = SessionConfig::builder()
        .measure("/boot/vmlinuz")
        .expected_measurements(ExpectedMeasurements::new(HashAlgo::SHA384, expected))
        .build()?;
    let pts = PtsSession::verifier(
        Arc::new(config),
        registry,
        Arc::new(MockKeyAgreement::new()),
    );
    let mut session = TnccsSession::new(
        TnccsRole::Server,
        Identity::from("verifier.local"),
        Identity::new(peer_addr.to_string()),
        TransportKind::Tls,
        pts,
        &InMemoryCredentialStore::new(),
    )?;
    let mut transport = StreamTransport::new(stream, TransportKind::Tls);
    let verdict = run_session(&mut session, &mut transport).await?;

    println!(
        "[verifier] verdict: {verdict:?} (group {}, hash {})",
        session
            .pts()
            .dh_group()
            .map(|g| g.to_string())
            .unwrap_or_default(),
        session
            .pts()
            .hash_algo()
            .map(|h| h.to_string())
            .unwrap_or_default(),
    );

    client_handle.await??;
    Ok(())
}
