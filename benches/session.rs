use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use tnc_pts::attr::pts::HashAlgo;
use tnc_pts::{
    run_session, AttrRegistry, Identity, InMemoryCredentialStore, MockKeyAgreement, MockMeasurer,
    PtsSession, SessionConfig, StreamTransport, TnccsRole, TnccsSession, TransportKind, Verdict,
};

/// Large enough that no batch of the exchange blocks on a full pipe.
const DUPLEX_SIZE: usize = 64 * 1024;

fn session(
    role: TnccsRole,
    config: &Arc<SessionConfig>,
    registry: &Arc<AttrRegistry>,
) -> TnccsSession {
    let key_agreement = Arc::new(MockKeyAgreement::new());
    let pts = match role {
        TnccsRole::Server => {
            PtsSession::verifier(Arc::clone(config), Arc::clone(registry), key_agreement)
        }
        TnccsRole::Client => {
            let measurer = (0..16).fold(MockMeasurer::new(), |m, i| {
                m.with_file(format!("/lib/mod{i}.so"), vec![i as u8; 4096])
            });
            PtsSession::attestor(
                Arc::clone(config),
                Arc::clone(registry),
                key_agreement,
                Arc::new(measurer),
            )
        }
    };
    TnccsSession::new(
        role,
        Identity::from("tnc.example"),
        Identity::from("peer.example"),
        TransportKind::Tls,
        pts,
        &InMemoryCredentialStore::new(),
    )
    .unwrap()
}

fn bench_full_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("pts_session");
    let registry = Arc::new(AttrRegistry::standard());
    let config = (0..16)
        .fold(SessionConfig::builder(), |b, i| b.measure(format!("/lib/mod{i}.so")))
        .hash_algorithms(HashAlgo::SHA256)
        .build()
        .unwrap();
    let config = Arc::new(config);

    // Capabilities, DH nonce exchange and 16 file measurements per iteration.
    group.bench_function("loopback_16_files", |b| {
        let rt = Runtime::new().unwrap();

        b.iter(|| {
            rt.block_on(async {
                let (client_io, server_io) = tokio::io::duplex(DUPLEX_SIZE);
                let mut server = session(TnccsRole::Server, &config, &registry);
                let mut client = session(TnccsRole::Client, &config, &registry);
                let mut server_transport = StreamTransport::new(server_io, TransportKind::Tls);
                let mut client_transport = StreamTransport::new(client_io, TransportKind::Tls);

                let (server_verdict, client_verdict) = tokio::join!(
                    run_session(&mut server, &mut server_transport),
                    run_session(&mut client, &mut client_transport),
                );
                assert_eq!(server_verdict.unwrap(), Verdict::Success);
                black_box(client_verdict.unwrap());
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_full_session);
criterion_main!(benches);
