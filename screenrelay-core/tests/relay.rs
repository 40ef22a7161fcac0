//! Integration tests: the full accept, session and stream lifecycle over
//! a real TCP connection on localhost, driven by `ScriptedBackend`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use screenrelay_core::{
    CapturePolicy, ConnectionAcceptor, ListenEndpoint, RelayClient, RelayOptions, RelaySummary,
    ScriptedBackend, Shutdown, Udid,
};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const UDID: &str = "0123456789abcdef0123456789abcdef01234567";
const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────

fn options(max_consecutive_failures: u32) -> RelayOptions {
    RelayOptions {
        capture_policy: CapturePolicy {
            max_consecutive_failures,
            retry_delay: Duration::from_millis(1),
        },
        initial_buffer_bytes: 16,
        ..RelayOptions::default()
    }
}

struct Relay {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<RelaySummary>,
}

impl Relay {
    fn start(backend: &ScriptedBackend, options: RelayOptions) -> Self {
        let shutdown = Shutdown::new();
        let endpoint = ListenEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).with_backlog(4);
        let acceptor = ConnectionAcceptor::bind(
            &endpoint,
            backend.clone(),
            Udid::parse(UDID).unwrap(),
            options,
            shutdown.clone(),
        )
        .unwrap();
        let addr = acceptor.local_addr().unwrap();
        let handle = tokio::spawn(acceptor.run());
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) -> RelaySummary {
        self.shutdown.trigger();
        timeout(WAIT, self.handle)
            .await
            .expect("relay did not stop")
            .unwrap()
    }
}

async fn next_frame(client: &mut RelayClient) -> Vec<u8> {
    timeout(WAIT, client.next_frame())
        .await
        .expect("timeout")
        .expect("read error")
        .expect("stream closed")
        .to_vec()
}

/// The relay closed (or reset) the connection without sending a frame.
async fn assert_closed_without_frame(client: &mut RelayClient) {
    let result = timeout(WAIT, client.next_frame()).await.expect("timeout");
    assert!(
        !matches!(result, Ok(Some(_))),
        "expected the connection to be closed"
    );
}

// ── Streaming ────────────────────────────────────────────────────

#[tokio::test]
async fn frames_arrive_in_order() {
    let backend = ScriptedBackend::new();
    backend.push_frame(b"first".to_vec());
    backend.push_frame(Vec::new());
    backend.push_frame(vec![0x5A; 100_000]);

    let relay = Relay::start(&backend, options(0));
    let mut client = RelayClient::connect(relay.addr).await.unwrap();

    assert_eq!(next_frame(&mut client).await, b"first");
    assert_eq!(next_frame(&mut client).await, b"");
    assert_eq!(next_frame(&mut client).await, vec![0x5A; 100_000]);

    let summary = relay.stop().await;
    assert_eq!(summary.frames_sent, 3);
    assert_eq!(summary.sessions_opened, 1);

    let c = backend.counters();
    assert_eq!(c.service_closes, 1);
    assert_eq!(c.device_closes, 1);
}

#[tokio::test]
async fn small_frame_then_two_megabyte_frame() {
    let small = vec![1u8; 10];
    let large: Vec<u8> = (0..2_000_000u32).map(|i| (i % 241) as u8).collect();

    let backend = ScriptedBackend::new();
    backend.push_frame(small.clone());
    backend.push_frame(large.clone());

    let relay = Relay::start(&backend, options(0));
    let mut client = RelayClient::connect(relay.addr).await.unwrap();

    assert_eq!(next_frame(&mut client).await, small);
    assert!(next_frame(&mut client).await == large);

    relay.stop().await;
}

// ── Client lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn client_disconnect_keeps_device_session() {
    let backend = ScriptedBackend::new();
    backend.set_repeat_frame(Some(b"screen".to_vec()));
    let relay = Relay::start(&backend, options(0));

    let mut first = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut first).await, b"screen");
    drop(first);

    let mut second = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut second).await, b"screen");

    let c = backend.counters();
    assert_eq!(c.device_opens, 1);
    assert_eq!(c.service_starts, 1);
    assert_eq!(c.service_closes, 0);

    let summary = relay.stop().await;
    assert_eq!(summary.clients_served, 2);
    assert_eq!(summary.sessions_opened, 1);
}

#[tokio::test]
async fn second_client_waits_for_first() {
    let backend = ScriptedBackend::new();
    backend.set_repeat_frame(Some(b"only-one".to_vec()));
    let relay = Relay::start(&backend, options(0));

    let mut first = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut first).await, b"only-one");

    let mut second = RelayClient::connect(relay.addr).await.unwrap();
    let early = timeout(Duration::from_millis(200), second.next_frame()).await;
    assert!(early.is_err(), "second client was served concurrently");

    drop(first);
    assert_eq!(next_frame(&mut second).await, b"only-one");

    relay.stop().await;
}

// ── Device failures ──────────────────────────────────────────────

#[tokio::test]
async fn absent_device_closes_client_and_keeps_accepting() {
    let backend = ScriptedBackend::new();
    backend.set_device_present(false);
    let relay = Relay::start(&backend, options(0));

    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_closed_without_frame(&mut client).await;

    backend.set_device_present(true);
    backend.set_repeat_frame(Some(b"back".to_vec()));

    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut client).await, b"back");
    assert_eq!(backend.counters().device_opens, 1);

    relay.stop().await;
}

#[tokio::test]
async fn unavailable_service_closes_client_and_keeps_accepting() {
    let backend = ScriptedBackend::new();
    backend.set_service_available(false);
    let relay = Relay::start(&backend, options(0));

    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_closed_without_frame(&mut client).await;

    let c = backend.counters();
    assert_eq!(c.device_opens, 1);
    assert_eq!(c.device_closes, 1);

    backend.set_service_available(true);
    backend.set_repeat_frame(Some(b"mounted".to_vec()));

    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut client).await, b"mounted");

    relay.stop().await;
}

#[tokio::test]
async fn failing_session_is_reopened_for_next_client() {
    let backend = ScriptedBackend::new();
    backend.push_frame(b"before".to_vec());
    let relay = Relay::start(&backend, options(2));

    // One frame, then two failed captures end the session.
    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut client).await, b"before");
    assert_closed_without_frame(&mut client).await;

    let c = backend.counters();
    assert_eq!(c.service_closes, 1);
    assert_eq!(c.device_closes, 1);

    backend.push_frame(b"after".to_vec());
    let mut client = RelayClient::connect(relay.addr).await.unwrap();
    assert_eq!(next_frame(&mut client).await, b"after");
    assert_eq!(backend.counters().device_opens, 2);

    let summary = relay.stop().await;
    assert_eq!(summary.sessions_opened, 2);
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_while_waiting_for_client() {
    let backend = ScriptedBackend::new();
    let relay = Relay::start(&backend, options(0));
    let addr = relay.addr;

    let summary = relay.stop().await;
    assert_eq!(summary.clients_served, 0);
    assert_eq!(backend.counters().device_opens, 0);

    // The listening socket is gone.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_while_write_is_blocked() {
    let backend = ScriptedBackend::new();
    backend.set_repeat_frame(Some(vec![0xC3; 512 * 1024]));
    let relay = Relay::start(&backend, options(0));

    // Connect but never read: the relay's writes stall once the socket
    // buffers fill up.
    let client = TcpStream::connect(relay.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let summary = relay.stop().await;
    assert_eq!(summary.clients_served, 1);

    let c = backend.counters();
    assert_eq!(c.device_opens, 1);
    assert_eq!(c.service_closes, 1);
    assert_eq!(c.device_closes, 1);
    drop(client);
}
