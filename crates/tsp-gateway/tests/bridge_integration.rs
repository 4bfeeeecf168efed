//! Session bridge tests against an in-memory backend

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tsp_core::config::GatewayConfig;
use tsp_core::error::SessionError;
use tsp_core::message::{ClientEvent, ClientMessage, ClientRequest, ErrorKind};
use tsp_core::traits::{memory_channel, MemoryPeer};
use tsp_core::SessionId;
use tsp_gateway::{SessionBridge, SessionEnd};
use tsp_protocol::{Method, Packet, PacketHeader, RequestId, HEADER_SIZE};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    peer: MemoryPeer,
    backend: DuplexStream,
    cancel: CancellationToken,
    session: JoinHandle<Result<SessionEnd, SessionError>>,
}

fn start(config: GatewayConfig) -> Harness {
    let (channel, peer) = memory_channel(16);
    let (gateway_side, backend) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();

    let bridge = SessionBridge::new(SessionId::new(1), channel, Arc::new(config), cancel.clone());
    let session = tokio::spawn(bridge.run_with_backend(gateway_side));

    Harness {
        peer,
        backend,
        cancel,
        session,
    }
}

fn id(n: u8) -> RequestId {
    RequestId::from_bytes([n; 16])
}

fn request(request_id: RequestId, payload: &'static [u8]) -> ClientMessage {
    ClientMessage::Request(ClientRequest {
        request_id,
        method: Method::new(2).unwrap(),
        resource: 7,
        payload: Bytes::from_static(payload),
    })
}

async fn next_event(peer: &mut MemoryPeer) -> ClientEvent {
    tokio::time::timeout(TIMEOUT, peer.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("session closed the channel")
}

/// Read one request packet the gateway wrote to the backend
async fn read_packet(backend: &mut DuplexStream) -> (PacketHeader, Vec<u8>) {
    let mut header = [0u8; HEADER_SIZE];
    tokio::time::timeout(TIMEOUT, backend.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    let header = PacketHeader::decode(&header).unwrap();

    let mut payload = vec![0u8; header.payload_length as usize];
    backend.read_exact(&mut payload).await.unwrap();
    (header, payload)
}

fn wire(packets: &[Packet]) -> BytesMut {
    let mut buf = BytesMut::new();
    for packet in packets {
        packet.encode(&mut buf);
    }
    buf
}

#[tokio::test]
async fn test_request_response_roundtrip() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(request(id(1), b"\xDE\xAD")).await.unwrap();

    let (header, payload) = read_packet(&mut h.backend).await;
    assert_eq!(header.request_id, id(1));
    assert_eq!(header.method.as_u8(), 2);
    assert_eq!(header.resource, 7);
    assert_eq!(header.sequence, 0);
    assert_eq!(header.total_sequences, 1);
    assert_eq!(payload, vec![0xDE, 0xAD]);

    let method = Method::new(2).unwrap();
    let response = wire(&[Packet::new(id(1), method, 7, 0, 1, &b"\xBE\xEF"[..]).unwrap()]);
    h.backend.write_all(&response).await.unwrap();

    match next_event(&mut h.peer).await {
        ClientEvent::Response(resp) => {
            assert_eq!(resp.request_id, id(1));
            assert_eq!(resp.resource, 7);
            assert_eq!(&resp.payload[..], &[0xBE, 0xEF]);
        }
        other => panic!("Expected Response, got {:?}", other),
    }

    drop(h.peer);
    let end = h.session.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::ClientDisconnected);
}

#[tokio::test]
async fn test_multi_packet_response_split_across_writes() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(request(id(3), b"")).await.unwrap();
    read_packet(&mut h.backend).await;

    let method = Method::new(4).unwrap();
    let bytes = wire(&[
        Packet::new(id(3), method, 9, 0, 2, &b"AB"[..]).unwrap(),
        Packet::new(id(3), method, 9, 1, 2, &b"CD"[..]).unwrap(),
    ]);

    // Cut inside the first header, then inside the second payload
    for chunk in [&bytes[..15], &bytes[15..59], &bytes[59..]] {
        h.backend.write_all(chunk).await.unwrap();
        h.backend.flush().await.unwrap();
        tokio::task::yield_now().await;
    }

    match next_event(&mut h.peer).await {
        ClientEvent::Response(resp) => {
            assert_eq!(resp.request_id, id(3));
            assert_eq!(resp.method.as_u8(), 4);
            assert_eq!(&resp.payload[..], b"ABCD");
        }
        other => panic!("Expected Response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_interleaved_responses() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(request(id(1), b"one")).await.unwrap();
    h.peer.send(request(id(2), b"two")).await.unwrap();
    read_packet(&mut h.backend).await;
    read_packet(&mut h.backend).await;

    let method = Method::new(2).unwrap();
    let bytes = wire(&[
        Packet::new(id(1), method, 7, 0, 2, &b"1a"[..]).unwrap(),
        Packet::new(id(2), method, 7, 0, 1, &b"2a"[..]).unwrap(),
        Packet::new(id(1), method, 7, 1, 2, &b"1b"[..]).unwrap(),
    ]);
    h.backend.write_all(&bytes).await.unwrap();

    let first = next_event(&mut h.peer).await;
    let second = next_event(&mut h.peer).await;

    match (first, second) {
        (ClientEvent::Response(a), ClientEvent::Response(b)) => {
            assert_eq!(a.request_id, id(2));
            assert_eq!(&a.payload[..], b"2a");
            assert_eq!(b.request_id, id(1));
            assert_eq!(&b.payload[..], b"1a1b");
        }
        other => panic!("Expected two responses, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_request_id_is_skipped() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(request(id(1), b"x")).await.unwrap();
    read_packet(&mut h.backend).await;

    let method = Method::new(2).unwrap();
    let bytes = wire(&[
        Packet::new(id(9), method, 7, 0, 1, &b"stray"[..]).unwrap(),
        Packet::new(id(1), method, 7, 0, 1, &b"ok"[..]).unwrap(),
    ]);
    h.backend.write_all(&bytes).await.unwrap();

    match next_event(&mut h.peer).await {
        ClientEvent::Response(resp) => assert_eq!(resp.request_id, id(1)),
        other => panic!("Expected Response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ping_pong() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(ClientMessage::Ping).await.unwrap();
    assert_eq!(next_event(&mut h.peer).await, ClientEvent::Pong);
}

#[tokio::test]
async fn test_invalid_message_keeps_session_open() {
    let mut h = start(GatewayConfig::default());

    h.peer.send_invalid("expected value at line 1").await.unwrap();
    match next_event(&mut h.peer).await {
        ClientEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::InvalidMessage),
        other => panic!("Expected Error, got {:?}", other),
    }

    h.peer.send(ClientMessage::Ping).await.unwrap();
    assert_eq!(next_event(&mut h.peer).await, ClientEvent::Pong);
}

#[tokio::test]
async fn test_oversized_request_rejected() {
    let config = GatewayConfig {
        max_payload_size: 4,
        ..GatewayConfig::default()
    };
    let mut h = start(config);

    h.peer.send(request(id(5), b"too long")).await.unwrap();
    match next_event(&mut h.peer).await {
        ClientEvent::Error {
            request_id, kind, ..
        } => {
            assert_eq!(request_id, Some(id(5)));
            assert_eq!(kind, ErrorKind::InvalidMessage);
        }
        other => panic!("Expected Error, got {:?}", other),
    }

    // Nothing reached the backend and the session is still alive
    h.peer.send(request(id(6), b"ok")).await.unwrap();
    let (header, _) = read_packet(&mut h.backend).await;
    assert_eq!(header.request_id, id(6));
}

#[tokio::test]
async fn test_backend_close_ends_session() {
    let mut h = start(GatewayConfig::default());

    drop(h.backend);

    match next_event(&mut h.peer).await {
        ClientEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::BackendClosed),
        other => panic!("Expected Error, got {:?}", other),
    }

    let end = h.session.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::BackendClosed);
}

#[tokio::test]
async fn test_malformed_stream_ends_session() {
    let mut h = start(GatewayConfig::default());

    h.backend.write_all(&[0x7F; HEADER_SIZE]).await.unwrap();

    match next_event(&mut h.peer).await {
        ClientEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::MalformedStream),
        other => panic!("Expected Error, got {:?}", other),
    }

    let result = h.session.await.unwrap();
    assert!(matches!(result, Err(SessionError::Protocol(_))));
}

#[tokio::test]
async fn test_response_before_corrupt_header_is_delivered() {
    let mut h = start(GatewayConfig::default());

    h.peer.send(request(id(1), b"x")).await.unwrap();
    read_packet(&mut h.backend).await;

    let method = Method::new(2).unwrap();
    let mut bytes = wire(&[Packet::new(id(1), method, 7, 0, 1, &b"ok"[..]).unwrap()]);
    bytes.extend_from_slice(&[0x7F; HEADER_SIZE]);
    h.backend.write_all(&bytes).await.unwrap();

    match next_event(&mut h.peer).await {
        ClientEvent::Response(resp) => {
            assert_eq!(resp.request_id, id(1));
            assert_eq!(&resp.payload[..], b"ok");
        }
        other => panic!("Expected Response, got {:?}", other),
    }

    match next_event(&mut h.peer).await {
        ClientEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::MalformedStream),
        other => panic!("Expected Error, got {:?}", other),
    }

    let result = h.session.await.unwrap();
    assert!(matches!(result, Err(SessionError::Protocol(_))));
}

#[tokio::test]
async fn test_shutdown_ends_session() {
    let h = start(GatewayConfig::default());

    h.cancel.cancel();

    let end = tokio::time::timeout(TIMEOUT, h.session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(end, SessionEnd::Shutdown);
}

#[tokio::test]
async fn test_backend_unavailable() {
    // Bind then drop to find a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = GatewayConfig::default();
    config.backend.host = "127.0.0.1".to_string();
    config.backend.port = port;

    let (channel, mut peer) = memory_channel(4);
    let bridge = SessionBridge::new(
        SessionId::new(1),
        channel,
        Arc::new(config),
        CancellationToken::new(),
    );

    let result = bridge.run().await;
    assert!(matches!(result, Err(SessionError::BackendUnavailable { .. })));

    match next_event(&mut peer).await {
        ClientEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::BackendUnavailable),
        other => panic!("Expected Error, got {:?}", other),
    }
}
