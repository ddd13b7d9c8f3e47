//! End-to-end tests driving a client connection against a scripted world
//! model over an in-memory duplex stream.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use grail_client::codec::wire;
use grail_client::protocol::control::{client as codes, CLIENT_PROTOCOL, WORLD_MODEL_PROTOCOL};
use grail_client::transport::{handshake_bytes, read_frame, write_frame};
use grail_client::{
    Attribute, ClientWorldConnection, DataBundle, GrailError, RequestError, SolverWorldModel,
};

/// Accept the client side of the version handshake.
async fn accept_client(server: &mut DuplexStream) {
    let shake = handshake_bytes(CLIENT_PROTOCOL);
    let mut received = vec![0u8; shake.len()];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(received, shake);
    server.write_all(&shake).await.unwrap();
    server.flush().await.unwrap();
}

/// Open a connected client with its scripted server half.
async fn connected_pair() -> (ClientWorldConnection, DuplexStream) {
    let (client_io, mut server) = duplex(64 * 1024);
    let (connection, ()) = tokio::join!(ClientWorldConnection::from_stream(client_io), async {
        accept_client(&mut server).await;
    });
    let connection = connection.unwrap();
    assert!(connection.is_connected());
    (connection, server)
}

fn attribute_alias_payload(pairs: &[(u32, &str)]) -> Vec<u8> {
    alias_payload(codes::ATTRIBUTE_ALIAS, pairs)
}

fn origin_alias_payload(pairs: &[(u32, &str)]) -> Vec<u8> {
    alias_payload(codes::ORIGIN_ALIAS, pairs)
}

fn alias_payload(code: u8, pairs: &[(u32, &str)]) -> Vec<u8> {
    let mut payload = vec![code];
    wire::put_u32(&mut payload, pairs.len() as u32);
    for (alias, name) in pairs {
        wire::put_u32(&mut payload, *alias);
        wire::put_sized_str(&mut payload, name).unwrap();
    }
    payload
}

/// A data response with one attribute: name alias 3, origin alias 1.
fn data_payload(uri: &str, ticket: u32, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![codes::DATA_RESPONSE];
    wire::put_sized_str(&mut payload, uri).unwrap();
    wire::put_u32(&mut payload, ticket);
    wire::put_u32(&mut payload, 1);
    wire::put_u32(&mut payload, 3);
    wire::put_u64(&mut payload, 12_000);
    wire::put_u64(&mut payload, 0);
    wire::put_u32(&mut payload, 1);
    wire::put_u32(&mut payload, data.len() as u32);
    payload.extend_from_slice(data);
    payload
}

fn complete_payload(ticket: u32) -> Vec<u8> {
    let mut payload = vec![codes::REQUEST_COMPLETE];
    wire::put_u32(&mut payload, ticket);
    payload
}

fn uri_response_payload(names: &[&str]) -> Vec<u8> {
    let mut payload = vec![codes::URI_RESPONSE];
    for name in names {
        wire::put_sized_str(&mut payload, name).unwrap();
    }
    payload
}

/// Send the alias announcements the data frames in these tests rely on.
async fn announce_aliases(server: &mut DuplexStream) {
    write_frame(server, &attribute_alias_payload(&[(3, "location.gps")]))
        .await
        .unwrap();
    write_frame(server, &origin_alias_payload(&[(1, "solver.gps")]))
        .await
        .unwrap();
}

/// Poll a condition until it holds or a second passes.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached within one second");
}

/// Scenario: snapshot answered by one data frame and a completion frame.
/// `get()` returns the slot once; a second `get()` fails.
#[tokio::test]
async fn test_snapshot_round_trip() {
    let (connection, mut server) = connected_pair().await;

    let response = connection.snapshot_request("a", &[], 0, 0).unwrap();

    let request = read_frame(&mut server).await.unwrap();
    assert_eq!(request.control, codes::SNAPSHOT_REQUEST);

    announce_aliases(&mut server).await;
    write_frame(&mut server, &data_payload("a", response.ticket(), b"\x2A"))
        .await
        .unwrap();
    write_frame(&mut server, &complete_payload(response.ticket()))
        .await
        .unwrap();

    let slot = response.get().await.unwrap();
    assert_eq!(slot.len(), 1);
    let attributes = &slot["a"];
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].name, "location.gps");
    assert_eq!(attributes[0].origin, "solver.gps");
    assert_eq!(attributes[0].creation, 12_000);
    assert_eq!(&attributes[0].data[..], b"\x2A");

    // The one result has been handed out.
    assert!(matches!(
        response.get().await,
        Err(GrailError::NoData(_))
    ));
}

/// Scenario: a stream buffers steps ahead of the consumer and stays
/// incomplete until the terminal marker arrives.
#[tokio::test]
async fn test_stream_buffers_steps_in_order() {
    let (connection, mut server) = connected_pair().await;

    let stream = connection.stream_request("cart.*", &[], 500).unwrap();
    let request = read_frame(&mut server).await.unwrap();
    assert_eq!(request.control, codes::STREAM_REQUEST);

    announce_aliases(&mut server).await;
    for uri in ["one", "two", "three"] {
        write_frame(&mut server, &data_payload(uri, stream.ticket(), b"x"))
            .await
            .unwrap();
    }

    wait_until(|| stream.has_next()).await;
    assert!(!stream.is_complete());

    for expected in ["one", "two", "three"] {
        let slot = stream.next().await.unwrap();
        assert_eq!(slot.len(), 1);
        assert!(slot.contains_key(expected));
    }
    assert!(!stream.is_complete());

    write_frame(&mut server, &complete_payload(stream.ticket()))
        .await
        .unwrap();
    wait_until(|| stream.is_complete()).await;
}

/// Scenario: URI searches carry no wire ticket; two outstanding searches
/// resolve strictly in issue order.
#[tokio::test]
async fn test_uri_search_correlation_order() {
    let (connection, mut server) = connected_pair().await;

    let first = connection.uri_search("x|y").unwrap();
    let second = connection.uri_search("z").unwrap();

    // Neither request carries a ticket on the wire.
    for _ in 0..2 {
        let request = read_frame(&mut server).await.unwrap();
        assert_eq!(request.control, codes::URI_SEARCH);
    }

    write_frame(&mut server, &uri_response_payload(&["x", "y"]))
        .await
        .unwrap();
    write_frame(&mut server, &uri_response_payload(&["z"]))
        .await
        .unwrap();

    let slot = first.get().await.unwrap();
    assert_eq!(slot.len(), 2);
    assert!(slot.contains_key("x") && slot.contains_key("y"));
    assert!(slot["x"].is_empty());

    let slot = second.get().await.unwrap();
    assert_eq!(slot.len(), 1);
    assert!(slot.contains_key("z"));
}

/// Scenario: cancelling a stream completes it locally; a late data frame
/// for the cancelled ticket is dropped without resurrecting its state.
#[tokio::test]
async fn test_cancel_then_late_frame() {
    let (connection, mut server) = connected_pair().await;

    let stream = connection.stream_request(".*", &[], 100).unwrap();
    let request = read_frame(&mut server).await.unwrap();
    assert_eq!(request.control, codes::STREAM_REQUEST);

    stream.cancel();
    let cancel = read_frame(&mut server).await.unwrap();
    assert_eq!(cancel.control, codes::CANCEL_REQUEST);
    assert!(stream.is_complete());

    // The server had already queued more data.
    announce_aliases(&mut server).await;
    write_frame(&mut server, &data_payload("late", stream.ticket(), b"x"))
        .await
        .unwrap();

    // Drain the cancelled stream: one empty slot, then no data.
    let slot = stream.next().await.unwrap();
    assert!(slot.is_empty());
    assert!(matches!(stream.next().await, Err(GrailError::NoData(_))));

    // The connection itself is still healthy.
    let probe = connection.uri_search("a").unwrap();
    let request = read_frame(&mut server).await.unwrap();
    assert_eq!(request.control, codes::URI_SEARCH);
    write_frame(&mut server, &uri_response_payload(&["a.1"]))
        .await
        .unwrap();
    assert!(probe.get().await.unwrap().contains_key("a.1"));
}

/// A dead transport unblocks every pending request with a transport error
/// instead of hanging.
#[tokio::test]
async fn test_transport_death_unblocks_waiters() {
    let (connection, mut server) = connected_pair().await;

    let snapshot = connection.snapshot_request("a", &[], 0, 0).unwrap();
    let stream = connection.stream_request("b", &[], 100).unwrap();
    read_frame(&mut server).await.unwrap();
    read_frame(&mut server).await.unwrap();

    drop(server);

    let err = snapshot.get().await.unwrap_err();
    assert!(matches!(
        err,
        GrailError::Request(RequestError::Transport(_))
    ));
    let err = stream.next().await.unwrap_err();
    assert!(matches!(
        err,
        GrailError::Request(RequestError::Transport(_))
    ));

    wait_until(|| !connection.is_connected()).await;
    assert!(stream.is_error());
}

/// A handshake mismatch marks the connection unusable without tearing the
/// socket down.
#[tokio::test]
async fn test_handshake_mismatch_leaves_connection_unusable() {
    let (client_io, mut server) = duplex(4096);

    let server_task = tokio::spawn(async move {
        let shake = handshake_bytes(CLIENT_PROTOCOL);
        let mut received = vec![0u8; shake.len()];
        server.read_exact(&mut received).await.unwrap();

        let mut reply = shake.clone();
        reply[6] ^= 0xFF;
        server.write_all(&reply).await.unwrap();
        server.flush().await.unwrap();
        server
    });

    let connection = ClientWorldConnection::from_stream(client_io).await.unwrap();
    assert!(!connection.is_connected());
    assert!(matches!(
        connection.snapshot_request("a", &[], 0, 0),
        Err(GrailError::NotConnected)
    ));

    // The socket was not torn down by the client.
    let server = server_task.await.unwrap();
    drop(server);
}

/// Solver push path: new attribute names are announced before the data
/// frame that uses their aliases.
#[tokio::test]
async fn test_solver_push_announces_types_first() {
    let (client_io, mut server) = duplex(64 * 1024);

    let accept = async {
        let shake = handshake_bytes(WORLD_MODEL_PROTOCOL);
        let mut received = vec![0u8; shake.len()];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(received, shake);
        server.write_all(&shake).await.unwrap();
        server.flush().await.unwrap();
    };
    let (solver, ()) = tokio::join!(
        SolverWorldModel::from_stream(client_io, "solver.demo"),
        accept
    );
    let mut solver = solver.unwrap();

    let bundle = DataBundle::new(
        "cart.1",
        vec![Attribute::new("position", Bytes::from_static(&[7]), 42, 0, "")],
        0,
    );
    let bundles = [bundle];
    let (pushed, frames) = tokio::join!(solver.push_data(&bundles, true), async {
        let announce = read_frame(&mut server).await.unwrap();
        let data = read_frame(&mut server).await.unwrap();
        (announce, data)
    });
    pushed.unwrap();

    let (announce, data) = frames;
    assert_eq!(
        announce.control,
        grail_client::protocol::control::solver::TYPE_ANNOUNCE
    );
    let mut reader = wire::WireReader::new(&announce.body);
    assert_eq!(reader.u32("count").unwrap(), 1);
    assert_eq!(reader.u32("alias").unwrap(), 0);
    assert_eq!(reader.sized_str().unwrap(), "position");

    assert_eq!(
        data.control,
        grail_client::protocol::control::solver::SOLVER_DATA
    );
    let mut reader = wire::WireReader::new(&data.body);
    assert_eq!(reader.u8("create flag").unwrap(), 1);
    assert_eq!(reader.u32("total").unwrap(), 1);
    assert_eq!(reader.u32("alias").unwrap(), 0);
    assert_eq!(reader.u64("creation").unwrap(), 42);
    assert_eq!(reader.sized_str().unwrap(), "cart.1");
    assert_eq!(reader.u32("data len").unwrap(), 1);

    // Entity lifecycle messages carry the URI, a timestamp where the
    // operation has one, and the solver's origin string.
    let (created, frame) = tokio::join!(solver.create_uri("cart.2", 1_000), async {
        read_frame(&mut server).await.unwrap()
    });
    created.unwrap();
    assert_eq!(
        frame.control,
        grail_client::protocol::control::solver::CREATE_URI
    );
    let mut reader = wire::WireReader::new(&frame.body);
    assert_eq!(reader.sized_str().unwrap(), "cart.2");
    assert_eq!(reader.u64("creation").unwrap(), 1_000);

    let (expired, frame) = tokio::join!(solver.expire_uri("cart.2", 2_000), async {
        read_frame(&mut server).await.unwrap()
    });
    expired.unwrap();
    assert_eq!(
        frame.control,
        grail_client::protocol::control::solver::EXPIRE_URI
    );

    let (deleted, frame) = tokio::join!(solver.delete_uri("cart.2"), async {
        read_frame(&mut server).await.unwrap()
    });
    deleted.unwrap();
    assert_eq!(
        frame.control,
        grail_client::protocol::control::solver::DELETE_URI
    );
    let mut reader = wire::WireReader::new(&frame.body);
    assert_eq!(reader.sized_str().unwrap(), "cart.2");
    // The remainder is the unsized widened origin string.
    assert_eq!(
        wire::decode_widened(reader.rest()).unwrap(),
        "solver.demo"
    );
}
