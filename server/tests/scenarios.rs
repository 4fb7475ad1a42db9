//! Black-box coverage of the server over a real loopback socket: every
//! request and response is a genuine framed packet, not a call into
//! library internals.

use std::time::Duration;

use game_core::Role;
use protocol::{client, read_packet, role, server as server_pt, write_packet, Packet, PacketHeader};
use tic_tac_toe::TicTacToe;
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server() -> std::net::SocketAddr {
    spawn_server_with_registry().await.0
}

async fn spawn_server_with_registry(
) -> (std::net::SocketAddr, std::sync::Arc<server::client_registry::ClientRegistry<TicTacToe>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = server::new_registry::<TicTacToe>();

    let accept_registry = registry.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let registry = accept_registry.clone();
            tokio::spawn(server::service::handle_connection(stream, registry));
        }
    });

    (addr, registry)
}

async fn send(stream: &mut TcpStream, packet_type: u8, id: u8, wire_role: u8, payload: &[u8]) {
    let header = PacketHeader::new(packet_type, id, wire_role, payload.len() as u16, 0, 0);
    write_packet(stream, &header, payload).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> Packet {
    read_packet(stream).await.unwrap().expect("peer closed before a frame arrived")
}

async fn login(stream: &mut TcpStream, name: &str) {
    send(stream, client::LOGIN, 0, role::NULL, name.as_bytes()).await;
    let reply = recv(stream).await;
    assert_eq!(reply.header.packet_type, server_pt::ACK, "login({name}) failed");
}

#[tokio::test]
async fn login_uniqueness_and_rating_preserved_across_reconnect() {
    let addr = spawn_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;

    let mut b = TcpStream::connect(addr).await.unwrap();
    send(&mut b, client::LOGIN, 0, role::NULL, b"alice").await;
    let reply = recv(&mut b).await;
    assert_eq!(reply.header.packet_type, server_pt::NACK);

    drop(a);
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(&mut b, client::LOGIN, 0, role::NULL, b"alice").await;
    let reply = recv(&mut b).await;
    assert_eq!(reply.header.packet_type, server_pt::ACK);
}

#[tokio::test]
async fn invite_accept_move_to_a_draw() {
    let addr = spawn_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;
    let mut b = TcpStream::connect(addr).await.unwrap();
    login(&mut b, "bob").await;

    // A invites B as FIRST_PLAYER, so B moves first and A is second.
    send(&mut a, client::INVITE, 0, Role::First.to_wire(), b"bob").await;
    let ack = recv(&mut a).await;
    assert_eq!(ack.header.packet_type, server_pt::ACK);
    let source_id = ack.header.id;

    let invited = recv(&mut b).await;
    assert_eq!(invited.header.packet_type, server_pt::INVITED);
    assert_eq!(invited.header.role, Role::First.to_wire());
    let target_id = invited.header.id;

    send(&mut b, client::ACCEPT, target_id, role::NULL, &[]).await;
    let ack = recv(&mut b).await;
    assert_eq!(ack.header.packet_type, server_pt::ACK);
    assert!(!ack.payload.is_empty(), "B moves first, ACK carries the initial state");

    let accepted = recv(&mut a).await;
    assert_eq!(accepted.header.packet_type, server_pt::ACCEPTED);
    assert!(accepted.payload.is_empty(), "A moves second, ACCEPTED carries no state");

    // B is first (role 1), A is second (role 2); alternate to a draw.
    let moves = [
        (&mut b, target_id, "1"),
        (&mut a, source_id, "2"),
        (&mut b, target_id, "3"),
        (&mut a, source_id, "5"),
        (&mut b, target_id, "4"),
        (&mut a, source_id, "6"),
        (&mut b, target_id, "8"),
        (&mut a, source_id, "7"),
        (&mut b, target_id, "9"),
    ];

    for (idx, (_, id, mv)) in moves.iter().enumerate() {
        let stream: &mut TcpStream = if idx % 2 == 0 { &mut b } else { &mut a };
        send(stream, client::MOVE, *id, role::NULL, mv.as_bytes()).await;
        let ack = recv(stream).await;
        assert_eq!(ack.header.packet_type, server_pt::ACK, "move {mv} rejected");

        let opponent: &mut TcpStream = if idx % 2 == 0 { &mut a } else { &mut b };
        let moved = recv(opponent).await;
        assert_eq!(moved.header.packet_type, server_pt::MOVED);

        if idx == moves.len() - 1 {
            let ended = recv(stream).await;
            assert_eq!(ended.header.packet_type, server_pt::ENDED);
            assert_eq!(ended.header.role, 0, "draw encodes as role 0");
            let ended_opponent = recv(opponent).await;
            assert_eq!(ended_opponent.header.packet_type, server_pt::ENDED);
            assert_eq!(ended_opponent.header.role, 0);
        }
    }
}

#[tokio::test]
async fn invite_accept_source_wins_updates_elo() {
    let addr = spawn_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;
    let mut b = TcpStream::connect(addr).await.unwrap();
    login(&mut b, "bob").await;

    // A invites B as SECOND_PLAYER, so A (source) is FIRST and moves first.
    send(&mut a, client::INVITE, 0, Role::Second.to_wire(), b"bob").await;
    let ack = recv(&mut a).await;
    let source_id = ack.header.id;
    let invited = recv(&mut b).await;
    let target_id = invited.header.id;

    send(&mut b, client::ACCEPT, target_id, role::NULL, &[]).await;
    let ack = recv(&mut b).await;
    assert!(ack.payload.is_empty(), "B is second, ACK carries no state");
    let accepted = recv(&mut a).await;
    assert!(!accepted.payload.is_empty(), "A is first, ACCEPTED carries the initial state");

    // A (first) takes the top row: 1, 2, 3. B fills in between.
    let sequence = [
        (&mut a, source_id, "1"),
        (&mut b, target_id, "4"),
        (&mut a, source_id, "2"),
        (&mut b, target_id, "5"),
        (&mut a, source_id, "3"),
    ];
    for (idx, (_, id, mv)) in sequence.iter().enumerate() {
        let stream: &mut TcpStream = if idx % 2 == 0 { &mut a } else { &mut b };
        send(stream, client::MOVE, *id, role::NULL, mv.as_bytes()).await;
        let ack = recv(stream).await;
        assert_eq!(ack.header.packet_type, server_pt::ACK);
        let opponent: &mut TcpStream = if idx % 2 == 0 { &mut b } else { &mut a };
        let moved = recv(opponent).await;
        assert_eq!(moved.header.packet_type, server_pt::MOVED);
    }

    let ended_a = recv(&mut a).await;
    assert_eq!(ended_a.header.packet_type, server_pt::ENDED);
    assert_eq!(ended_a.header.role, Role::First.to_wire());
    let ended_b = recv(&mut b).await;
    assert_eq!(ended_b.header.packet_type, server_pt::ENDED);
    assert_eq!(ended_b.header.role, Role::First.to_wire());
}

#[tokio::test]
async fn revoke_then_repeat_revoke_nacks() {
    let addr = spawn_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;
    let mut b = TcpStream::connect(addr).await.unwrap();
    login(&mut b, "bob").await;

    send(&mut a, client::INVITE, 0, Role::Second.to_wire(), b"bob").await;
    let ack = recv(&mut a).await;
    let source_id = ack.header.id;
    let invited = recv(&mut b).await;
    let target_id = invited.header.id;

    send(&mut a, client::REVOKE, source_id, role::NULL, &[]).await;
    let ack = recv(&mut a).await;
    assert_eq!(ack.header.packet_type, server_pt::ACK);

    let revoked = recv(&mut b).await;
    assert_eq!(revoked.header.packet_type, server_pt::REVOKED);
    assert_eq!(revoked.header.id, target_id);

    send(&mut a, client::REVOKE, source_id, role::NULL, &[]).await;
    let nack = recv(&mut a).await;
    assert_eq!(nack.header.packet_type, server_pt::NACK);
}

#[tokio::test]
async fn disconnect_cascades_through_invitations_and_a_game_in_progress() {
    let addr = spawn_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;
    let mut b = TcpStream::connect(addr).await.unwrap();
    login(&mut b, "bob").await;
    let mut c = TcpStream::connect(addr).await.unwrap();
    login(&mut c, "carol").await;
    let mut d = TcpStream::connect(addr).await.unwrap();
    login(&mut d, "dave").await;

    // A invites B (stays OPEN).
    send(&mut a, client::INVITE, 0, Role::Second.to_wire(), b"bob").await;
    let _ = recv(&mut a).await;
    let b_invited = recv(&mut b).await;

    // C invites A (stays OPEN).
    send(&mut c, client::INVITE, 0, Role::Second.to_wire(), b"alice").await;
    let _ = recv(&mut c).await;
    let a_invited_by_c = recv(&mut a).await;

    // D invites A, A accepts -> ACCEPTED with a game in progress.
    send(&mut d, client::INVITE, 0, Role::Second.to_wire(), b"alice").await;
    let d_ack = recv(&mut d).await;
    let d_source_id = d_ack.header.id;
    let a_invited_by_d = recv(&mut a).await;
    let a_id_for_d = a_invited_by_d.header.id;

    send(&mut a, client::ACCEPT, a_id_for_d, role::NULL, &[]).await;
    let _ = recv(&mut a).await;
    let _ = recv(&mut d).await; // ACCEPTED

    drop(a);

    let revoked = recv(&mut b).await;
    assert_eq!(revoked.header.packet_type, server_pt::REVOKED);
    assert_eq!(revoked.header.id, b_invited.header.id);

    let declined = recv(&mut c).await;
    assert_eq!(declined.header.packet_type, server_pt::DECLINED);
    assert_eq!(declined.header.id, a_invited_by_c.header.id);

    let resigned = recv(&mut d).await;
    assert_eq!(resigned.header.packet_type, server_pt::RESIGNED);
    assert_eq!(resigned.header.id, d_source_id);

    let ended = recv(&mut d).await;
    assert_eq!(ended.header.packet_type, server_pt::ENDED);
    assert_eq!(
        ended.header.role,
        Role::First.to_wire(),
        "dave is the invite's source (role FIRST) and wins by alice's resignation"
    );
}

#[tokio::test]
async fn shutdown_barrier_releases_once_every_connection_drains() {
    let (addr, registry) = spawn_server_with_registry().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    login(&mut a, "alice").await;
    let mut b = TcpStream::connect(addr).await.unwrap();
    login(&mut b, "bob").await;

    // A second waiter joins the barrier concurrently with the one below;
    // both must release together once the registry empties.
    let other_waiter = tokio::spawn({
        let registry = registry.clone();
        async move {
            registry.wait_for_empty().await;
        }
    });

    registry.shutdown_all();

    tokio::time::timeout(Duration::from_secs(5), registry.wait_for_empty())
        .await
        .expect("wait_for_empty must resolve once every session unregisters");
    tokio::time::timeout(Duration::from_secs(5), other_waiter)
        .await
        .expect("concurrent waiter must also release")
        .unwrap();

    // Both connections observe the cancelled read as a clean EOF.
    assert!(read_packet_eof(&mut a).await);
    assert!(read_packet_eof(&mut b).await);
}

async fn read_packet_eof(stream: &mut TcpStream) -> bool {
    read_packet(stream).await.unwrap().is_none()
}
