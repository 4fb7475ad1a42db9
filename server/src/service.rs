//! Per-connection dispatch loop: decode a request, apply it to the
//! session, answer with exactly one `ACK`/`NACK`, possibly notify a peer.

use std::sync::Arc;

use game_core::{Game, Role};
use protocol::{client, Packet};
use tokio::net::TcpStream;

use crate::client_registry::ClientRegistry;
use crate::error::OperationError;
use crate::session::ClientSession;

pub async fn handle_connection<G: Game + 'static>(stream: TcpStream, registry: Arc<ClientRegistry<G>>) {
    let peer = stream.peer_addr().ok();
    let (mut read_half, write_half) = stream.into_split();

    let session = match registry.register(write_half).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(?peer, %err, "rejecting connection");
            return;
        }
    };
    tracing::info!(session_id = session.id, ?peer, "connection accepted");

    let cancellation = session.cancellation().clone();
    loop {
        let packet = tokio::select! {
            biased;
            _ = cancellation.cancelled() => None,
            result = protocol::read_packet(&mut read_half) => match result {
                Ok(Some(packet)) => Some(packet),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(session_id = session.id, %err, "connection read failed");
                    None
                }
            },
        };

        let Some(packet) = packet else {
            break;
        };

        if dispatch(&session, &registry, packet).await.is_err() {
            tracing::debug!(session_id = session.id, "write failed, treating as remote closure");
            break;
        }
    }

    if session.current_player().await.is_some() {
        if let Err(err) = session.logout().await {
            tracing::error!(session_id = session.id, %err, "logout during teardown failed");
        }
    }
    registry.unregister(session.id).await;
    tracing::info!(session_id = session.id, "connection closed");
}

/// Dispatches one request and answers it. Returns `Err` iff the reply write
/// itself failed — a write failure is treated as remote closure (spec §7),
/// so the caller must break its read loop instead of attempting another
/// read on a connection that just failed to write.
async fn dispatch<G: Game + 'static>(
    session: &Arc<ClientSession<G>>,
    registry: &Arc<ClientRegistry<G>>,
    packet: Packet,
) -> Result<(), protocol::CodecError> {
    let header = packet.header;
    let logged_in = session.current_player().await.is_some();
    let is_login = header.packet_type == client::LOGIN;

    if (!logged_in && !is_login) || (logged_in && is_login) {
        return session.send_nack().await.inspect_err(|err| {
            tracing::debug!(session_id = session.id, %err, "failed to send nack");
        });
    }

    let outcome: Result<(u8, Vec<u8>), OperationError> = match header.packet_type {
        client::LOGIN => {
            let name = String::from_utf8_lossy(&packet.payload).into_owned();
            session.login(&name).await.map(|_| (0, Vec::new()))
        }
        client::USERS => {
            let mut payload = String::new();
            for (name, rating) in registry.all_players().await {
                payload.push_str(&name);
                payload.push('\t');
                payload.push_str(&rating.to_string());
                payload.push('\n');
            }
            Ok((0, payload.into_bytes()))
        }
        client::INVITE => handle_invite(session, registry, header.role, &packet.payload).await,
        client::REVOKE => session.revoke_invitation(header.id).await.map(|_| (0, Vec::new())),
        client::DECLINE => session.decline_invitation(header.id).await.map(|_| (0, Vec::new())),
        client::ACCEPT => session
            .accept_invitation(header.id)
            .await
            .map(|state| (0, state.map(String::into_bytes).unwrap_or_default())),
        client::MOVE => {
            let move_text = String::from_utf8_lossy(&packet.payload).into_owned();
            session.make_move(header.id, &move_text).await.map(|_| (0, Vec::new()))
        }
        client::RESIGN => session.resign_game(header.id).await.map(|_| (0, Vec::new())),
        other => Err(OperationError::MalformedPayload(format!(
            "unknown packet type {other}"
        ))),
    };

    match outcome {
        Ok((id, payload)) => session.send_ack(id, &payload).await.inspect_err(|err| {
            tracing::debug!(session_id = session.id, %err, "failed to send ack");
        }),
        Err(err) => {
            tracing::debug!(session_id = session.id, %err, "operation failed");
            session.send_nack().await.inspect_err(|send_err| {
                tracing::debug!(session_id = session.id, %send_err, "failed to send nack");
            })
        }
    }
}

async fn handle_invite<G: Game + 'static>(
    session: &Arc<ClientSession<G>>,
    registry: &Arc<ClientRegistry<G>>,
    role_byte: u8,
    payload: &[u8],
) -> Result<(u8, Vec<u8>), OperationError> {
    let target_role = Role::from_wire(role_byte).ok_or(OperationError::InvalidRole)?;
    let name = std::str::from_utf8(payload)
        .map_err(|_| OperationError::MalformedPayload("invite target username is not utf8".into()))?;
    let target = registry
        .find_by_username(name)
        .await
        .ok_or(OperationError::TargetNotFound)?;
    let source_idx = session.make_invitation(&target, target_role).await?;
    Ok((source_idx, Vec::new()))
}
