//! Per-connection state: login, local invitation list, outbound send
//! serialization, and the invitation/game operations a connected client
//! can drive.
//!
//! Two sessions are never locked at the same time. Operations that touch
//! both sides of an invitation lock the initiator first, release it, then
//! lock the peer — matching one of the two deadlock-free orderings the
//! per-session locking discipline allows.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use game_core::{Game, Role, Winner};
use protocol::{role, server, CodecError, PacketHeader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client_registry::ClientRegistry;
use crate::error::OperationError;
use crate::invitation::{Invitation, InvitationState};
use crate::player::Player;
use crate::rating::{self, Outcome};

/// Documented bound on a session's invitation list (spec leaves the exact
/// number to the implementation; NACKed beyond this).
const MAX_INVITATIONS: usize = 256;
const GROWTH_BLOCK: usize = 10;

/// Epoch for outbound packet timestamps: the moment this process started.
/// `Instant` is monotonic, so timestamps never jump backward under an NTP
/// wall-clock adjustment the way `SystemTime` could.
static START: OnceLock<Instant> = OnceLock::new();

fn monotonic_timestamp() -> (u32, u32) {
    let start = START.get_or_init(Instant::now);
    let elapsed = start.elapsed();
    (elapsed.as_secs() as u32, elapsed.subsec_nanos())
}

struct SessionState<G: Game> {
    player: Option<Arc<Player>>,
    invitations: Vec<Option<Arc<Invitation<G>>>>,
}

pub struct ClientSession<G: Game> {
    pub id: u64,
    write_half: Mutex<OwnedWriteHalf>,
    send_lock: Arc<Mutex<()>>,
    state: Mutex<SessionState<G>>,
    registry: Weak<ClientRegistry<G>>,
    cancellation: CancellationToken,
}

impl<G: Game + 'static> ClientSession<G> {
    pub(crate) fn new(
        id: u64,
        write_half: OwnedWriteHalf,
        send_lock: Arc<Mutex<()>>,
        registry: Weak<ClientRegistry<G>>,
        cancellation: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            write_half: Mutex::new(write_half),
            send_lock,
            state: Mutex::new(SessionState {
                player: None,
                invitations: Vec::new(),
            }),
            registry,
            cancellation,
        })
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub async fn current_player(&self) -> Option<Arc<Player>> {
        self.state.lock().await.player.clone()
    }

    // -- outbound sends --------------------------------------------------

    /// Sends one frame. Held locks: the process-wide send lock, then this
    /// session's write half, for exactly the one encode+write pair. Never
    /// held while any session-state lock is held.
    pub async fn send_packet(
        &self,
        packet_type: u8,
        id: u8,
        role: u8,
        payload: &[u8],
    ) -> Result<(), CodecError> {
        let (timestamp_sec, timestamp_nsec) = monotonic_timestamp();
        let header = PacketHeader::new(
            packet_type,
            id,
            role,
            payload.len().min(u16::MAX as usize) as u16,
            timestamp_sec,
            timestamp_nsec,
        );

        let _send_guard = self.send_lock.lock().await;
        let mut writer = self.write_half.lock().await;
        protocol::write_packet(&mut *writer, &header, payload).await
    }

    pub async fn send_ack(&self, id: u8, payload: &[u8]) -> Result<(), CodecError> {
        self.send_packet(server::ACK, id, role::NULL, payload).await
    }

    pub async fn send_nack(&self) -> Result<(), CodecError> {
        self.send_packet(server::NACK, 0, role::NULL, &[]).await
    }

    // -- login / logout ---------------------------------------------------

    pub async fn login(self: &Arc<Self>, name: &str) -> Result<(), OperationError> {
        let registry = self.registry.upgrade().expect("registry dropped while session alive");
        {
            let state = self.state.lock().await;
            if state.player.is_some() {
                return Err(OperationError::AlreadyLoggedIn);
            }
        }
        let player = registry.login(self.id, name).await?;
        let mut state = self.state.lock().await;
        state.player = Some(player);
        Ok(())
    }

    /// Logs the session out: revokes/declines every open invitation,
    /// falling back to a resignation when the invitation already has a
    /// game in progress, then drops the player reference.
    pub async fn logout(self: &Arc<Self>) -> Result<(), OperationError> {
        let registry = self.registry.upgrade().expect("registry dropped while session alive");
        let (player, entries) = {
            let state = self.state.lock().await;
            let player = state.player.clone().ok_or(OperationError::NotLoggedIn)?;
            let entries: Vec<(u8, Arc<Invitation<G>>)> = state
                .invitations
                .iter()
                .enumerate()
                .filter_map(|(idx, slot)| slot.clone().map(|inv| (idx as u8, inv)))
                .collect();
            (player, entries)
        };

        for (idx, inv) in entries {
            let is_source = Self::is_session(&inv.source, self);
            let result = if is_source {
                self.revoke_invitation(idx).await
            } else {
                self.decline_invitation(idx).await
            };
            if let Err(OperationError::WrongState) = result {
                let _ = self.resign_game(idx).await;
            }
        }

        {
            let mut state = self.state.lock().await;
            state.player = None;
        }
        registry.logout(self.id, &player.name).await;
        Ok(())
    }

    // -- invitation helpers ------------------------------------------------

    fn is_session(weak: &Weak<ClientSession<G>>, session: &Arc<ClientSession<G>>) -> bool {
        weak.upgrade().map(|s| Arc::ptr_eq(&s, session)).unwrap_or(false)
    }

    fn role_in(self: &Arc<Self>, inv: &Invitation<G>) -> Option<Role> {
        if Self::is_session(&inv.source, self) {
            Some(inv.source_role)
        } else if Self::is_session(&inv.target, self) {
            Some(inv.target_role)
        } else {
            None
        }
    }

    fn opponent_of(self: &Arc<Self>, inv: &Invitation<G>) -> Option<Arc<ClientSession<G>>> {
        if Self::is_session(&inv.source, self) {
            inv.target.upgrade()
        } else {
            inv.source.upgrade()
        }
    }

    async fn get_invitation(&self, id: u8) -> Result<Arc<Invitation<G>>, OperationError> {
        let state = self.state.lock().await;
        state
            .invitations
            .get(id as usize)
            .and_then(|slot| slot.clone())
            .ok_or(OperationError::UnknownInvitation)
    }

    async fn find_index(&self, inv: &Arc<Invitation<G>>) -> Option<u8> {
        let state = self.state.lock().await;
        find_index_in(&state.invitations, inv)
    }

    async fn clear_index(&self, inv: &Arc<Invitation<G>>) -> Option<u8> {
        let mut state = self.state.lock().await;
        let idx = find_index_in(&state.invitations, inv);
        if let Some(idx) = idx {
            state.invitations[idx as usize] = None;
        }
        idx
    }

    // -- invitation operations --------------------------------------------

    pub async fn make_invitation(
        self: &Arc<Self>,
        target: &Arc<ClientSession<G>>,
        target_role: Role,
    ) -> Result<u8, OperationError> {
        if Arc::ptr_eq(self, target) {
            return Err(OperationError::SameSession);
        }
        let source_role = target_role.opponent();
        let invitation = Invitation::new(
            Arc::downgrade(self),
            Arc::downgrade(target),
            source_role,
            target_role,
        );

        let source_name = {
            let state = self.state.lock().await;
            state
                .player
                .as_ref()
                .ok_or(OperationError::NotLoggedIn)?
                .name
                .clone()
        };

        let source_idx = {
            let mut state = self.state.lock().await;
            add_to_list(&mut state.invitations, invitation.clone())?
        };

        let target_idx = {
            let mut state = target.state.lock().await;
            add_to_list(&mut state.invitations, invitation.clone())
        };
        let target_idx = match target_idx {
            Ok(idx) => idx,
            Err(err) => {
                let mut state = self.state.lock().await;
                remove_from_list(&mut state.invitations, source_idx);
                return Err(err);
            }
        };

        if target
            .send_packet(server::INVITED, target_idx, target_role.to_wire(), source_name.as_bytes())
            .await
            .is_err()
        {
            tracing::debug!(session_id = target.id, "failed to deliver INVITED");
        }

        Ok(source_idx)
    }

    pub async fn revoke_invitation(self: &Arc<Self>, id: u8) -> Result<(), OperationError> {
        let inv = self.get_invitation(id).await?;
        if !Self::is_session(&inv.source, self) {
            return Err(OperationError::WrongRole);
        }
        {
            let mut inner = inv.inner.lock().await;
            if inner.state != InvitationState::Open {
                return Err(OperationError::WrongState);
            }
            inner.state = InvitationState::Closed;
        }

        self.clear_index(&inv).await;
        if let Some(target) = inv.target.upgrade() {
            if let Some(target_idx) = target.clear_index(&inv).await {
                let _ = target.send_packet(server::REVOKED, target_idx, role::NULL, &[]).await;
            }
        }
        Ok(())
    }

    pub async fn decline_invitation(self: &Arc<Self>, id: u8) -> Result<(), OperationError> {
        let inv = self.get_invitation(id).await?;
        if !Self::is_session(&inv.target, self) {
            return Err(OperationError::WrongRole);
        }
        {
            let mut inner = inv.inner.lock().await;
            if inner.state != InvitationState::Open {
                return Err(OperationError::WrongState);
            }
            inner.state = InvitationState::Closed;
        }

        self.clear_index(&inv).await;
        if let Some(source) = inv.source.upgrade() {
            if let Some(source_idx) = source.clear_index(&inv).await {
                let _ = source.send_packet(server::DECLINED, source_idx, role::NULL, &[]).await;
            }
        }
        Ok(())
    }

    pub async fn accept_invitation(self: &Arc<Self>, id: u8) -> Result<Option<String>, OperationError> {
        let inv = self.get_invitation(id).await?;
        if !Self::is_session(&inv.target, self) {
            return Err(OperationError::WrongRole);
        }

        let initial_state = {
            let mut inner = inv.inner.lock().await;
            if inner.state != InvitationState::Open {
                return Err(OperationError::WrongState);
            }
            let game = G::new();
            let rendered = game.render_state();
            inner.state = InvitationState::Accepted;
            inner.game = Some(game);
            rendered
        };

        if let Some(source) = inv.source.upgrade() {
            if let Some(source_idx) = source.find_index(&inv).await {
                let payload = if inv.source_role == Role::First {
                    initial_state.as_bytes()
                } else {
                    &[]
                };
                let _ = source.send_packet(server::ACCEPTED, source_idx, role::NULL, payload).await;
            }
        }

        Ok(if inv.target_role == Role::First {
            Some(initial_state)
        } else {
            None
        })
    }

    pub async fn make_move(self: &Arc<Self>, id: u8, move_text: &str) -> Result<(), OperationError> {
        let inv = self.get_invitation(id).await?;
        let my_role = self.role_in(&inv).ok_or(OperationError::WrongRole)?;
        let opponent = self.opponent_of(&inv).ok_or(OperationError::WrongRole)?;

        let (rendered, ended) = {
            let mut inner = inv.inner.lock().await;
            if inner.state != InvitationState::Accepted {
                return Err(OperationError::WrongState);
            }
            let game = inner
                .game
                .as_mut()
                .expect("an ACCEPTED invitation always holds a game");
            let mv = game.parse_move(my_role, move_text)?;
            game.apply_move(my_role, &mv)?;
            let rendered = game.render_state();
            let ended = if game.is_over() {
                let winner = game.winner();
                inner.state = InvitationState::Closed;
                Some(winner)
            } else {
                None
            };
            (rendered, ended)
        };

        if let Some(opp_idx) = opponent.find_index(&inv).await {
            let _ = opponent
                .send_packet(server::MOVED, opp_idx, role::NULL, rendered.as_bytes())
                .await;
        }

        if let Some(winner) = ended {
            self.finish_game(&inv, winner, &opponent, my_role).await;
        }
        Ok(())
    }

    pub async fn resign_game(self: &Arc<Self>, id: u8) -> Result<(), OperationError> {
        let inv = self.get_invitation(id).await?;
        let my_role = self.role_in(&inv).ok_or(OperationError::WrongRole)?;
        let opponent = self.opponent_of(&inv).ok_or(OperationError::WrongRole)?;

        {
            let mut inner = inv.inner.lock().await;
            if inner.state != InvitationState::Accepted {
                return Err(OperationError::WrongState);
            }
            let game = inner
                .game
                .as_mut()
                .expect("an ACCEPTED invitation always holds a game");
            game.resign(my_role);
            inner.state = InvitationState::Closed;
        }

        if let Some(opp_idx) = opponent.find_index(&inv).await {
            let _ = opponent.send_packet(server::RESIGNED, opp_idx, role::NULL, &[]).await;
        }

        let winner = Winner::Role(my_role.opponent());
        self.finish_game(&inv, winner, &opponent, my_role).await;
        Ok(())
    }

    /// Common tail of the move and resignation paths: tells both sides
    /// `ENDED`, removes the invitation from both lists, and posts the
    /// rating update.
    async fn finish_game(
        self: &Arc<Self>,
        inv: &Arc<Invitation<G>>,
        winner: Winner,
        opponent: &Arc<ClientSession<G>>,
        my_role: Role,
    ) {
        let self_idx = self.clear_index(inv).await;
        let opp_idx = opponent.clear_index(inv).await;

        if let Some(idx) = self_idx {
            let _ = self.send_packet(server::ENDED, idx, winner.to_wire(), &[]).await;
        }
        if let Some(idx) = opp_idx {
            let _ = opponent.send_packet(server::ENDED, idx, winner.to_wire(), &[]).await;
        }

        if let (Some(self_player), Some(opp_player)) =
            (self.current_player().await, opponent.current_player().await)
        {
            let outcome = match winner {
                Winner::Draw => Outcome::Draw,
                Winner::Role(role) if role == my_role => Outcome::Win,
                Winner::Role(_) => Outcome::Loss,
            };
            rating::apply_result(&self_player, &opp_player, outcome).await;
        }
    }
}

fn find_index_in<G: Game>(list: &[Option<Arc<Invitation<G>>>], inv: &Arc<Invitation<G>>) -> Option<u8> {
    list.iter()
        .position(|slot| slot.as_ref().map(|i| Arc::ptr_eq(i, inv)).unwrap_or(false))
        .map(|idx| idx as u8)
}

fn add_to_list<G: Game>(
    list: &mut Vec<Option<Arc<Invitation<G>>>>,
    inv: Arc<Invitation<G>>,
) -> Result<u8, OperationError> {
    if let Some(idx) = list.iter().position(|slot| slot.is_none()) {
        list[idx] = Some(inv);
        return Ok(idx as u8);
    }
    if list.len() >= MAX_INVITATIONS {
        return Err(OperationError::InvitationListFull);
    }
    let grow_to = (list.len() + GROWTH_BLOCK).min(MAX_INVITATIONS);
    list.resize(grow_to, None);
    let idx = list
        .iter()
        .position(|slot| slot.is_none())
        .expect("list was just grown to make room");
    list[idx] = Some(inv);
    Ok(idx as u8)
}

fn remove_from_list<G: Game>(list: &mut [Option<Arc<Invitation<G>>>], idx: u8) -> Option<u8> {
    let i = idx as usize;
    if i < list.len() && list[i].is_some() {
        list[i] = None;
        Some(idx)
    } else {
        None
    }
}
