//! A pending or in-progress match between two sessions.
//!
//! An invitation links exactly two sessions, `source` (who issued it) and
//! `target` (who received it), each with a role that must differ from the
//! other's. Back-references to the sessions are [`Weak`] so that a session
//! and its own invitation list never form an owning cycle — the list holds
//! the invitation, the invitation only *looks up* its sessions.

use std::sync::{Arc, Weak};

use game_core::{Game, Role};
use tokio::sync::Mutex;

use crate::session::ClientSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationState {
    Open,
    Accepted,
    Closed,
}

pub(crate) struct InvitationInner<G: Game> {
    pub(crate) state: InvitationState,
    pub(crate) game: Option<G>,
}

pub struct Invitation<G: Game> {
    pub source: Weak<ClientSession<G>>,
    pub target: Weak<ClientSession<G>>,
    pub source_role: Role,
    pub target_role: Role,
    pub(crate) inner: Mutex<InvitationInner<G>>,
}

impl<G: Game> Invitation<G> {
    pub fn new(
        source: Weak<ClientSession<G>>,
        target: Weak<ClientSession<G>>,
        source_role: Role,
        target_role: Role,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            target,
            source_role,
            target_role,
            inner: Mutex::new(InvitationInner {
                state: InvitationState::Open,
                game: None,
            }),
        })
    }

    pub async fn state(&self) -> InvitationState {
        self.inner.lock().await.state
    }
}
