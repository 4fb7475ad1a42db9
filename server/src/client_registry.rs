//! The process-wide table of live connections: who is accepted, who is
//! logged in under which username, the shared send lock, and the
//! shutdown/empty-barrier machinery the acceptor drives on SIGHUP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use game_core::Game;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::OperationError;
use crate::player_registry::PlayerRegistry;
use crate::session::ClientSession;

/// Documented cap on concurrently accepted connections.
pub const MAX_CLIENTS: usize = 64;

pub struct ClientRegistry<G: Game> {
    sessions: Mutex<HashMap<u64, Arc<ClientSession<G>>>>,
    logged_in: Mutex<HashMap<String, u64>>,
    player_registry: Arc<PlayerRegistry>,
    next_id: AtomicU64,
    send_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
    empty_notify: Notify,
}

impl<G: Game + 'static> ClientRegistry<G> {
    pub fn new(player_registry: Arc<PlayerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            logged_in: Mutex::new(HashMap::new()),
            player_registry,
            next_id: AtomicU64::new(1),
            send_lock: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
            empty_notify: Notify::new(),
        })
    }

    pub async fn register(
        self: &Arc<Self>,
        write_half: OwnedWriteHalf,
    ) -> Result<Arc<ClientSession<G>>, OperationError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= MAX_CLIENTS {
            return Err(OperationError::RegistryFull);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = ClientSession::new(
            id,
            write_half,
            self.send_lock.clone(),
            Arc::downgrade(self),
            self.shutdown.child_token(),
        );
        sessions.insert(id, session.clone());
        Ok(session)
    }

    pub async fn unregister(&self, session_id: u64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&session_id);
        if sessions.is_empty() {
            self.empty_notify.notify_waiters();
        }
    }

    pub async fn find_by_username(&self, name: &str) -> Option<Arc<ClientSession<G>>> {
        let session_id = {
            let logged_in = self.logged_in.lock().await;
            *logged_in.get(name)?
        };
        let sessions = self.sessions.lock().await;
        sessions.get(&session_id).cloned()
    }

    /// A consistent snapshot of every currently logged-in player's name and
    /// rating, taken atomically under the registry's locks so it can't
    /// observe a login or logout half-applied.
    pub async fn all_players(&self) -> Vec<(String, i32)> {
        let logged_in = self.logged_in.lock().await;
        let sessions = self.sessions.lock().await;
        let mut snapshot = Vec::with_capacity(logged_in.len());
        for (name, session_id) in logged_in.iter() {
            if let Some(session) = sessions.get(session_id) {
                if let Some(player) = session.current_player().await {
                    snapshot.push((name.clone(), player.rating().await));
                }
            }
        }
        snapshot
    }

    pub(crate) async fn login(
        &self,
        session_id: u64,
        name: &str,
    ) -> Result<Arc<crate::player::Player>, OperationError> {
        let mut logged_in = self.logged_in.lock().await;
        if logged_in.contains_key(name) {
            return Err(OperationError::UsernameTaken);
        }
        let player = self.player_registry.login_or_create(name).await;
        logged_in.insert(name.to_string(), session_id);
        Ok(player)
    }

    pub(crate) async fn logout(&self, session_id: u64, name: &str) {
        let mut logged_in = self.logged_in.lock().await;
        if logged_in.get(name) == Some(&session_id) {
            logged_in.remove(name);
        }
    }

    /// Cancels every connection's shared shutdown token, causing each
    /// service loop's next read race to resolve to end-of-stream.
    pub fn shutdown_all(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once every accepted connection has unregistered.
    pub async fn wait_for_empty(&self) {
        loop {
            let notified = self.empty_notify.notified();
            {
                let sessions = self.sessions.lock().await;
                if sessions.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }
}
