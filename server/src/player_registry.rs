//! The process-lifetime table of players that have ever logged in.
//!
//! Registration is idempotent: logging in with a name that already exists
//! returns the existing [`Player`] (and its current rating) rather than
//! resetting it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::player::Player;

pub struct PlayerRegistry {
    players: Mutex<HashMap<String, Arc<Player>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the player with this name, creating it at the initial
    /// rating on first use.
    pub async fn login_or_create(&self, name: &str) -> Arc<Player> {
        let mut players = self.players.lock().await;
        players
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Player::new(name.to_string())))
            .clone()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_rating_across_logins() {
        let registry = PlayerRegistry::new();
        let alice = registry.login_or_create("alice").await;
        *alice.lock_rating().await = 1616;
        drop(alice);

        let alice_again = registry.login_or_create("alice").await;
        assert_eq!(alice_again.rating().await, 1616);
    }
}
