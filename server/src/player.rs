//! A registered player: an immutable username and a mutable rating.

use tokio::sync::{Mutex, MutexGuard};

const INITIAL_RATING: i32 = 1500;

pub struct Player {
    pub name: String,
    rating: Mutex<i32>,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            name,
            rating: Mutex::new(INITIAL_RATING),
        }
    }

    pub async fn rating(&self) -> i32 {
        *self.rating.lock().await
    }

    pub(crate) async fn lock_rating(&self) -> MutexGuard<'_, i32> {
        self.rating.lock().await
    }
}
