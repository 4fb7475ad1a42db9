//! Elo rating updates, `K = 32`.

use std::sync::Arc;

use crate::player::Player;

const K: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Applies an Elo update to `a` and `b` for a match outcome from `a`'s
/// perspective. Locks are taken in ascending `Arc` pointer order so two
/// results touching the same pair of players, arriving concurrently from
/// different games, never deadlock.
pub async fn apply_result(a: &Arc<Player>, b: &Arc<Player>, outcome: Outcome) {
    if Arc::ptr_eq(a, b) {
        return;
    }

    let a_first = (Arc::as_ptr(a) as usize) < (Arc::as_ptr(b) as usize);
    let (mut first_guard, mut second_guard) = if a_first {
        (a.lock_rating().await, b.lock_rating().await)
    } else {
        (b.lock_rating().await, a.lock_rating().await)
    };

    let (a_rating, b_rating) = if a_first {
        (*first_guard, *second_guard)
    } else {
        (*second_guard, *first_guard)
    };

    let expected_a = 1.0 / (1.0 + 10f64.powf((b_rating - a_rating) as f64 / 400.0));
    let score_a = match outcome {
        Outcome::Win => 1.0,
        Outcome::Loss => 0.0,
        Outcome::Draw => 0.5,
    };
    let delta_a = (K * (score_a - expected_a)).round() as i32;
    let new_a = a_rating + delta_a;
    let new_b = b_rating - delta_a;

    if a_first {
        *first_guard = new_a;
        *second_guard = new_b;
    } else {
        *second_guard = new_a;
        *first_guard = new_b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn equal_ratings_decisive_win_matches_reference_numbers() {
        let a = Arc::new(Player::new("alice".into()));
        let b = Arc::new(Player::new("bob".into()));
        apply_result(&a, &b, Outcome::Win).await;
        assert_eq!(a.rating().await, 1516);
        assert_eq!(b.rating().await, 1484);
    }

    #[tokio::test]
    async fn equal_ratings_draw_is_unchanged() {
        let a = Arc::new(Player::new("alice".into()));
        let b = Arc::new(Player::new("bob".into()));
        apply_result(&a, &b, Outcome::Draw).await;
        assert_eq!(a.rating().await, 1500);
        assert_eq!(b.rating().await, 1500);
    }
}
