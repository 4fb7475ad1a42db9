//! Core abstractions for the server-authoritative game backend.
//!
//! This crate defines the contract between the session layer and a
//! concrete game's rules: the session layer never inspects a board, it
//! only calls [`Game`]. A game implementation owns all of its state and
//! exposes exactly the operations the session layer needs to drive an
//! invitation through `ACCEPTED` to `ENDED`.
//!
//! # Implementing a game
//!
//! ```ignore
//! impl Game for MyGame {
//!     fn new() -> Self { /* ... */ }
//!     fn apply_move(&mut self, role: Role, mv: &Move) -> Result<(), GameError> { /* ... */ }
//!     // ...
//! }
//! ```

use std::fmt;

/// A participant's side in a match.
///
/// `Role` never appears bare on the wire as `NULL`-meaning-"no side" inside
/// a game; the session layer uses the protocol crate's own `role::NULL`
/// constant for that. This type is the in-memory vocabulary the two real
/// sides are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    First,
    Second,
}

impl Role {
    /// The other side of the same game.
    pub fn opponent(self) -> Role {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    /// Decodes the wire representation (`1` = first, `2` = second).
    pub fn from_wire(value: u8) -> Option<Role> {
        match value {
            1 => Some(Role::First),
            2 => Some(Role::Second),
            _ => None,
        }
    }

    /// Encodes to the wire representation (`1` = first, `2` = second).
    pub fn to_wire(self) -> u8 {
        match self {
            Role::First => 1,
            Role::Second => 2,
        }
    }
}

/// The outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Draw,
    Role(Role),
}

impl Winner {
    /// Encodes to the wire representation used by `ENDED.role`
    /// (`0` = draw, `1` = first won, `2` = second won).
    pub fn to_wire(self) -> u8 {
        match self {
            Winner::Draw => 0,
            Winner::Role(role) => role.to_wire(),
        }
    }
}

/// Failures a [`Game`] implementation reports back to the session layer.
///
/// All of these are operational failures (they become a `NACK`, never a
/// crash); the session layer does not need to distinguish them beyond
/// logging, so the variant is a flat opaque message rather than a cause
/// enum the way [`crate::Game`]'s caller-facing errors are.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct GameError(pub String);

impl GameError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A single in-game action, already parsed from the wire move string.
///
/// The session layer treats this as opaque; only the concrete [`Game`]
/// implementation that produced it via [`Game::parse_move`] interprets it.
pub trait Move: fmt::Debug + Send + Sync {}

/// The abstract match state the session layer drives.
///
/// A `Game` is created once an invitation is accepted and lives until it
/// reports [`Game::is_over`], at which point the session layer posts the
/// result to the player registry and drops it. Nothing in this trait
/// refers to sessions, invitations, or the wire protocol.
pub trait Game: Send + Sync {
    /// The concrete move type this game parses its move strings into.
    type Move: Move;

    /// Starts a fresh match in its initial state.
    fn new() -> Self
    where
        Self: Sized;

    /// Parses a move string (as carried in a `MOVE` packet's payload) for
    /// the given role. Fails with [`GameError`] on malformed input; does
    /// not validate legality against the current board (that happens in
    /// [`Game::apply_move`]).
    fn parse_move(&self, role: Role, text: &str) -> Result<Self::Move, GameError>;

    /// Applies a previously parsed move as the given role.
    ///
    /// Fails if the move is illegal in the current position (wrong turn,
    /// occupied cell, game already over, mark mismatch, etc).
    fn apply_move(&mut self, role: Role, mv: &Self::Move) -> Result<(), GameError>;

    /// Resigns the game on behalf of `role`; the opponent is the winner.
    fn resign(&mut self, role: Role);

    /// Whether the game has reached a terminal state (win or draw).
    fn is_over(&self) -> bool;

    /// The result, once [`Game::is_over`] is true. Panics otherwise —
    /// callers must check `is_over` first, exactly as they must before
    /// calling [`Game::resign`]'s sibling "declare a winner" step.
    fn winner(&self) -> Winner;

    /// Renders the current position as the human-readable multi-line
    /// string carried in `ACCEPTED` and `MOVED` payloads.
    fn render_state(&self) -> String;
}
