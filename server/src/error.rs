//! Operation-level failures: the things that turn into a `NACK`.
//!
//! These are distinct from transport failures ([`protocol::CodecError`]),
//! which are fatal to a connection rather than answerable with a packet.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("already logged in")]
    AlreadyLoggedIn,
    #[error("username already in use by a live session")]
    UsernameTaken,
    #[error("no logged-in session with that username")]
    TargetNotFound,
    #[error("source and target must be distinct sessions")]
    SameSession,
    #[error("role byte is not a valid role")]
    InvalidRole,
    #[error("unknown invitation id")]
    UnknownInvitation,
    #[error("caller does not hold this invitation in the required role")]
    WrongRole,
    #[error("invitation is not in the required state for this operation")]
    WrongState,
    #[error("invitation list is full")]
    InvitationListFull,
    #[error("client registry is full")]
    RegistryFull,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("move rejected: {0}")]
    GameRejected(#[from] game_core::GameError),
}
