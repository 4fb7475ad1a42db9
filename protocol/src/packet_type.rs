//! Packet type codes and the `role` byte vocabulary.
//!
//! Client-to-server and server-to-client type codes live in disjoint
//! numeric spaces (mirroring the teacher's split between its client- and
//! server-originated message ids), so a misdirected packet fails to decode
//! as a sensible opposite-direction type rather than silently aliasing one.

/// Packet types a client sends to the server.
pub mod client {
    pub const LOGIN: u8 = 0;
    pub const USERS: u8 = 1;
    pub const INVITE: u8 = 2;
    pub const REVOKE: u8 = 3;
    pub const DECLINE: u8 = 4;
    pub const ACCEPT: u8 = 5;
    pub const MOVE: u8 = 6;
    pub const RESIGN: u8 = 7;
}

/// Packet types the server sends to a client.
pub mod server {
    pub const ACK: u8 = 0;
    pub const NACK: u8 = 1;
    pub const INVITED: u8 = 2;
    pub const REVOKED: u8 = 3;
    pub const ACCEPTED: u8 = 4;
    pub const DECLINED: u8 = 5;
    pub const MOVED: u8 = 6;
    pub const RESIGNED: u8 = 7;
    pub const ENDED: u8 = 8;
}

/// Values carried in the header's `role` byte.
///
/// Outside of a game context (e.g. on `LOGIN`, `ACK`, `NACK`) this field is
/// sent as [`role::NULL`].
pub mod role {
    pub const NULL: u8 = 0;
    pub const FIRST_PLAYER: u8 = 1;
    pub const SECOND_PLAYER: u8 = 2;
}
