//! The wire protocol shared by the server and its reference client.
//!
//! A frame is `header || payload`. The header is a fixed 16-byte record;
//! the payload is exactly `header.size` raw bytes with no terminator. This
//! crate only knows about the frame boundary and the packet type/role
//! constants — it has no opinion on invitations, games, or players.

mod codec;
mod header;
mod packet_type;

pub use codec::{read_packet, write_packet, CodecError, Packet};
pub use header::{PacketHeader, HEADER_SIZE};
pub use packet_type::{client, role, server};