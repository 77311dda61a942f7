//! Wire protocol for Ratrace.
//!
//! This crate defines the language clients and the coordinator speak:
//!
//! - **Types** ([`ClientCommand`], [`ServerEvent`], [`RoomSnapshot`],
//!   id newtypes) — the structures that travel on the wire, which also
//!   serve as the persisted representation at the storage boundary.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections, rooms, or
//! accounts — it only serializes and deserializes.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccountId, ClientCommand, ConnId, MemberSnapshot, Profession,
    ProfessionMode, RoomId, RoomListEntry, RoomSnapshot, RoomStatus,
    ServerEvent,
};
