//! Persistence boundary for Ratrace.
//!
//! The coordinator treats durability as best-effort: every mutation is
//! applied in memory first and then handed to a [`RoomStore`]
//! fire-and-forget. A store failure is logged and swallowed — in-memory
//! state stays authoritative for the life of the process, and nothing is
//! ever rolled back.
//!
//! [`MemoryStore`] is the reference implementation, used by tests and
//! the dev server. A real deployment would implement [`RoomStore`] over
//! an actual database without the core noticing.

mod error;
mod memory;

pub use error::StorageError;
pub use memory::MemoryStore;

use std::future::Future;

use ratrace_protocol::{MemberSnapshot, RoomId, RoomSnapshot};

/// The storage collaborator interface.
///
/// All methods take snapshots — the store never sees live room state,
/// only the serialized representation from `ratrace-protocol`.
///
/// Methods are declared in return-position form with a `Send` bound so
/// callers can hold the returned futures across `tokio::spawn`; impls
/// may still write plain `async fn`.
pub trait RoomStore: Send + Sync + 'static {
    /// Persists a full room snapshot, replacing any previous one.
    fn save_room(
        &self,
        room: &RoomSnapshot,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Loads every persisted room, in no particular order.
    fn get_all_rooms(
        &self,
    ) -> impl Future<Output = Result<Vec<RoomSnapshot>, StorageError>> + Send;

    /// Persists a single member's state within a room.
    fn save_player(
        &self,
        room_id: &RoomId,
        member: &MemberSnapshot,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Loads the members of one room.
    fn get_players_in_room(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Vec<MemberSnapshot>, StorageError>> + Send;

    /// Deletes rooms created before the given timestamp. Returns how
    /// many were removed. Called once at startup for retention GC.
    fn delete_old_rooms(
        &self,
        before_ms: u64,
    ) -> impl Future<Output = Result<usize, StorageError>> + Send;
}
