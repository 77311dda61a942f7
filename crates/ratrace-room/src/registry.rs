//! Room registry: creates, tracks, hydrates, and lists rooms.
//!
//! The registry is the entry point for room operations from the
//! orchestrator: it owns one [`RoomHandle`] per live room and the shared
//! store handle. At startup it runs retention GC against the store and
//! re-spawns an actor for every surviving persisted room, so rooms
//! outlive a process restart.

use std::collections::HashMap;
use std::sync::Arc;

use ratrace_identity::IdentityRegistry;
use ratrace_protocol::{RoomId, RoomListEntry};
use ratrace_storage::{RoomStore, StorageError};

use crate::actor::{now_ms, spawn_room, RoomHandle};
use crate::room::{Room, RoomOptions};
use crate::RoomError;

/// How long a room is kept after creation. Rooms older than this are
/// deleted from the store at startup.
pub const ROOM_RETENTION_MS: u64 = 5 * 60 * 60 * 1000;

/// Generates a random 16-character hex room id.
fn generate_room_id() -> RoomId {
    use rand::Rng;
    let bytes: [u8; 8] = rand::rng().random();
    RoomId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

/// Manages all active rooms.
pub struct RoomRegistry<S> {
    rooms: HashMap<RoomId, RoomHandle>,
    store: Arc<S>,
}

impl<S: RoomStore> RoomRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { rooms: HashMap::new(), store }
    }

    /// Startup sequence: GC expired rooms from the store, then re-spawn
    /// an actor for every room that survived.
    pub async fn hydrate(&mut self) -> Result<(), StorageError> {
        let cutoff = now_ms().saturating_sub(ROOM_RETENTION_MS);
        let removed = self.store.delete_old_rooms(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "expired rooms deleted at startup");
        }

        let snapshots = self.store.get_all_rooms().await?;
        let restored = snapshots.len();
        for snapshot in snapshots {
            let room = Room::from_snapshot(snapshot);
            let handle = spawn_room(room, Arc::clone(&self.store));
            self.rooms.insert(handle.room_id().clone(), handle);
        }
        tracing::info!(restored, "rooms hydrated from store");
        Ok(())
    }

    /// Creates a room, spawns its actor, and persists the initial
    /// snapshot (fire-and-forget).
    pub async fn create_room(
        &mut self,
        opts: RoomOptions,
    ) -> Result<RoomHandle, RoomError> {
        let id = generate_room_id();
        let room = Room::new(id.clone(), opts, now_ms())?;

        if let Err(e) = self.store.save_room(&room.snapshot()).await {
            tracing::warn!(room_id = %id, error = %e, "failed to persist new room");
        }

        let handle = spawn_room(room, Arc::clone(&self.store));
        self.rooms.insert(id.clone(), handle.clone());
        tracing::info!(room_id = %id, "room created");
        Ok(handle)
    }

    pub fn find(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Builds the lobby listing, newest rooms first.
    ///
    /// The host's display name is resolved members-first: the host's own
    /// membership record, then the identity registry, then `"unknown"`.
    /// Rooms whose actor fails to answer are skipped.
    pub async fn list_rooms(
        &self,
        identity: &IdentityRegistry,
    ) -> Vec<RoomListEntry> {
        let mut entries = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            let Ok(snapshot) = handle.snapshot().await else {
                continue;
            };

            let host_name = snapshot
                .host
                .as_ref()
                .and_then(|host| {
                    snapshot
                        .members
                        .iter()
                        .find(|m| &m.account_id == host)
                        .map(|m| m.display_name.clone())
                        .or_else(|| {
                            identity.display_name(host).map(str::to_string)
                        })
                })
                .unwrap_or_else(|| "unknown".to_string());

            entries.push(RoomListEntry {
                room_id: snapshot.room_id,
                name: snapshot.name,
                players: snapshot.members.iter().filter(|m| m.connected).count(),
                max_players: snapshot.max_players,
                host_name,
                has_password: !snapshot.password.is_empty(),
                status: snapshot.status,
                created_at_ms: snapshot.created_at_ms,
            });
        }
        entries.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        entries
    }

    /// Stops a room's actor and forgets it. The persisted snapshot is
    /// left for retention GC.
    pub async fn shutdown_room(&mut self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        handle.shutdown().await;
        tracing::info!(%room_id, "room shut down");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
