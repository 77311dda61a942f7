//! In-memory [`RoomStore`] implementation.

use std::collections::HashMap;

use ratrace_protocol::{MemberSnapshot, RoomId, RoomSnapshot};
use tokio::sync::Mutex;

use crate::{RoomStore, StorageError};

/// A [`RoomStore`] backed by a `HashMap`.
///
/// State lives only as long as the process, which matches the retention
/// model anyway: rooms are garbage-collected after a few hours. Cloning
/// is not supported — share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomId, RoomSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently held. Test helper.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

impl RoomStore for MemoryStore {
    async fn save_room(&self, room: &RoomSnapshot) -> Result<(), StorageError> {
        self.rooms
            .lock()
            .await
            .insert(room.room_id.clone(), room.clone());
        tracing::debug!(room_id = %room.room_id, "room persisted");
        Ok(())
    }

    async fn get_all_rooms(&self) -> Result<Vec<RoomSnapshot>, StorageError> {
        Ok(self.rooms.lock().await.values().cloned().collect())
    }

    async fn save_player(
        &self,
        room_id: &RoomId,
        member: &MemberSnapshot,
    ) -> Result<(), StorageError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(room_id).ok_or_else(|| {
            StorageError::Unavailable(format!("no such room {room_id}"))
        })?;

        // Upsert by stable id: replace the existing row or append.
        match room
            .members
            .iter_mut()
            .find(|m| m.account_id == member.account_id)
        {
            Some(existing) => *existing = member.clone(),
            None => room.members.push(member.clone()),
        }
        Ok(())
    }

    async fn get_players_in_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<MemberSnapshot>, StorageError> {
        Ok(self
            .rooms
            .lock()
            .await
            .get(room_id)
            .map(|r| r.members.clone())
            .unwrap_or_default())
    }

    async fn delete_old_rooms(&self, before_ms: u64) -> Result<usize, StorageError> {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|_, r| r.created_at_ms >= before_ms);
        let removed = before - rooms.len();
        if removed > 0 {
            tracing::info!(removed, before_ms, "purged stale rooms");
        }
        Ok(removed)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ratrace_protocol::{AccountId, ProfessionMode, RoomStatus};

    use super::*;

    fn snapshot(id: &str, created_at_ms: u64) -> RoomSnapshot {
        RoomSnapshot {
            room_id: RoomId(id.into()),
            name: format!("room {id}"),
            password: String::new(),
            max_players: 4,
            duration_minutes: 120,
            status: RoomStatus::Waiting,
            host: None,
            profession_mode: ProfessionMode::Individual,
            shared_profession: None,
            created_at_ms,
            members: Vec::new(),
            applied_tx: Vec::new(),
        }
    }

    fn member(id: &str, balance: i64) -> MemberSnapshot {
        MemberSnapshot {
            account_id: AccountId(id.into()),
            conn: None,
            display_name: id.to_uppercase(),
            ready: false,
            profession: None,
            dream_id: None,
            balance,
            credits: BTreeMap::new(),
            assets: Vec::new(),
            connected: false,
            joined_at_ms: 0,
            disconnected_at_ms: None,
            reconnected_at_ms: None,
        }
    }

    #[tokio::test]
    async fn test_save_room_then_get_all_returns_it() {
        let store = MemoryStore::new();
        store.save_room(&snapshot("r1", 10)).await.unwrap();

        let all = store.get_all_rooms().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].room_id, RoomId("r1".into()));
    }

    #[tokio::test]
    async fn test_save_room_replaces_previous_snapshot() {
        let store = MemoryStore::new();
        store.save_room(&snapshot("r1", 10)).await.unwrap();

        let mut updated = snapshot("r1", 10);
        updated.status = RoomStatus::Playing;
        store.save_room(&updated).await.unwrap();

        let all = store.get_all_rooms().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn test_save_player_upserts_by_account_id() {
        let store = MemoryStore::new();
        let rid = RoomId("r1".into());
        store.save_room(&snapshot("r1", 10)).await.unwrap();

        store.save_player(&rid, &member("a", 3000)).await.unwrap();
        store.save_player(&rid, &member("b", 2000)).await.unwrap();
        // Second save for "a" must replace, not duplicate.
        store.save_player(&rid, &member("a", 2500)).await.unwrap();

        let players = store.get_players_in_room(&rid).await.unwrap();
        assert_eq!(players.len(), 2);
        let a = players
            .iter()
            .find(|m| m.account_id == AccountId("a".into()))
            .unwrap();
        assert_eq!(a.balance, 2500);
    }

    #[tokio::test]
    async fn test_save_player_unknown_room_fails() {
        let store = MemoryStore::new();
        let result = store
            .save_player(&RoomId("nope".into()), &member("a", 0))
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_delete_old_rooms_respects_cutoff() {
        let store = MemoryStore::new();
        store.save_room(&snapshot("old", 100)).await.unwrap();
        store.save_room(&snapshot("fresh", 900)).await.unwrap();

        let removed = store.delete_old_rooms(500).await.unwrap();

        assert_eq!(removed, 1);
        let all = store.get_all_rooms().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].room_id, RoomId("fresh".into()));
    }

    #[tokio::test]
    async fn test_store_usable_from_spawned_task() {
        // The trait's futures carry a `Send` bound; exercising a
        // generic store inside `tokio::spawn` is what the room actors
        // do for every persistence call.
        async fn persist_via<S: RoomStore>(store: std::sync::Arc<S>) {
            store.save_room(&snapshot("r1", 10)).await.unwrap();
        }

        let store = std::sync::Arc::new(MemoryStore::new());
        let task = tokio::spawn(persist_via(std::sync::Arc::clone(&store)));
        task.await.unwrap();

        assert_eq!(store.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_players_in_unknown_room_is_empty() {
        let store = MemoryStore::new();
        let players = store
            .get_players_in_room(&RoomId("ghost".into()))
            .await
            .unwrap();
        assert!(players.is_empty());
    }
}
