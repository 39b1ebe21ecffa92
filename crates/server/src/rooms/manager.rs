//! Create, look up, and retire rooms.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use agora_bus::MessageBus;
use agora_domain::config::ToolConfig;
use agora_domain::{Error, Result, RoomMode};
use agora_protocol::RoomInfo;
use agora_store::Repository;
use agora_tools::ToolRegistry;

use super::room::{Room, RoomOptions};

/// Owns every room of one server instance.
///
/// Each room gets a shutdown hook that removes it from the map, so a
/// room shutting down — explicitly, via `delete`, or by the
/// reap-on-empty policy — always disappears from lookups.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    repo: Arc<dyn Repository>,
    bus: Option<Arc<dyn MessageBus>>,
    tool_configs: Vec<ToolConfig>,
    default_mode: RoomMode,
    options: RoomOptions,
}

impl RoomManager {
    pub fn new(
        repo: Arc<dyn Repository>,
        bus: Option<Arc<dyn MessageBus>>,
        tool_configs: Vec<ToolConfig>,
        default_mode: RoomMode,
        options: RoomOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            repo,
            bus,
            tool_configs,
            default_mode,
            options,
        })
    }

    /// Create a room; a generated `room-<rand8>` id is used when none is
    /// supplied. Fails on a duplicate id without touching the existing
    /// room.
    pub fn create(
        self: &Arc<Self>,
        room_id: Option<String>,
        topic: &str,
        mode: Option<RoomMode>,
    ) -> Result<Arc<Room>> {
        let id = room_id.unwrap_or_else(|| {
            let rand = uuid::Uuid::new_v4().simple().to_string();
            format!("room-{}", &rand[..8])
        });

        let mut rooms = self.rooms.write();
        if rooms.contains_key(&id) {
            return Err(Error::State(format!("room {id} already exists")));
        }

        let room = Room::new(
            id.clone(),
            topic,
            mode.unwrap_or(self.default_mode),
            self.repo.clone(),
            self.bus.clone(),
            ToolRegistry::from_configs(&self.tool_configs),
            self.options.clone(),
        );

        let manager = Arc::downgrade(self);
        room.set_shutdown_hook(Box::new(move |room_id: &str| {
            if let Some(manager) = manager.upgrade() {
                manager.rooms.write().remove(room_id);
                tracing::info!(room = %room_id, "room removed");
            }
        }));

        tracing::info!(room = %id, topic = %topic, mode = %room.mode(), "room created");
        rooms.insert(id, room.clone());
        Ok(room)
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(room_id).cloned()
    }

    pub fn has(&self, room_id: &str) -> bool {
        self.rooms.read().contains_key(room_id)
    }

    pub fn count(&self) -> usize {
        self.rooms.read().len()
    }

    /// All rooms, ordered by id for stable listings.
    pub fn list(&self) -> Vec<Arc<Room>> {
        let mut rooms: Vec<Arc<Room>> = self.rooms.read().values().cloned().collect();
        rooms.sort_by(|a, b| a.id().cmp(b.id()));
        rooms
    }

    /// Shut the room down; its hook removes it from the map.
    pub async fn delete(&self, room_id: &str) -> bool {
        let Some(room) = self.get(room_id) else {
            return false;
        };
        room.shutdown().await;
        true
    }

    /// Case-insensitive substring search over room topics.
    pub fn find_by_topic(&self, keyword: &str) -> Vec<Arc<Room>> {
        let needle = keyword.to_lowercase();
        self.list()
            .into_iter()
            .filter(|room| room.topic().to_lowercase().contains(&needle))
            .collect()
    }

    pub async fn room_infos(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for room in self.list() {
            infos.push(room.info().await);
        }
        infos
    }

    pub async fn shutdown_all(&self) {
        for room in self.list() {
            room.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_store::MemoryRepository;

    fn manager() -> Arc<RoomManager> {
        RoomManager::new(
            Arc::new(MemoryRepository::new()),
            None,
            Vec::new(),
            RoomMode::Deep,
            RoomOptions {
                server_id: "test-node".into(),
                seen_id_limit: 64,
                reap_on_empty: false,
            },
        )
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let manager = manager();
        let room = manager.create(Some("r1".into()), "storage", None).unwrap();
        assert_eq!(room.mode(), RoomMode::Deep);
        assert!(manager.has("r1"));
        assert_eq!(manager.count(), 1);
        assert!(manager.get("r1").is_some());
    }

    #[tokio::test]
    async fn duplicate_id_fails() {
        let manager = manager();
        manager.create(Some("r1".into()), "a", None).unwrap();
        let err = manager.create(Some("r1".into()), "b", None).unwrap_err();
        assert!(matches!(err, Error::State(_)));
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.get("r1").unwrap().topic(), "a");
    }

    #[tokio::test]
    async fn generated_ids_have_room_prefix() {
        let manager = manager();
        let room = manager.create(None, "t", None).unwrap();
        assert!(room.id().starts_with("room-"));
        assert_eq!(room.id().len(), "room-".len() + 8);
    }

    #[tokio::test]
    async fn delete_shuts_down_and_removes() {
        let manager = manager();
        let room = manager.create(Some("r1".into()), "t", None).unwrap();
        assert!(manager.delete("r1").await);
        assert!(room.is_shut());
        assert!(!manager.has("r1"));
        assert!(!manager.delete("r1").await);
    }

    #[tokio::test]
    async fn shutdown_propagates_to_manager() {
        let manager = manager();
        let room = manager.create(Some("r1".into()), "t", None).unwrap();
        room.shutdown().await;
        assert!(!manager.has("r1"));
        // Idempotent: a second shutdown changes nothing.
        room.shutdown().await;
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn find_by_topic_is_case_insensitive_substring() {
        let manager = manager();
        manager
            .create(Some("r1".into()), "Database Storage", None)
            .unwrap();
        manager.create(Some("r2".into()), "caching", None).unwrap();
        manager.create(Some("r3".into()), "UI polish", None).unwrap();

        let hits = manager.find_by_topic("STOR");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "r1");
        assert!(manager.find_by_topic("nothing").is_empty());
    }

    #[tokio::test]
    async fn shutdown_all_empties_the_map() {
        let manager = manager();
        manager.create(Some("r1".into()), "a", None).unwrap();
        manager.create(Some("r2".into()), "b", None).unwrap();
        manager.shutdown_all().await;
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn explicit_mode_overrides_default() {
        let manager = manager();
        let room = manager
            .create(Some("r1".into()), "t", Some(RoomMode::Quick))
            .unwrap();
        assert_eq!(room.mode(), RoomMode::Quick);
    }
}
