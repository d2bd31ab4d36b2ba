//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリのルーム表として使用します。
//!
//! ルームは一度作成されるとプロセス終了（または shutdown）まで残ります。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    domain::{DirectoryError, Room, RoomName, RoomRepository},
    infrastructure::room::{ChatRoom, RoomSettings, RoomTable},
};

/// Default upper bound on the number of rooms
pub const DEFAULT_MAX_ROOMS: usize = 256;

/// インメモリ Room Repository 実装
pub struct InMemoryRoomRepository {
    rooms: Arc<RoomTable>,
    settings: RoomSettings,
    max_rooms: usize,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new(settings: RoomSettings, max_rooms: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            settings,
            max_rooms,
        }
    }
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new(RoomSettings::default(), DEFAULT_MAX_ROOMS)
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn get_or_create(&self, name: RoomName) -> Result<Arc<dyn Room>, DirectoryError> {
        if let Some(room) = self.rooms.read().await.get(&name) {
            return Ok(Arc::clone(room) as Arc<dyn Room>);
        }

        // Re-check under the write lock: another caller may have won the race.
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(&name) {
            return Ok(Arc::clone(room) as Arc<dyn Room>);
        }
        if rooms.len() >= self.max_rooms {
            tracing::warn!(room = %name, max = self.max_rooms, "Room limit reached");
            return Err(DirectoryError::CapacityExceeded {
                name: name.into_string(),
                max: self.max_rooms,
            });
        }

        let room = ChatRoom::spawn(name.clone(), &self.settings, Arc::downgrade(&self.rooms));
        rooms.insert(name, Arc::clone(&room));
        Ok(room as Arc<dyn Room>)
    }

    async fn find(&self, name: &RoomName) -> Option<Arc<dyn Room>> {
        let rooms = self.rooms.read().await;
        rooms.get(name).map(|room| Arc::clone(room) as Arc<dyn Room>)
    }

    async fn names(&self) -> Vec<RoomName> {
        let mut names: Vec<RoomName> = self.rooms.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn rooms(&self) -> Vec<Arc<dyn Room>> {
        let mut rooms: Vec<Arc<dyn Room>> = self
            .rooms
            .read()
            .await
            .values()
            .map(|room| Arc::clone(room) as Arc<dyn Room>)
            .collect();
        rooms.sort_by(|a, b| a.name().cmp(b.name()));
        rooms
    }

    async fn shutdown(&self) {
        let rooms = self.rooms().await;
        for room in &rooms {
            room.stop().await;
        }
        tracing::info!(rooms = rooms.len(), "All broadcast workers stopped");
    }
}
