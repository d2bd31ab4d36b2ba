//! UseCase: ルーム作成処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateRoomUseCase::execute() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：未識別のクライアントでも作成できる、作成してもルームには参加しない
//! - 異常系：終了済みセッション、ルーム数の上限
//! - エッジケース：既存のルーム名（同じインスタンスが返る）

use std::sync::Arc;

use crate::domain::{Client, ProtocolError, Room, RoomName, RoomRepository};

use super::error::CreateRoomError;

/// ルーム作成のユースケース
pub struct CreateRoomUseCase {
    /// Repository（ルームディレクトリの抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl CreateRoomUseCase {
    /// 新しい CreateRoomUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// ルーム作成を実行。既に存在する場合はそのルームを返す
    pub async fn execute(
        &self,
        client: &Client,
        name: RoomName,
    ) -> Result<Arc<dyn Room>, CreateRoomError> {
        if client.is_closed() {
            return Err(ProtocolError::SessionClosed.into());
        }
        let room = self.repository.get_or_create(name).await?;
        tracing::debug!(
            connection_id = %client.connection_id,
            room = %room.name(),
            "Room requested by client"
        );
        Ok(room)
    }
}
