//! UseCase: クライアント切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectClientUseCase::execute() メソッド
//! - 切断時の退室と退室通知
//!
//! ### なぜこのテストが必要か
//! - 切断は読み込みエラー・書き込みエラー・サーバー停止など複数の経路から起こるため、
//!   何度呼ばれても退室が一度だけであることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：ルーム参加中の切断
//! - エッジケース：二重の切断、ルーム未参加での切断

use std::sync::Arc;

use crate::domain::{Client, RoomName, RoomRepository};

/// クライアント切断のユースケース
pub struct DisconnectClientUseCase {
    /// Repository（ルームディレクトリの抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl DisconnectClientUseCase {
    /// 新しい DisconnectClientUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// クライアントを Closed 状態にし、参加中のルームから退室させる
    ///
    /// # Returns
    ///
    /// 退室したルーム名。ルーム未参加、または既に切断済みの場合は `None`
    pub async fn execute(&self, client: &mut Client) -> Option<RoomName> {
        let (identity, room_name) = client.close()?;
        if let Some(room) = self.repository.find(&room_name).await {
            room.leave(&identity.username, client.connection_id).await;
        }
        Some(room_name)
    }
}
