//! UseCase: ルーム参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - 参加処理（前のルームからの退室、ルームの取得または作成、レジストリへの登録）
//!
//! ### なぜこのテストが必要か
//! - 識別前の参加を防ぐ
//! - 同じルームへの再参加は何もしないことを保証
//! - 参加に失敗したクライアントが Identified 状態に戻ることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：新しいルームへの参加、別ルームへの移動
//! - 異常系：未識別、ユーザー名の重複、ルーム数の上限
//! - エッジケース：同じルームへの再参加、置き換えられた後の再参加

use std::sync::Arc;

use crate::domain::{Client, ClientHandle, Outbound, ProtocolError, RoomName, RoomRepository};

use super::error::JoinRoomError;

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    /// Repository（ルームディレクトリの抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl JoinRoomUseCase {
    /// 新しい JoinRoomUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// ルーム参加を実行
    ///
    /// # Arguments
    ///
    /// * `client` - 参加するクライアント（状態はここで更新される）
    /// * `room` - 参加先のルーム名
    /// * `outbound` - クライアントへの送信バッファ
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 参加成功（メンバーのままの同じルームへの再参加を含む）
    /// * `Err(JoinRoomError)` - 参加失敗。前のルームからは退室済み
    pub async fn execute(
        &self,
        client: &mut Client,
        room: RoomName,
        outbound: &Outbound,
    ) -> Result<(), JoinRoomError> {
        if client.is_closed() {
            return Err(ProtocolError::SessionClosed.into());
        }
        let identity = client
            .identity()
            .cloned()
            .ok_or(ProtocolError::NotIdentified)?;

        // 同じルームでも、別接続に置き換えられていれば参加し直す
        if client.current_room() == Some(&room)
            && let Some(current) = self.repository.find(&room).await
            && current.is_member(&identity.username, client.connection_id).await
        {
            return Ok(());
        }

        // 1. 前のルームから退室
        if let Some(previous) = client.leave_room()
            && let Some(previous_room) = self.repository.find(&previous).await
        {
            previous_room
                .leave(&identity.username, client.connection_id)
                .await;
        }

        // 2. 参加先のルームを取得（なければ作成）して登録
        let target = self.repository.get_or_create(room.clone()).await?;
        target
            .join(ClientHandle::new(
                client.connection_id,
                identity,
                outbound.clone(),
            ))
            .await?;

        client.enter_room(room)?;
        Ok(())
    }
}
