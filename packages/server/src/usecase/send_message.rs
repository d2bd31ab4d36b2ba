//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - 現在のルームのキューへのチャットメッセージ投入
//!
//! ### なぜこのテストが必要か
//! - ルーム参加前の送信を防ぐ
//! - 送信者を含むルームの全員に配信されることを確認
//! - 停止済みのルームへの送信がエラーになることを保証
//! - 別接続に置き換えられたクライアントの送信が拒否されることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加中のルームへの送信
//! - 異常系：未識別・未参加、ルームが見つからない、ルーム停止済み、置き換え済み

use std::sync::Arc;

use crate::domain::{
    Author, ChatMessage, Client, MessageBody, ProtocolError, RoomError, RoomRepository,
    SessionState, Timestamp,
};

use super::error::SendMessageError;

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// Repository（ルームディレクトリの抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// メッセージ送信を実行
    ///
    /// キューが満杯の間は空きが出るまで待機する。
    ///
    /// # Arguments
    ///
    /// * `client` - 送信者（ルーム参加中であること）。メンバーでなくなっていれば Identified に戻す
    /// * `body` - メッセージ本文（Domain Model）
    ///
    /// # Returns
    ///
    /// * `Ok(())` - キューへの投入成功
    /// * `Err(SendMessageError)` - 送信失敗
    pub async fn execute(
        &self,
        client: &mut Client,
        body: MessageBody,
    ) -> Result<(), SendMessageError> {
        let (identity, room_name) = match client.state() {
            SessionState::InRoom { identity, room } => (identity.clone(), room.clone()),
            SessionState::Unidentified => return Err(ProtocolError::NotIdentified.into()),
            SessionState::Identified(_) => return Err(ProtocolError::NotInRoom.into()),
            SessionState::Closed => return Err(ProtocolError::SessionClosed.into()),
        };

        let room = self
            .repository
            .find(&room_name)
            .await
            .ok_or_else(|| RoomError::QueueClosed(room_name.as_str().to_string()))?;

        if !room.is_member(&identity.username, client.connection_id).await {
            tracing::info!(
                room = %room_name,
                username = %identity.username,
                "Client no longer holds its membership"
            );
            client.leave_room();
            return Err(ProtocolError::NotInRoom.into());
        }

        let message = ChatMessage::new(Author::User(identity), room_name, body, Timestamp::now());
        room.enqueue(message).await?;
        Ok(())
    }
}
