//! Per-connection protocol state machine.
//!
//! The socket handler turns every read into a `(message, error)` pair and
//! hands it to [`SessionDispatcher::on_read`]. The dispatcher owns the
//! [`Client`] and drives its state through the use cases.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    domain::{
        Client, ClientCommand, ConnectionId, ConnectionIdFactory, Outbound, ProtocolError,
        RoomRepository, ServerEvent,
    },
    usecase::{
        CreateRoomError, CreateRoomUseCase, DisconnectClientUseCase, JoinRoomError,
        JoinRoomUseCase, SendMessageError, SendMessageUseCase,
    },
};

/// Why a read produced no usable message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("idle timeout")]
    IdleTimeout,

    /// Reported to the client; the session stays open
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Whether the read loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Join(#[from] JoinRoomError),
    #[error(transparent)]
    Send(#[from] SendMessageError),
    #[error(transparent)]
    Create(#[from] CreateRoomError),
}

pub struct SessionDispatcher {
    client: Client,
    outbound: Outbound,
    join_room: JoinRoomUseCase,
    send_message: SendMessageUseCase,
    create_room: CreateRoomUseCase,
    disconnect: DisconnectClientUseCase,
}

impl SessionDispatcher {
    /// Start a session for a new connection. `outbound` feeds its writer.
    pub fn new(repository: Arc<dyn RoomRepository>, outbound: Outbound) -> Self {
        Self {
            client: Client::new(ConnectionIdFactory::generate()),
            outbound,
            join_room: JoinRoomUseCase::new(Arc::clone(&repository)),
            send_message: SendMessageUseCase::new(Arc::clone(&repository)),
            create_room: CreateRoomUseCase::new(Arc::clone(&repository)),
            disconnect: DisconnectClientUseCase::new(repository),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.client.connection_id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Handle one read.
    ///
    /// The message, if any, is dispatched before the error is looked at, so
    /// a read that carries both still delivers its message.
    pub async fn on_read(
        &mut self,
        message: Option<ClientCommand>,
        error: Option<ReadError>,
    ) -> Flow {
        if let Some(command) = message {
            self.dispatch(command).await;
        }

        match error {
            None => Flow::Continue,
            Some(ReadError::Protocol(e)) => {
                tracing::debug!(connection_id = %self.connection_id(), error = %e, "Protocol error");
                self.reject(e.to_string());
                Flow::Continue
            }
            Some(e) => {
                tracing::info!(connection_id = %self.connection_id(), reason = %e, "Closing session");
                self.terminate().await;
                Flow::Terminate
            }
        }
    }

    /// Apply one command. Failures are answered with an error event.
    pub async fn dispatch(&mut self, command: ClientCommand) {
        if self.client.is_closed() {
            tracing::debug!(
                connection_id = %self.connection_id(),
                command = command.kind(),
                "Ignoring command on closed session"
            );
            return;
        }

        let kind = command.kind();
        if let Err(e) = self.apply(command).await {
            tracing::warn!(
                connection_id = %self.connection_id(),
                command = kind,
                error = %e,
                "Command rejected"
            );
            self.reject(e.to_string());
        }
    }

    async fn apply(&mut self, command: ClientCommand) -> Result<(), DispatchError> {
        match command {
            ClientCommand::Identify(identity) => {
                let username = identity.username.clone();
                self.client.identify(identity)?;
                tracing::info!(connection_id = %self.connection_id(), username = %username, "Client identified");
            }
            ClientCommand::Join(room) => {
                self.join_room
                    .execute(&mut self.client, room, &self.outbound)
                    .await?;
            }
            ClientCommand::Chat(body) => {
                self.send_message.execute(&mut self.client, body).await?;
            }
            ClientCommand::CreateRoom(room) => {
                self.create_room.execute(&self.client, room).await?;
            }
        }
        Ok(())
    }

    /// Leave the current room and mark the session closed. Safe to call
    /// more than once.
    pub async fn terminate(&mut self) {
        if let Some(room) = self.disconnect.execute(&mut self.client).await {
            tracing::info!(connection_id = %self.connection_id(), room = %room, "Client disconnected from room");
        }
    }

    fn reject(&self, reason: String) {
        let event = ServerEvent::Rejected {
            room: self.client.current_room().cloned(),
            reason,
        };
        if let Err(e) = self.outbound.send(event) {
            tracing::debug!(connection_id = %self.connection_id(), error = %e, "Rejection not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        domain::{
            Author, ChatMessage, Email, Identity, MessageBody, OutboundReceiver, RoomName,
            SessionState, Username,
        },
        infrastructure::{
            repository::InMemoryRoomRepository,
            room::{DuplicatePolicy, RoomSettings},
        },
    };

    // ========================================
    // 【何をテストするか】
    // - 状態遷移（Unidentified → Identified → InRoom → Closed）
    // - プロトコル違反はエラー応答のみで接続を閉じない
    // - 1 回の読み込みにメッセージとエラーの両方がある場合の処理順
    // ========================================

    type Events = OutboundReceiver;

    fn session(repository: &Arc<InMemoryRoomRepository>) -> (SessionDispatcher, Events) {
        let (tx, rx) = Outbound::channel(64);
        (SessionDispatcher::new(repository.clone(), tx), rx)
    }

    fn identify(name: &str) -> ClientCommand {
        ClientCommand::Identify(
            Identity::new(
                Username::new(name.to_string()).unwrap(),
                Email::new(format!("{name}@example.com")).unwrap(),
            )
            .unwrap(),
        )
    }

    fn room(name: &str) -> RoomName {
        RoomName::new(name.to_string()).unwrap()
    }

    fn chat(text: &str) -> ClientCommand {
        ClientCommand::Chat(MessageBody::new(text.to_string()).unwrap())
    }

    async fn next_event(rx: &mut Events) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    /// Next broadcast not authored by the system
    async fn next_chat(rx: &mut Events) -> Arc<ChatMessage> {
        loop {
            if let ServerEvent::Broadcast(message) = next_event(rx).await
                && message.author != Author::System
            {
                return message;
            }
        }
    }

    async fn next_rejection(rx: &mut Events) -> (Option<RoomName>, String) {
        loop {
            if let ServerEvent::Rejected { room, reason } = next_event(rx).await {
                return (room, reason);
            }
        }
    }

    async fn joined(
        repository: &Arc<InMemoryRoomRepository>,
        name: &str,
        room_name: &str,
    ) -> (SessionDispatcher, Events) {
        let (mut dispatcher, mut rx) = session(repository);
        dispatcher.dispatch(identify(name)).await;
        dispatcher.dispatch(ClientCommand::Join(room(room_name))).await;
        // own join notice
        assert!(matches!(next_event(&mut rx).await, ServerEvent::Broadcast(_)));
        (dispatcher, rx)
    }

    #[tokio::test]
    async fn test_message_before_identify_is_rejected() {
        // テスト項目: 識別前のメッセージはエラー応答になり、セッションは続く
        // given (前提条件):
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut dispatcher, mut rx) = session(&repository);

        // when (操作):
        let flow = dispatcher.on_read(Some(chat("hi")), None).await;

        // then (期待する結果):
        assert_eq!(flow, Flow::Continue);
        let (room, reason) = next_rejection(&mut rx).await;
        assert_eq!(room, None);
        assert_eq!(reason, ProtocolError::NotIdentified.to_string());
        assert_eq!(dispatcher.client().state(), &SessionState::Unidentified);
    }

    #[tokio::test]
    async fn test_join_before_identify_is_rejected() {
        // テスト項目: 識別前の参加はエラー応答になる
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut dispatcher, mut rx) = session(&repository);

        dispatcher.dispatch(ClientCommand::Join(room("general"))).await;

        let (_, reason) = next_rejection(&mut rx).await;
        assert_eq!(reason, ProtocolError::NotIdentified.to_string());
        assert!(repository.names().await.is_empty());
    }

    #[tokio::test]
    async fn test_identify_join_and_chat() {
        // テスト項目: 識別 → 参加 → 送信で自分のメッセージが users 付きで届く
        // given (前提条件):
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut alice, mut rx) = joined(&repository, "alice", "general").await;

        // when (操作):
        let flow = alice.on_read(Some(chat("hello")), None).await;

        // then (期待する結果):
        assert_eq!(flow, Flow::Continue);
        let message = next_chat(&mut rx).await;
        assert_eq!(message.body.as_str(), "hello");
        assert_eq!(message.author.email(), "alice@example.com");
        assert_eq!(message.active_users, vec![Username::new("alice".to_string()).unwrap()]);
        assert_eq!(message.active_rooms, vec![room("general")]);
        assert_eq!(alice.client().current_room(), Some(&room("general")));
    }

    #[tokio::test]
    async fn test_identify_while_in_room_is_rejected() {
        // テスト項目: ルーム参加中の再識別はエラー応答になり、状態は変わらない
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut alice, mut rx) = joined(&repository, "alice", "general").await;

        alice.dispatch(identify("mallory")).await;

        let (room_name, reason) = next_rejection(&mut rx).await;
        assert_eq!(room_name, Some(room("general")));
        assert_eq!(reason, ProtocolError::AlreadyInRoom("general".to_string()).to_string());
        assert_eq!(alice.client().identity().unwrap().username.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_duplicate_join_leaves_client_identified() {
        // テスト項目: 重複したユーザー名での参加はエラー応答になり、Identified 状態になる
        // given (前提条件):
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (_first, _first_rx) = joined(&repository, "alice", "general").await;
        let (mut second, mut rx) = session(&repository);
        second.dispatch(identify("alice")).await;

        // when (操作):
        second.dispatch(ClientCommand::Join(room("general"))).await;

        // then (期待する結果):
        let (room_name, reason) = next_rejection(&mut rx).await;
        assert_eq!(room_name, None);
        assert!(reason.contains("already taken"));
        assert!(matches!(second.client().state(), SessionState::Identified(_)));
    }

    #[tokio::test]
    async fn test_overwrite_policy_replaces_member() {
        // テスト項目: overwrite ポリシーでは後から参加した接続が置き換わる
        // given (前提条件):
        let settings = RoomSettings {
            duplicate_policy: DuplicatePolicy::Overwrite,
            ..RoomSettings::default()
        };
        let repository = Arc::new(InMemoryRoomRepository::new(settings, 8));
        let (mut first, _first_rx) = joined(&repository, "alice", "general").await;
        let (_second, _second_rx) = joined(&repository, "alice", "general").await;

        // when (操作): 置き換えられた接続が切断する
        first.terminate().await;

        // then (期待する結果): 新しい接続の alice は残る
        let general = repository.find(&room("general")).await.unwrap();
        assert_eq!(general.members().await, vec![Username::new("alice".to_string()).unwrap()]);
    }

    #[tokio::test]
    async fn test_replaced_connection_cannot_chat() {
        // テスト項目: 置き換えられた接続には拒否が通知され、その後の送信も拒否されて Identified に戻る
        // given (前提条件): overwrite ポリシーで first が second に置き換えられる
        let settings = RoomSettings {
            duplicate_policy: DuplicatePolicy::Overwrite,
            ..RoomSettings::default()
        };
        let repository = Arc::new(InMemoryRoomRepository::new(settings, 8));
        let (mut first, mut first_rx) = joined(&repository, "alice", "general").await;
        let (mut second, mut second_rx) = joined(&repository, "alice", "general").await;

        let (room_name, reason) = next_rejection(&mut first_rx).await;
        assert_eq!(room_name, Some(room("general")));
        assert!(reason.contains("claimed by another connection"));

        // when (操作):
        let flow = first.on_read(Some(chat("ghost")), None).await;

        // then (期待する結果): セッションは続くが送信は拒否され、ルームには流れない
        assert_eq!(flow, Flow::Continue);
        let (room_name, reason) = next_rejection(&mut first_rx).await;
        assert_eq!(room_name, None);
        assert_eq!(reason, ProtocolError::NotInRoom.to_string());
        assert!(matches!(first.client().state(), SessionState::Identified(_)));

        second.dispatch(chat("real")).await;
        assert_eq!(next_chat(&mut second_rx).await.body.as_str(), "real");
    }

    #[tokio::test]
    async fn test_create_room_does_not_join() {
        // テスト項目: createRoom はルームを作成するが参加はしない
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut alice, _rx) = joined(&repository, "alice", "general").await;

        alice.dispatch(ClientCommand::CreateRoom(room("lobby"))).await;

        assert_eq!(repository.names().await, vec![room("general"), room("lobby")]);
        assert_eq!(alice.client().current_room(), Some(&room("general")));
    }

    #[tokio::test]
    async fn test_message_then_transport_error() {
        // テスト項目: メッセージと転送エラーを同時に受け取った場合、
        //             メッセージを配信してから切断する
        // given (前提条件):
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut bob, mut bob_rx) = joined(&repository, "bob", "general").await;
        let (mut alice, _alice_rx) = joined(&repository, "alice", "general").await;

        // when (操作):
        let flow = alice
            .on_read(
                Some(chat("bye")),
                Some(ReadError::Transport("connection reset".to_string())),
            )
            .await;

        // then (期待する結果):
        assert_eq!(flow, Flow::Terminate);
        assert!(alice.client().is_closed());

        let mut bodies = Vec::new();
        while bodies.len() < 3 {
            if let ServerEvent::Broadcast(message) = next_event(&mut bob_rx).await {
                bodies.push(message.body.as_str().to_string());
            }
        }
        assert_eq!(
            bodies,
            vec![
                "alice has joined the chat.".to_string(),
                "bye".to_string(),
                "alice has left the chat.".to_string(),
            ]
        );
        assert_eq!(
            repository.find(&room("general")).await.unwrap().members().await,
            vec![Username::new("bob".to_string()).unwrap()]
        );
        bob.terminate().await;
    }

    #[tokio::test]
    async fn test_message_then_protocol_error_keeps_session() {
        // テスト項目: メッセージとプロトコルエラーを同時に受け取った場合、
        //             メッセージを配信し、エラー応答を返してセッションを続ける
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut alice, mut rx) = joined(&repository, "alice", "general").await;

        let flow = alice
            .on_read(
                Some(chat("hi")),
                Some(ReadError::Protocol(ProtocolError::Malformed("trailing".to_string()))),
            )
            .await;

        assert_eq!(flow, Flow::Continue);
        let mut saw_chat = false;
        let mut saw_rejection = false;
        while !(saw_chat && saw_rejection) {
            match next_event(&mut rx).await {
                ServerEvent::Broadcast(message) => saw_chat |= message.body.as_str() == "hi",
                ServerEvent::Rejected { .. } => saw_rejection = true,
            }
        }
        assert_eq!(alice.client().current_room(), Some(&room("general")));
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        // テスト項目: 切断は何度呼んでも一度だけ退室し、以降のコマンドは無視される
        // given (前提条件):
        let repository = Arc::new(InMemoryRoomRepository::default());
        let (mut alice, _rx) = joined(&repository, "alice", "general").await;

        // when (操作):
        let flow = alice.on_read(None, Some(ReadError::IdleTimeout)).await;
        alice.terminate().await;
        alice.dispatch(ClientCommand::Join(room("lobby"))).await;

        // then (期待する結果):
        assert_eq!(flow, Flow::Terminate);
        assert!(alice.client().is_closed());
        assert_eq!(repository.names().await, vec![room("general")]);
        let general = repository.find(&room("general")).await.unwrap();
        assert!(general.members().await.is_empty());
    }
}
