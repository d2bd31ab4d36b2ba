//! Core domain models for the chat application.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc, mpsc::error::TrySendError};

use super::{
    error::{ProtocolError, TransportError},
    value_object::{ConnectionId, Email, MessageBody, RoomName, Timestamp, Username},
};

/// Username and email of the synthetic author of join/leave notices
pub const SYSTEM_USERNAME: &str = "Chatbot";

/// Who a client claims to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: Username,
    pub email: Email,
}

impl Identity {
    /// Create an identity supplied by a client.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ReservedUsername` for the system author's name.
    pub fn new(username: Username, email: Email) -> Result<Self, ProtocolError> {
        if username.as_str().eq_ignore_ascii_case(SYSTEM_USERNAME) {
            return Err(ProtocolError::ReservedUsername(username.into_string()));
        }
        Ok(Self { username, email })
    }
}

/// Author of a broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    User(Identity),
    System,
}

impl Author {
    pub fn username(&self) -> &str {
        match self {
            Author::User(identity) => identity.username.as_str(),
            Author::System => SYSTEM_USERNAME,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Author::User(identity) => identity.email.as_str(),
            Author::System => SYSTEM_USERNAME,
        }
    }
}

/// A message broadcast to every member of a room.
///
/// `active_users` and `active_rooms` are empty until the room stamps them
/// right before the message enters its queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: Author,
    pub room: RoomName,
    pub body: MessageBody,
    pub active_users: Vec<Username>,
    pub active_rooms: Vec<RoomName>,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    /// Create an unstamped message
    pub fn new(author: Author, room: RoomName, body: MessageBody, timestamp: Timestamp) -> Self {
        Self {
            author,
            room,
            body,
            active_users: Vec::new(),
            active_rooms: Vec::new(),
            timestamp,
        }
    }

    /// Attach the membership and room-list snapshots
    pub fn stamped(mut self, active_users: Vec<Username>, active_rooms: Vec<RoomName>) -> Self {
        self.active_users = active_users;
        self.active_rooms = active_rooms;
        self
    }
}

/// Something the server pushes to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A room broadcast, shared between all recipients
    Broadcast(Arc<ChatMessage>),
    /// A protocol error reported to the offending client only
    Rejected {
        room: Option<RoomName>,
        reason: String,
    },
}

/// Default number of events buffered per connection
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Sending side of one connection's outbound buffer.
///
/// Sends never wait. When the buffer is full the connection is flagged as
/// lagging, which makes its [`OutboundReceiver`] stop.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::Sender<ServerEvent>,
    lagging: Arc<Notify>,
}

/// Receiving side of a connection's outbound buffer, owned by its writer
#[derive(Debug)]
pub struct OutboundReceiver {
    receiver: mpsc::Receiver<ServerEvent>,
    lagging: Arc<Notify>,
}

impl Outbound {
    /// Create a buffer holding at most `capacity` events (at least 1).
    pub fn channel(capacity: usize) -> (Outbound, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let lagging = Arc::new(Notify::new());
        (
            Outbound {
                sender,
                lagging: Arc::clone(&lagging),
            },
            OutboundReceiver { receiver, lagging },
        )
    }

    /// Buffer `event` for the writer.
    ///
    /// # Errors
    ///
    /// `Closed` once the writer is gone, `Lagging` when the buffer is full.
    pub fn send(&self, event: ServerEvent) -> Result<(), TransportError> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.lagging.notify_one();
                Err(TransportError::Lagging)
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }
}

impl OutboundReceiver {
    /// Next event. `None` once every sender is gone or the connection has
    /// fallen behind.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        tokio::select! {
            biased;
            _ = self.lagging.notified() => None,
            event = self.receiver.recv() => event,
        }
    }

    /// Resolves once the connection has fallen behind
    pub async fn lagged(&self) {
        self.lagging.notified().await;
    }
}

/// What a room keeps per member: identity plus the connection's outbound
/// buffer.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    outbound: Outbound,
}

impl ClientHandle {
    pub fn new(connection_id: ConnectionId, identity: Identity, outbound: Outbound) -> Self {
        Self {
            connection_id,
            identity,
            outbound,
        }
    }

    pub fn username(&self) -> &Username {
        &self.identity.username
    }

    /// Hand an event to the connection's writer without waiting.
    ///
    /// # Errors
    ///
    /// See [`Outbound::send`].
    pub fn send(&self, event: ServerEvent) -> Result<(), TransportError> {
        self.outbound.send(event)
    }
}

/// A decoded inbound protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Identify(Identity),
    Join(RoomName),
    Chat(MessageBody),
    CreateRoom(RoomName),
}

impl ClientCommand {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Identify(_) => "identify",
            ClientCommand::Join(_) => "join",
            ClientCommand::Chat(_) => "message",
            ClientCommand::CreateRoom(_) => "createRoom",
        }
    }
}

/// Protocol state of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unidentified,
    Identified(Identity),
    InRoom { identity: Identity, room: RoomName },
    Closed,
}

/// One connected participant.
///
/// The current room is held by name only and resolved through the room
/// directory whenever it is needed.
#[derive(Debug, Clone)]
pub struct Client {
    pub connection_id: ConnectionId,
    state: SessionState,
}

impl Client {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            state: SessionState::Unidentified,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Identified(identity) | SessionState::InRoom { identity, .. } => {
                Some(identity)
            }
            SessionState::Unidentified | SessionState::Closed => None,
        }
    }

    pub fn current_room(&self) -> Option<&RoomName> {
        match &self.state {
            SessionState::InRoom { room, .. } => Some(room),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Set or replace the identity.
    ///
    /// # Errors
    ///
    /// `AlreadyInRoom` while joined (the room keys its registry by username),
    /// `SessionClosed` after termination.
    pub fn identify(&mut self, identity: Identity) -> Result<(), ProtocolError> {
        match &self.state {
            SessionState::Unidentified | SessionState::Identified(_) => {
                self.state = SessionState::Identified(identity);
                Ok(())
            }
            SessionState::InRoom { room, .. } => {
                Err(ProtocolError::AlreadyInRoom(room.as_str().to_string()))
            }
            SessionState::Closed => Err(ProtocolError::SessionClosed),
        }
    }

    /// Record membership of `room`. The caller has already left any prior room.
    ///
    /// # Errors
    ///
    /// `NotIdentified` before identify, `SessionClosed` after termination.
    pub fn enter_room(&mut self, room: RoomName) -> Result<(), ProtocolError> {
        let identity = match &self.state {
            SessionState::Identified(identity) | SessionState::InRoom { identity, .. } => {
                identity.clone()
            }
            SessionState::Unidentified => return Err(ProtocolError::NotIdentified),
            SessionState::Closed => return Err(ProtocolError::SessionClosed),
        };
        self.state = SessionState::InRoom { identity, room };
        Ok(())
    }

    /// Drop room membership, returning the room that was left
    pub fn leave_room(&mut self) -> Option<RoomName> {
        let state = std::mem::replace(&mut self.state, SessionState::Unidentified);
        match state {
            SessionState::InRoom { identity, room } => {
                self.state = SessionState::Identified(identity);
                Some(room)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Move to `Closed`, returning the room (and identity) to leave.
    ///
    /// A second call returns `None`.
    pub fn close(&mut self) -> Option<(Identity, RoomName)> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::InRoom { identity, room } => Some((identity, room)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factory::ConnectionIdFactory;

    fn identity(name: &str) -> Identity {
        Identity::new(
            Username::new(name.to_string()).unwrap(),
            Email::new(format!("{name}@example.com")).unwrap(),
        )
        .unwrap()
    }

    fn room(name: &str) -> RoomName {
        RoomName::new(name.to_string()).unwrap()
    }

    #[test]
    fn test_client_starts_unidentified() {
        // テスト項目: 新しいクライアントは未識別状態で始まる
        let client = Client::new(ConnectionIdFactory::generate());

        assert_eq!(client.state(), &SessionState::Unidentified);
        assert!(client.identity().is_none());
        assert!(client.current_room().is_none());
    }

    #[test]
    fn test_identify_twice_replaces_identity() {
        // テスト項目: 再識別で identity が置き換わる
        // given (前提条件):
        let mut client = Client::new(ConnectionIdFactory::generate());
        client.identify(identity("alice")).unwrap();

        // when (操作):
        let result = client.identify(identity("alicia"));

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(client.identity().unwrap().username.as_str(), "alicia");
    }

    #[test]
    fn test_identify_in_room_fails() {
        // テスト項目: ルーム参加中は識別情報を変更できない
        // given (前提条件):
        let mut client = Client::new(ConnectionIdFactory::generate());
        client.identify(identity("alice")).unwrap();
        client.enter_room(room("general")).unwrap();

        // when (操作):
        let result = client.identify(identity("mallory"));

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ProtocolError::AlreadyInRoom("general".to_string()))
        );
        assert_eq!(client.identity().unwrap().username.as_str(), "alice");
    }

    #[test]
    fn test_enter_room_requires_identity() {
        // テスト項目: 未識別のクライアントはルームに入れない
        let mut client = Client::new(ConnectionIdFactory::generate());

        let result = client.enter_room(room("general"));

        assert_eq!(result, Err(ProtocolError::NotIdentified));
        assert_eq!(client.state(), &SessionState::Unidentified);
    }

    #[test]
    fn test_leave_room_returns_to_identified() {
        // テスト項目: 退室すると Identified 状態に戻る
        // given (前提条件):
        let mut client = Client::new(ConnectionIdFactory::generate());
        client.identify(identity("alice")).unwrap();
        client.enter_room(room("general")).unwrap();

        // when (操作):
        let left = client.leave_room();

        // then (期待する結果):
        assert_eq!(left, Some(room("general")));
        assert_eq!(client.state(), &SessionState::Identified(identity("alice")));
        assert_eq!(client.leave_room(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        // テスト項目: close は一度だけ退室対象のルームを返す
        // given (前提条件):
        let mut client = Client::new(ConnectionIdFactory::generate());
        client.identify(identity("alice")).unwrap();
        client.enter_room(room("general")).unwrap();

        // when (操作):
        let first = client.close();
        let second = client.close();

        // then (期待する結果):
        assert_eq!(first, Some((identity("alice"), room("general"))));
        assert_eq!(second, None);
        assert!(client.is_closed());
        assert_eq!(
            client.identify(identity("alice")),
            Err(ProtocolError::SessionClosed)
        );
    }

    #[test]
    fn test_reserved_username_rejected() {
        // テスト項目: システム用のユーザー名は使えない
        let result = Identity::new(
            Username::new("chatbot".to_string()).unwrap(),
            Email::default(),
        );

        assert_eq!(
            result,
            Err(ProtocolError::ReservedUsername("chatbot".to_string()))
        );
    }

    fn notice(text: &str) -> ServerEvent {
        ServerEvent::Rejected {
            room: None,
            reason: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_outbound_delivers_in_order() {
        // テスト項目: 送信したイベントが順番に受信できる
        // given (前提条件):
        let (outbound, mut receiver) = Outbound::channel(4);

        // when (操作):
        outbound.send(notice("a")).unwrap();
        outbound.send(notice("b")).unwrap();
        drop(outbound);

        // then (期待する結果):
        assert_eq!(receiver.recv().await, Some(notice("a")));
        assert_eq!(receiver.recv().await, Some(notice("b")));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_outbound_full_marks_connection_lagging() {
        // テスト項目: バッファが満杯になると送信は待たずに失敗し、受信側は終了する
        // given (前提条件): 一度も読まれないバッファ
        let (outbound, mut receiver) = Outbound::channel(2);
        outbound.send(notice("a")).unwrap();
        outbound.send(notice("b")).unwrap();

        // when (操作):
        let result = outbound.send(notice("c"));

        // then (期待する結果):
        assert_eq!(result, Err(TransportError::Lagging));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_outbound_closed_after_receiver_dropped() {
        // テスト項目: 受信側がなくなった後の送信は Closed
        let (outbound, receiver) = Outbound::channel(0);
        drop(receiver);

        assert_eq!(outbound.send(notice("a")), Err(TransportError::Closed));
    }

    #[test]
    fn test_chat_message_stamped() {
        // テスト項目: スナップショットが付与される
        // given (前提条件):
        let message = ChatMessage::new(
            Author::System,
            room("general"),
            MessageBody::new("hello".to_string()).unwrap(),
            Timestamp::new(1000),
        );

        // when (操作):
        let stamped = message.stamped(
            vec![Username::new("alice".to_string()).unwrap()],
            vec![room("general"), room("main")],
        );

        // then (期待する結果):
        assert_eq!(stamped.active_users.len(), 1);
        assert_eq!(stamped.active_rooms.len(), 2);
        assert_eq!(stamped.author.username(), SYSTEM_USERNAME);
    }
}
