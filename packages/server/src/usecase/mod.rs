//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層（セッションディスパッチャ）から呼び出され、Domain 層を操作します。

pub mod create_room;
pub mod disconnect_client;
pub mod error;
pub mod join_room;
pub mod send_message;

pub use create_room::CreateRoomUseCase;
pub use disconnect_client::DisconnectClientUseCase;
pub use error::{CreateRoomError, JoinRoomError, SendMessageError};
pub use join_room::JoinRoomUseCase;
pub use send_message::SendMessageUseCase;
