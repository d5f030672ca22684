//! UseCase layer: one struct per operation, composed by [`ChatHub`].

pub mod connect_user;
pub mod disconnect_user;
pub mod error;
pub mod get_room_detail;
pub mod get_rooms;
pub mod hub;
pub mod join_room;
pub mod leave_room;
pub mod message_history;
pub mod relay_typing;
pub mod send_message;

pub use connect_user::ConnectUserUseCase;
pub use disconnect_user::DisconnectUserUseCase;
pub use error::{
    DispatchError, GetRoomDetailError, HistoryError, JoinRoomError, LeaveRoomError,
    SendMessageError,
};
pub use get_room_detail::GetRoomDetailUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use hub::{ChatHub, HubOptions};
pub use join_room::{JoinPolicy, JoinRoomUseCase};
pub use leave_room::LeaveRoomUseCase;
pub use message_history::MessageHistoryUseCase;
pub use relay_typing::RelayTypingUseCase;
pub use send_message::SendMessageUseCase;
