#![forbid(unsafe_code)]

pub mod dto;
pub mod envelope;

pub use dto::{
	AddOnlineUserPayload, DeleteMessagePayload, DeleteRoomPayload, LeaveUserPayload, LoadMessagesPayload,
	MessageDto, MessageEventPayload, RemoveOnlineUserPayload, RoomDto, UserDto,
};
pub use envelope::{ChannelEvent, RawEnvelope, WireError, decode_event};
