#![forbid(unsafe_code)]

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::dto::{
	AddOnlineUserPayload, DeleteMessagePayload, DeleteRoomPayload, LeaveUserPayload, LoadMessagesPayload,
	MessageEventPayload, RemoveOnlineUserPayload, RoomDto,
};

/// Handler-group tags routed to the channels reconciler.
const CHANNEL_HANDLERS: [&str; 2] = ["channels", "chat"];

/// Raw inbound event envelope: `{handler, action, ...payload}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
	pub handler: String,
	pub action: String,
	#[serde(flatten)]
	pub payload: serde_json::Value,
}

/// Errors for decoding inbound envelopes.
#[derive(Debug, Error)]
pub enum WireError {
	/// No handler is registered for this `(handler, action)` pair.
	#[error("no handler registered for {handler}/{action}")]
	UnknownEventKind {
		handler: String,
		action: String,
	},

	/// The tag matched but the payload is missing or mistyped fields.
	#[error("malformed {action} payload: {source}")]
	Malformed {
		action: &'static str,
		#[source]
		source: serde_json::Error,
	},

	/// The envelope itself is not valid JSON of the expected shape.
	#[error("invalid event envelope: {0}")]
	Envelope(#[from] serde_json::Error),
}

/// Closed union of the inbound event kinds the engine reconciles.
///
/// Dispatch is an exhaustive match over this enum; a tag with no variant
/// is rejected at decode time as [`WireError::UnknownEventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
	LoadMessages(LoadMessagesPayload),
	DeleteMessage(DeleteMessagePayload),
	EditMessage(MessageEventPayload),
	PrintMessage(MessageEventPayload),
	AddOnlineUser(AddOnlineUserPayload),
	RemoveOnlineUser(RemoveOnlineUserPayload),
	DeleteRoom(DeleteRoomPayload),
	LeaveUser(LeaveUserPayload),
	AddRoom(RoomDto),
}

impl ChannelEvent {
	/// Stable kind tag, useful for logs.
	pub const fn kind(&self) -> &'static str {
		match self {
			ChannelEvent::LoadMessages(_) => "load-messages",
			ChannelEvent::DeleteMessage(_) => "delete-message",
			ChannelEvent::EditMessage(_) => "edit-message",
			ChannelEvent::PrintMessage(_) => "print-message",
			ChannelEvent::AddOnlineUser(_) => "add-online-user",
			ChannelEvent::RemoveOnlineUser(_) => "remove-online-user",
			ChannelEvent::DeleteRoom(_) => "delete-room",
			ChannelEvent::LeaveUser(_) => "leave-user",
			ChannelEvent::AddRoom(_) => "add-room",
		}
	}

	/// Select the event kind for a decoded envelope.
	///
	/// Action tags are accepted in the original camelCase spelling and the
	/// normalized kebab spelling.
	pub fn from_envelope(env: RawEnvelope) -> Result<Self, WireError> {
		if !CHANNEL_HANDLERS.contains(&env.handler.as_str()) {
			return Err(WireError::UnknownEventKind {
				handler: env.handler,
				action: env.action,
			});
		}

		match env.action.as_str() {
			"loadMessages" | "load-messages" => Ok(ChannelEvent::LoadMessages(payload("load-messages", env.payload)?)),
			"deleteMessage" | "delete-message" => {
				Ok(ChannelEvent::DeleteMessage(payload("delete-message", env.payload)?))
			}
			"editMessage" | "edit-message" => Ok(ChannelEvent::EditMessage(payload("edit-message", env.payload)?)),
			"printMessage" | "print-message" => Ok(ChannelEvent::PrintMessage(payload("print-message", env.payload)?)),
			"addOnlineUser" | "add-online-user" => {
				Ok(ChannelEvent::AddOnlineUser(payload("add-online-user", env.payload)?))
			}
			"removeOnlineUser" | "remove-online-user" => {
				Ok(ChannelEvent::RemoveOnlineUser(payload("remove-online-user", env.payload)?))
			}
			"deleteRoom" | "delete-room" => Ok(ChannelEvent::DeleteRoom(payload("delete-room", env.payload)?)),
			"leaveUser" | "leave-user" => Ok(ChannelEvent::LeaveUser(payload("leave-user", env.payload)?)),
			"addRoom" | "add-room" => Ok(ChannelEvent::AddRoom(payload("add-room", env.payload)?)),
			_ => Err(WireError::UnknownEventKind {
				handler: env.handler,
				action: env.action,
			}),
		}
	}
}

/// Decode one raw JSON envelope into an event.
pub fn decode_event(raw: &str) -> Result<ChannelEvent, WireError> {
	let env: RawEnvelope = serde_json::from_str(raw)?;
	ChannelEvent::from_envelope(env)
}

fn payload<T: DeserializeOwned>(action: &'static str, value: serde_json::Value) -> Result<T, WireError> {
	serde_json::from_value(value).map_err(|source| WireError::Malformed { action, source })
}
