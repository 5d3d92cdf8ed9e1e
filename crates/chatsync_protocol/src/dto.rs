#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chatsync_domain::{FileRef, Message, MessageId, RoomId, Sex, User, UserId};
use serde::{Deserialize, Serialize};

/// Wire shape of a user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
	pub user_id: UserId,
	pub user: String,
	pub sex: Sex,
}

impl UserDto {
	/// Convert into the internal user entity.
	pub fn into_user(self) -> User {
		User {
			id: self.user_id,
			display_name: self.user,
			sex: self.sex,
		}
	}
}

/// Wire shape of a message record. The owning room is carried by the
/// surrounding event, not by the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
	pub id: MessageId,
	pub user_id: UserId,
	pub time: i64,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub symbol: Option<String>,
	#[serde(default)]
	pub files: Option<BTreeMap<String, FileRef>>,
	#[serde(default)]
	pub giphy: Option<String>,
	#[serde(default)]
	pub deleted: Option<bool>,
	#[serde(default)]
	pub edited: Option<i64>,
}

impl MessageDto {
	/// Convert into the internal message entity for `room_id`.
	pub fn into_message(self, room_id: RoomId) -> Message {
		Message {
			id: self.id,
			room_id,
			user_id: self.user_id,
			time: self.time,
			content: self.content,
			symbol: self.symbol,
			files: self.files,
			giphy: self.giphy,
			edited: self.edited,
			deleted: self.deleted,
		}
	}
}

/// Wire shape of a room descriptor. Carries no message data; history is
/// reconciled separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
	pub room_id: RoomId,
	pub name: String,
	pub volume: u32,
	pub notifications: bool,
	pub users: Vec<UserId>,
}

/// One fetched history page for a room, sorted ascending by the server.
/// An empty `content` means no older history remains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMessagesPayload {
	pub room_id: RoomId,
	pub content: Vec<MessageDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
	pub room_id: RoomId,
	pub id: MessageId,
	#[serde(default)]
	pub edited: Option<i64>,
}

/// Payload for events that carry one full message (live receive, edit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEventPayload {
	pub room_id: RoomId,
	#[serde(flatten)]
	pub message: MessageDto,
}

/// Presence gain. `content` is the server's full online roster at send
/// time; reconciliation keys on the user fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOnlineUserPayload {
	#[serde(flatten)]
	pub user: UserDto,
	#[serde(default)]
	pub content: Vec<UserId>,
}

/// Presence loss. The roster in `content` is informational, as above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOnlineUserPayload {
	pub user_id: UserId,
	#[serde(default)]
	pub content: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoomPayload {
	pub room_id: RoomId,
}

/// Full replacement membership for a room. `user_id` is the leaver,
/// carried for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveUserPayload {
	pub room_id: RoomId,
	pub users: Vec<UserId>,
	#[serde(default)]
	pub user_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_dto_converts_to_entity() {
		let dto = UserDto {
			user_id: UserId(7),
			user: "bob".to_string(),
			sex: Sex::Male,
		};

		let user = dto.into_user();
		assert_eq!(user.id, UserId(7));
		assert_eq!(user.display_name, "bob");
		assert_eq!(user.sex, Sex::Male);
	}

	#[test]
	fn message_dto_converts_with_room() {
		let dto: MessageDto = serde_json::from_str(r#"{"id": 5, "userId": 2, "time": 1000, "content": "hey"}"#).unwrap();

		let msg = dto.into_message(RoomId(3));
		assert_eq!(msg.id, MessageId(5));
		assert_eq!(msg.room_id, RoomId(3));
		assert_eq!(msg.content.as_deref(), Some("hey"));
		assert!(msg.files.is_none());
		assert!(msg.edited.is_none());
	}

	#[test]
	fn message_dto_accepts_files_map() {
		let dto: MessageDto = serde_json::from_str(
			r#"{"id": 5, "userId": 2, "time": 1000, "files": {"1": {"url": "/f/1.png", "type": "image"}}}"#,
		)
		.unwrap();

		let files = dto.files.expect("files map");
		assert_eq!(files["1"].url, "/f/1.png");
		assert_eq!(files["1"].kind.as_deref(), Some("image"));
	}
}
