#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;
use std::collections::{BTreeMap, HashSet};

/// Server-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for UserId {
	fn from(id: u64) -> Self {
		Self(id)
	}
}

/// Server-assigned room identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for RoomId {
	fn from(id: u64) -> Self {
		Self(id)
	}
}

/// Server-assigned message identifier. Meaningful only within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for MessageId {
	fn from(id: u64) -> Self {
		Self(id)
	}
}

/// Errors for parsing enum-like fields from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "errors", derive(thiserror::Error))]
pub enum ParseSexError {
	#[cfg_attr(feature = "errors", error("empty value"))]
	Empty,
	#[cfg_attr(feature = "errors", error("unknown sex: {0}"))]
	Unknown(String),
}

/// Profile sex field. The wire sends full words; single-letter forms are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sex {
	#[cfg_attr(feature = "serde", serde(alias = "M", alias = "male", alias = "m"))]
	Male,
	#[cfg_attr(feature = "serde", serde(alias = "F", alias = "female", alias = "f"))]
	Female,
	#[cfg_attr(feature = "serde", serde(alias = "S", alias = "secret", alias = "s"))]
	Secret,
}

impl Sex {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Sex::Male => "Male",
			Sex::Female => "Female",
			Sex::Secret => "Secret",
		}
	}
}

impl fmt::Display for Sex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Sex {
	type Err = ParseSexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseSexError::Empty);
		}

		match s.to_ascii_lowercase().as_str() {
			"male" | "m" => Ok(Sex::Male),
			"female" | "f" => Ok(Sex::Female),
			"secret" | "s" => Ok(Sex::Secret),
			other => Err(ParseSexError::Unknown(other.to_string())),
		}
	}
}

/// A known chat user. Identity is the id; created on first sighting and
/// never structurally deleted (presence is tracked separately).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct User {
	pub id: UserId,
	pub display_name: String,
	pub sex: Sex,
}

/// Attachment reference carried on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileRef {
	pub url: String,
	#[cfg_attr(feature = "serde", serde(rename = "type", default))]
	pub kind: Option<String>,
}

/// One chat message. Identity is `(room_id, id)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Message {
	pub id: MessageId,
	pub room_id: RoomId,
	pub user_id: UserId,
	/// Unix milliseconds, server clock.
	pub time: i64,
	pub content: Option<String>,
	pub symbol: Option<String>,
	/// Attachments keyed by file id (JSON object keys, so strings).
	pub files: Option<BTreeMap<String, FileRef>>,
	pub giphy: Option<String>,
	/// Edit counter; `None` when never edited.
	pub edited: Option<i64>,
	pub deleted: Option<bool>,
}

/// One room and its reconciled message history.
///
/// Invariants: `messages` stays sorted ascending by `time`, with at most
/// one entry per message id; `users` has no duplicates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Room {
	pub id: RoomId,
	pub name: String,
	pub volume: u32,
	pub notifications: bool,
	pub users: HashSet<UserId>,
	pub messages: Vec<Message>,
	/// True once an empty history page signalled that no older messages
	/// remain to be fetched.
	pub all_loaded: bool,
}

impl Room {
	/// Find a message in this room by id.
	pub fn message(&self, id: MessageId) -> Option<&Message> {
		self.messages.iter().find(|m| m.id == id)
	}

	/// Position of a message in the ordered sequence.
	pub fn message_position(&self, id: MessageId) -> Option<usize> {
		self.messages.iter().position(|m| m.id == id)
	}
}
