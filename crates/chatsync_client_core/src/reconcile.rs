#![forbid(unsafe_code)]

use std::collections::HashSet;

use chatsync_domain::{Message, MessageId, Room, UserId};
use chatsync_protocol::{
	AddOnlineUserPayload, ChannelEvent, DeleteMessagePayload, DeleteRoomPayload, LeaveUserPayload,
	LoadMessagesPayload, MessageEventPayload, RemoveOnlineUserPayload, RoomDto, UserDto, WireError, decode_event,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::{Projection, ProjectionSnapshot, Store};

/// The state-reconciliation engine.
///
/// Consumes one decoded event at a time and folds it into the projection.
/// Every error class is contained at the single-event boundary: a missing
/// reference or duplicate delivery degrades to a diagnostic no-op, never
/// to a propagated failure.
#[derive(Debug, Default)]
pub struct Reconciler {
	store: Store,
}

impl Reconciler {
	pub fn new() -> Self {
		Self { store: Store::new() }
	}

	/// The current committed projection.
	pub fn projection(&self) -> &Projection {
		self.store.projection()
	}

	/// Commit counter of the underlying store.
	pub fn revision(&self) -> u64 {
		self.store.revision()
	}

	/// Subscribe to committed projection snapshots.
	pub fn watch(&self) -> watch::Receiver<ProjectionSnapshot> {
		self.store.watch()
	}

	/// Decode one raw envelope and reconcile it.
	///
	/// Undecodable input leaves the projection untouched.
	pub fn handle_json(&mut self, raw: &str) -> Result<(), WireError> {
		let event = decode_event(raw)?;
		self.handle(event);
		Ok(())
	}

	/// Route one inbound event to its handler.
	pub fn handle(&mut self, event: ChannelEvent) {
		debug!(event_kind = event.kind(), "dispatching event");
		match event {
			ChannelEvent::LoadMessages(p) => self.load_messages(p),
			ChannelEvent::DeleteMessage(p) => self.delete_message(p),
			ChannelEvent::EditMessage(p) => self.edit_message(p),
			ChannelEvent::PrintMessage(p) => self.print_message(p),
			ChannelEvent::AddOnlineUser(p) => self.add_online_user(p),
			ChannelEvent::RemoveOnlineUser(p) => self.remove_online_user(p),
			ChannelEvent::DeleteRoom(p) => self.delete_room(p),
			ChannelEvent::LeaveUser(p) => self.leave_user(p),
			ChannelEvent::AddRoom(p) => self.add_room(p),
		}
	}

	/// Merge one fetched history page into a room.
	///
	/// An empty page is the sentinel for "no more history": it only flips
	/// `all_loaded`. A non-empty page is deduplicated by id against the
	/// current sequence, then merged by timestamp — pages are fetched in
	/// reverse-chronological batches, so a blind append would break the
	/// sort invariant whenever ranges overlap.
	fn load_messages(&mut self, p: LoadMessagesPayload) {
		let LoadMessagesPayload { room_id, content } = p;

		self.store.apply("load-messages", |proj| {
			let Some(room) = proj.rooms.get_mut(&room_id) else {
				debug!(%room_id, "history page for unknown room");
				return false;
			};

			if content.is_empty() {
				if room.all_loaded {
					return false;
				}
				debug!(%room_id, "empty history page, marking room fully loaded");
				room.all_loaded = true;
				return true;
			}

			let mut seen: HashSet<MessageId> = room.messages.iter().map(|m| m.id).collect();
			let mut fresh: Vec<Message> = content
				.into_iter()
				.filter(|d| seen.insert(d.id))
				.map(|d| d.into_message(room_id))
				.collect();

			if fresh.is_empty() {
				debug!(%room_id, "history page contained only known messages");
				return false;
			}

			// The server sorts each page, but the invariant should not
			// depend on that.
			fresh.sort_by_key(|m| m.time);
			let merged = fresh.len();
			merge_by_time(&mut room.messages, fresh);
			debug!(%room_id, merged, total = room.messages.len(), "merged history page");
			true
		});
	}

	fn delete_message(&mut self, p: DeleteMessagePayload) {
		let DeleteMessagePayload { room_id, id, .. } = p;

		self.store.apply("delete-message", |proj| {
			let Some(room) = proj.rooms.get_mut(&room_id) else {
				debug!(%room_id, %id, "unable to find room to delete message from");
				return false;
			};

			match room.message_position(id) {
				Some(at) => {
					room.messages.remove(at);
					debug!(%room_id, %id, "deleted message");
					true
				}
				None => {
					// May race with a not-yet-loaded history page.
					debug!(%room_id, %id, "unable to find message to delete");
					false
				}
			}
		});
	}

	/// Replace a message's stored fields wholesale, keeping its position
	/// in the ordered sequence.
	fn edit_message(&mut self, p: MessageEventPayload) {
		let MessageEventPayload { room_id, message } = p;
		let id = message.id;

		self.store.apply("edit-message", |proj| {
			let Some(room) = proj.rooms.get_mut(&room_id) else {
				debug!(%room_id, %id, "unable to find room to edit message in");
				return false;
			};

			let Some(at) = room.message_position(id) else {
				debug!(%room_id, %id, "unable to find message to edit");
				return false;
			};

			let updated = message.into_message(room_id);
			if room.messages[at] == updated {
				debug!(%room_id, %id, "edit already applied");
				return false;
			}
			room.messages[at] = updated;
			debug!(%room_id, %id, "edited message");
			true
		});
	}

	/// Insert a freshly arrived live message at its timestamp position.
	///
	/// Duplicate delivery (reconnect redelivery) is skipped by id. Equal
	/// timestamps keep arrival order.
	fn print_message(&mut self, p: MessageEventPayload) {
		let MessageEventPayload { room_id, message } = p;

		self.store.apply("print-message", |proj| {
			let Some(room) = proj.rooms.get_mut(&room_id) else {
				debug!(%room_id, id = %message.id, "live message for unknown room");
				return false;
			};

			if room.message(message.id).is_some() {
				debug!(%room_id, id = %message.id, "skipping live message already in list");
				return false;
			}

			let msg = message.into_message(room_id);
			let at = room.messages.partition_point(|m| m.time <= msg.time);
			debug!(%room_id, id = %msg.id, at, "storing live message");
			room.messages.insert(at, msg);
			true
		});
	}

	fn add_online_user(&mut self, p: AddOnlineUserPayload) {
		let AddOnlineUserPayload { user, content } = p;
		let id = user.user_id;
		let roster = content.len();

		self.store.apply("add-online-user", |proj| {
			let mut changed = false;
			if !proj.users.contains_key(&id) {
				debug!(user_id = %id, "first sighting, creating user");
				proj.users.insert(id, user.into_user());
				changed = true;
			}
			if proj.online.insert(id) {
				debug!(user_id = %id, roster, "user came online");
				changed = true;
			}
			changed
		});
	}

	fn remove_online_user(&mut self, p: RemoveOnlineUserPayload) {
		let RemoveOnlineUserPayload { user_id, .. } = p;

		self.store.apply("remove-online-user", |proj| {
			if proj.online.remove(&user_id) {
				debug!(%user_id, "user went offline");
				true
			} else {
				// Absence is not an error.
				debug!(%user_id, "offline event for user not in online set");
				false
			}
		});
	}

	fn delete_room(&mut self, p: DeleteRoomPayload) {
		let DeleteRoomPayload { room_id } = p;

		self.store.apply("delete-room", |proj| {
			if proj.rooms.remove(&room_id).is_some() {
				debug!(%room_id, "deleted room");
				true
			} else {
				warn!(%room_id, "unable to find room to delete");
				false
			}
		});
	}

	/// Replace a room's membership with the provided set.
	fn leave_user(&mut self, p: LeaveUserPayload) {
		let LeaveUserPayload { room_id, users, user_id } = p;

		self.store.apply("leave-user", |proj| {
			let Some(room) = proj.rooms.get_mut(&room_id) else {
				warn!(%room_id, leaver = ?user_id, "unable to find room to update membership");
				return false;
			};

			let next: HashSet<UserId> = users.into_iter().collect();
			if room.users == next {
				return false;
			}
			debug!(%room_id, members = next.len(), leaver = ?user_id, "replaced room membership");
			room.users = next;
			true
		});
	}

	/// Insert a freshly created room. A new room has no history to page
	/// in, so it starts fully loaded. A duplicate id overwrites.
	fn add_room(&mut self, dto: RoomDto) {
		let room_id = dto.room_id;

		self.store.apply("add-room", |proj| {
			let room = Room {
				id: dto.room_id,
				name: dto.name,
				volume: dto.volume,
				notifications: dto.notifications,
				users: dto.users.into_iter().collect(),
				messages: Vec::new(),
				all_loaded: true,
			};
			if proj.rooms.insert(room_id, room).is_some() {
				debug!(%room_id, "add-room replaced an existing room");
			} else {
				debug!(%room_id, "added room");
			}
			true
		});
	}

	/// Replace the entire user collection.
	pub fn set_users(&mut self, users: Vec<UserDto>) {
		self.store.apply("set-users", |proj| {
			replace_users(proj, users);
			true
		});
	}

	/// Replace the room collection wholesale, preserving already fetched
	/// history and `all_loaded` for rooms that exist locally.
	pub fn set_rooms(&mut self, rooms: Vec<RoomDto>) {
		self.store.apply("set-rooms", |proj| {
			replace_rooms(proj, rooms);
			true
		});
	}

	/// Replace the online set wholesale.
	pub fn set_online(&mut self, online: Vec<UserId>) {
		self.store.apply("set-online", |proj| {
			replace_online(proj, online);
			true
		});
	}

	/// Apply a connection-establishment snapshot (rooms, users, online)
	/// as one atomic commit.
	pub fn bootstrap(&mut self, rooms: Vec<RoomDto>, users: Vec<UserDto>, online: Vec<UserId>) {
		self.store.apply("bootstrap", |proj| {
			replace_rooms(proj, rooms);
			replace_users(proj, users);
			replace_online(proj, online);
			true
		});
	}
}

fn replace_users(proj: &mut Projection, users: Vec<UserDto>) {
	debug!(count = users.len(), "setting users");
	proj.users = users.into_iter().map(|u| (u.user_id, u.into_user())).collect();
}

fn replace_rooms(proj: &mut Projection, rooms: Vec<RoomDto>) {
	debug!(count = rooms.len(), "setting rooms");
	let mut old = std::mem::take(&mut proj.rooms);

	for dto in rooms {
		let (messages, all_loaded) = match old.remove(&dto.room_id) {
			Some(prev) => (prev.messages, prev.all_loaded),
			None => (Vec::new(), false),
		};
		proj.rooms.insert(
			dto.room_id,
			Room {
				id: dto.room_id,
				name: dto.name,
				volume: dto.volume,
				notifications: dto.notifications,
				users: dto.users.into_iter().collect(),
				messages,
				all_loaded,
			},
		);
	}
}

fn replace_online(proj: &mut Projection, online: Vec<UserId>) {
	debug!(count = online.len(), "setting online");
	proj.online = online.into_iter().collect();
}

/// Stable two-run merge by timestamp; existing entries win ties.
///
/// Both runs must already be sorted ascending by `time`.
fn merge_by_time(existing: &mut Vec<Message>, incoming: Vec<Message>) {
	if existing.is_empty() {
		*existing = incoming;
		return;
	}

	let cap = existing.len() + incoming.len();
	let old = std::mem::replace(existing, Vec::with_capacity(cap));
	let mut a = old.into_iter().peekable();
	let mut b = incoming.into_iter().peekable();

	loop {
		match (a.peek(), b.peek()) {
			(Some(x), Some(y)) => {
				if x.time <= y.time {
					existing.push(a.next().expect("peeked"));
				} else {
					existing.push(b.next().expect("peeked"));
				}
			}
			(Some(_), None) => existing.push(a.next().expect("peeked")),
			(None, Some(_)) => existing.push(b.next().expect("peeked")),
			(None, None) => break,
		}
	}
}
