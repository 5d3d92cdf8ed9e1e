#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chatsync_domain::{Message, MessageId, Room, RoomId, User, UserId};
use tokio::sync::watch;
use tracing::debug;

/// The reconciled in-memory view of rooms, users and presence.
///
/// This is the aggregate root: every handler reads and writes this one
/// structure, and it is the unit of atomic commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
	pub users: HashMap<UserId, User>,
	pub rooms: HashMap<RoomId, Room>,
	pub online: HashSet<UserId>,
}

impl Projection {
	pub fn room(&self, id: RoomId) -> Option<&Room> {
		self.rooms.get(&id)
	}

	/// Look up a message by room and id against the current projection.
	pub fn message(&self, room_id: RoomId, id: MessageId) -> Option<&Message> {
		self.rooms.get(&room_id).and_then(|r| r.message(id))
	}
}

/// One committed projection state, as published to observers.
#[derive(Debug, Clone)]
pub struct ProjectionSnapshot {
	pub revision: u64,
	pub projection: Arc<Projection>,
}

/// Single-writer holder of the projection.
///
/// Handlers mutate the working projection through [`Store::apply`]; a
/// snapshot is published only after the handler finishes, so observers
/// never see a partially-applied event. Handlers that report no change
/// publish nothing and leave the revision untouched.
#[derive(Debug)]
pub struct Store {
	projection: Projection,
	revision: u64,
	commits: watch::Sender<ProjectionSnapshot>,
}

impl Store {
	pub fn new() -> Self {
		let initial = ProjectionSnapshot {
			revision: 0,
			projection: Arc::new(Projection::default()),
		};
		let (commits, _) = watch::channel(initial);

		Self {
			projection: Projection::default(),
			revision: 0,
			commits,
		}
	}

	/// Subscribe to committed snapshots.
	pub fn watch(&self) -> watch::Receiver<ProjectionSnapshot> {
		self.commits.subscribe()
	}

	/// The current (committed) projection.
	pub fn projection(&self) -> &Projection {
		&self.projection
	}

	/// Monotonic commit counter; bumps once per mutating event.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Run one handler mutation and commit it if it changed anything.
	pub(crate) fn apply(&mut self, label: &'static str, mutate: impl FnOnce(&mut Projection) -> bool) -> bool {
		let changed = mutate(&mut self.projection);
		if changed {
			self.revision += 1;
			debug!(commit = label, revision = self.revision, "projection committed");
			self.commits.send_replace(ProjectionSnapshot {
				revision: self.revision,
				projection: Arc::new(self.projection.clone()),
			});
		}
		changed
	}
}

impl Default for Store {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use chatsync_domain::Sex;

	use super::*;

	fn user(id: u64) -> User {
		User {
			id: UserId(id),
			display_name: format!("u{id}"),
			sex: Sex::Secret,
		}
	}

	#[test]
	fn apply_commits_only_on_change() {
		let mut store = Store::new();
		let rx = store.watch();
		assert_eq!(rx.borrow().revision, 0);

		let changed = store.apply("test", |p| {
			p.online.insert(UserId(1));
			true
		});
		assert!(changed);
		assert_eq!(store.revision(), 1);
		assert_eq!(rx.borrow().revision, 1);
		assert!(rx.borrow().projection.online.contains(&UserId(1)));

		let changed = store.apply("test", |_| false);
		assert!(!changed);
		assert_eq!(store.revision(), 1);
		assert_eq!(rx.borrow().revision, 1);
	}

	#[test]
	fn snapshots_are_detached_from_later_mutation() {
		let mut store = Store::new();
		let rx = store.watch();

		store.apply("test", |p| {
			p.users.insert(UserId(1), user(1));
			true
		});
		let first = rx.borrow().projection.clone();

		store.apply("test", |p| {
			p.users.insert(UserId(2), user(2));
			true
		});

		assert_eq!(first.users.len(), 1);
		assert_eq!(store.projection().users.len(), 2);
	}

	#[test]
	fn projection_message_lookup_spans_rooms() {
		let mut store = Store::new();
		store.apply("test", |p| {
			p.rooms.insert(
				RoomId(1),
				Room {
					id: RoomId(1),
					name: "general".to_string(),
					volume: 0,
					notifications: false,
					users: HashSet::new(),
					messages: vec![Message {
						id: MessageId(5),
						room_id: RoomId(1),
						user_id: UserId(1),
						time: 100,
						content: None,
						symbol: None,
						files: None,
						giphy: None,
						edited: None,
						deleted: None,
					}],
					all_loaded: false,
				},
			);
			true
		});

		assert!(store.projection().message(RoomId(1), MessageId(5)).is_some());
		assert!(store.projection().message(RoomId(1), MessageId(6)).is_none());
		assert!(store.projection().message(RoomId(2), MessageId(5)).is_none());
	}
}
