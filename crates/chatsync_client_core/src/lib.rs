#![forbid(unsafe_code)]

//! Client-side reconciliation engine for the chat event stream.
//!
//! The transport layer (out of scope here) delivers one JSON envelope per
//! inbound event; [`run_reconcile_loop`] applies them in arrival order
//! against a [`Reconciler`], whose committed [`Projection`] snapshots are
//! what the surrounding application observes.

use tokio::sync::mpsc;
use tracing::{info, warn};

mod reconcile;
mod store;

pub use reconcile::Reconciler;
pub use store::{Projection, ProjectionSnapshot, Store};

/// Drain the inbound event queue until the transport closes it.
///
/// Exactly one event is decoded and fully reconciled before the next is
/// taken. Undecodable envelopes are logged and dropped; they never stop
/// the loop or touch the projection.
pub async fn run_reconcile_loop(reconciler: &mut Reconciler, mut events: mpsc::Receiver<String>) {
	while let Some(raw) = events.recv().await {
		if let Err(e) = reconciler.handle_json(&raw) {
			warn!(error = %e, "dropping event");
		}
	}
	info!("event stream closed");
}
