#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context as _;
use chatsync_client_core::{Reconciler, run_reconcile_loop};
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::info;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: chatsync_client [--input file.ndjson]\n\
\n\
Options:\n\
	--input     File with one JSON event envelope per line (default: stdin)\n\
	--help      Show this help\n\
\n\
Notes:\n\
	Each line is an inbound envelope of the form {{\"handler\": ..., \"action\": ..., ...}}.\n\
	Undecodable lines are logged and dropped; the projection is unaffected.\n\
\n\
Examples:\n\
	chatsync_client --input session.ndjson\n\
	generate_events | chatsync_client\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chatsync_client_core=debug".to_string());
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn parse_args() -> Option<PathBuf> {
	let mut input: Option<PathBuf> = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--input" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--input must be non-empty");
					usage_and_exit();
				}
				input = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	input
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let input = parse_args();

	let mut reconciler = Reconciler::new();
	let mut commits = reconciler.watch();
	let (tx, rx) = mpsc::channel::<String>(256);

	let commit_log = tokio::spawn(async move {
		while commits.changed().await.is_ok() {
			let snap = commits.borrow_and_update().clone();
			info!(
				revision = snap.revision,
				rooms = snap.projection.rooms.len(),
				users = snap.projection.users.len(),
				online = snap.projection.online.len(),
				"commit"
			);
		}
	});

	let pump = tokio::spawn(async move {
		run_reconcile_loop(&mut reconciler, rx).await;
		reconciler
	});

	let reader: Box<dyn AsyncRead + Unpin + Send> = match &input {
		Some(path) => Box::new(
			tokio::fs::File::open(path)
				.await
				.with_context(|| format!("open {}", path.display()))?,
		),
		None => Box::new(tokio::io::stdin()),
	};

	let mut lines = BufReader::new(reader).lines();
	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}
		if tx.send(line).await.is_err() {
			break;
		}
	}
	drop(tx);

	let reconciler = pump.await?;
	commit_log.abort();

	let proj = reconciler.projection();
	println!("revision: {}", reconciler.revision());
	println!("users: {} known, {} online", proj.users.len(), proj.online.len());

	let mut rooms: Vec<_> = proj.rooms.values().collect();
	rooms.sort_by_key(|r| r.id);
	for room in rooms {
		println!(
			"room {} ({}): {} messages, {} members, all_loaded={}",
			room.id,
			room.name,
			room.messages.len(),
			room.users.len(),
			room.all_loaded
		);
	}

	Ok(())
}
