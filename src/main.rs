use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Arg, ArgAction, Command};

use drivesync::config::{ConflictPolicy, SyncDirection};
use drivesync::index::SyncIndex;
use drivesync::logging;
use drivesync::types::SyncConfig;

/// Resolves `$HOME/.drivesync`, creating it if necessary. Mirrors the
/// teacher's state-directory convention (`main.rs::init_syncr_dir`).
fn init_state_dir() -> PathBuf {
	let home = env::var("HOME").unwrap_or_else(|_| {
		eprintln!("could not determine HOME directory");
		std::process::exit(1);
	});
	let dir = PathBuf::from(home).join(".drivesync");
	if let Err(err) = std::fs::create_dir_all(&dir) {
		eprintln!("cannot create state directory {:?}: {}", dir, err);
		std::process::exit(1);
	}
	dir
}

fn open_index(state_dir: &std::path::Path) -> SyncIndex {
	match SyncIndex::open(&state_dir.join("index.db")) {
		Ok(index) => index,
		Err(err) => {
			eprintln!("cannot open sync index: {}", err);
			std::process::exit(1);
		}
	}
}

#[tokio::main]
async fn main() {
	logging::init_tracing();

	let matches = Command::new("drivesync")
		.version("0.1.0")
		.about("Local directory <-> cloud drive subtree sync engine")
		.subcommand_required(true)
		.subcommand(
			Command::new("config")
				.about("Manage sync profiles")
				.subcommand_required(true)
				.subcommand(
					Command::new("add")
						.about("Add or replace a sync profile")
						.arg(Arg::new("id").required(true))
						.arg(Arg::new("local-root").long("local-root").required(true))
						.arg(Arg::new("remote-root-id").long("remote-root-id").required(true))
						.arg(Arg::new("direction").long("direction").default_value("bidirectional"))
						.arg(Arg::new("conflict-policy").long("conflict-policy").default_value("rename-both"))
						.arg(Arg::new("exclude").long("exclude").action(ArgAction::Append).num_args(1)),
				)
				.subcommand(Command::new("list").about("List sync profiles"))
				.subcommand(Command::new("show").about("Show one sync profile").arg(Arg::new("id").required(true)))
				.subcommand(Command::new("remove").about("Remove a sync profile and its indexed entries").arg(Arg::new("id").required(true))),
		)
		.get_matches();

	let state_dir = init_state_dir();

	if let Some(matches) = matches.subcommand_matches("config") {
		let index = open_index(&state_dir);

		if let Some(matches) = matches.subcommand_matches("add") {
			let direction = matches.get_one::<String>("direction").unwrap();
			let policy = matches.get_one::<String>("conflict-policy").unwrap();
			if let Err(err) = SyncDirection::from_str(direction) {
				eprintln!("{}", err);
				std::process::exit(1);
			}
			if let Err(err) = ConflictPolicy::from_str(policy) {
				eprintln!("{}", err);
				std::process::exit(1);
			}

			let cfg = SyncConfig {
				id: matches.get_one::<String>("id").unwrap().clone(),
				local_root: matches.get_one::<String>("local-root").unwrap().clone(),
				remote_root_id: matches.get_one::<String>("remote-root-id").unwrap().clone(),
				exclude_patterns: matches.get_many::<String>("exclude").map(|v| v.cloned().collect()).unwrap_or_default(),
				conflict_policy: policy.clone(),
				direction: direction.clone(),
				last_sync_time: 0,
				last_change_token: String::new(),
			};

			if let Err(message) = cfg.validate() {
				eprintln!("invalid profile: {}", message);
				std::process::exit(1);
			}
			if let Err(err) = index.upsert_config(&cfg) {
				eprintln!("cannot save profile: {}", err);
				std::process::exit(1);
			}
			println!("saved profile {:?}", cfg.id);
		} else if matches.subcommand_matches("list").is_some() {
			match index.list_configs() {
				Ok(configs) => {
					for cfg in configs {
						println!("{}  {} <-> {}  [{}, {}]", cfg.id, cfg.local_root, cfg.remote_root_id, cfg.direction, cfg.conflict_policy);
					}
				}
				Err(err) => {
					eprintln!("cannot list profiles: {}", err);
					std::process::exit(1);
				}
			}
		} else if let Some(matches) = matches.subcommand_matches("show") {
			let id = matches.get_one::<String>("id").unwrap();
			match index.get_config(id) {
				Ok(Some(cfg)) => println!("{:#?}", cfg),
				Ok(None) => {
					eprintln!("no such profile: {}", id);
					std::process::exit(1);
				}
				Err(err) => {
					eprintln!("cannot read profile: {}", err);
					std::process::exit(1);
				}
			}
		} else if let Some(matches) = matches.subcommand_matches("remove") {
			let id = matches.get_one::<String>("id").unwrap();
			if let Err(err) = index.delete_config(id) {
				eprintln!("cannot remove profile: {}", err);
				std::process::exit(1);
			}
			println!("removed profile {:?}", id);
		}
	}
}

// vim: ts=4
