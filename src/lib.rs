//! # drivesync — local filesystem ↔ cloud drive subtree sync engine
//!
//! `drivesync` keeps one local directory subtree and one remote drive
//! folder subtree consistent with each other: it scans both sides, computes
//! a three-way diff against the last known synchronized state, fuses
//! renames, resolves conflicts per a configured policy, and executes the
//! resulting actions through a small set of traits (`RemoteDriver`,
//! `FilesManager`, `FoldersManager`) so the engine never depends on a
//! specific backend.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use drivesync::engine::Engine;
//! use drivesync::index::SyncIndex;
//! use drivesync::config::Options;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let index = SyncIndex::open("/home/me/.drivesync/index.db".as_ref())?;
//!     let cfg = index.get_config("work").unwrap().expect("profile must exist");
//!     let engine = Engine { driver: &my_driver, files: &my_files, folders: &my_folders, resource_keys: &my_keys };
//!     let plan = engine.plan(&index, &cfg, Options::default()).await?;
//!     println!("{} actions, {} conflicts", plan.actions.len(), plan.conflicts.len());
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod config;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod executor;
pub mod index;
pub mod logging;
pub mod remote;
pub mod rename;
pub mod scan;
pub mod types;
pub mod util;

pub use config::{ConflictPolicy, Options, SyncDirection};
pub use engine::{Engine, Plan};
pub use error::SyncError;
pub use index::SyncIndex;
pub use types::{Action, Conflict, ConflictKind, Summary, SyncConfig, SyncEntry};

// vim: ts=4
