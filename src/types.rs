//! Core data model: config rows, transient scan entries, actions and
//! conflicts, and the snapshot the diff engine consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named profile binding one local root to one remote root. Persisted as
/// a `sync_configs` row; read at every plan, updated transactionally at the
/// end of a successful apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
	/// Stable identifier for this config.
	pub id: String,
	/// Absolute local root path.
	pub local_root: String,
	/// Opaque remote root identifier (e.g. a drive folder id).
	pub remote_root_id: String,
	/// Ordered list of exclude patterns, applied in addition to the
	/// built-in default list.
	pub exclude_patterns: Vec<String>,
	/// Conflict resolution policy, as its wire name (`local-wins`, etc.).
	pub conflict_policy: String,
	/// Sync direction, as its wire name (`push`, `pull`, `bidirectional`).
	pub direction: String,
	/// Epoch seconds of the last successful sync, 0 if never synced.
	pub last_sync_time: u64,
	/// Opaque cursor into the remote's change feed, empty if unknown.
	pub last_change_token: String,
}

impl SyncConfig {
	/// Basic structural validation: required fields must be non-empty.
	pub fn validate(&self) -> Result<(), String> {
		if self.id.trim().is_empty() {
			return Err("config id must not be empty".to_string());
		}
		if self.local_root.trim().is_empty() {
			return Err("local root must not be empty".to_string());
		}
		if self.remote_root_id.trim().is_empty() {
			return Err("remote root id must not be empty".to_string());
		}
		Ok(())
	}
}

/// Persisted row, primary key `(config_id, relative_path)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncEntry {
	pub relative_path: String,
	pub is_dir: bool,

	// Local facet.
	pub local_mtime: Option<i64>,
	pub local_size: Option<u64>,
	/// Lowercase hex digest of full contents; empty for directories and for
	/// files whose hash is unknown.
	pub content_hash: String,

	// Remote facet.
	pub drive_file_id: Option<String>,
	pub drive_parent_id: Option<String>,
	/// ISO-8601 UTC string as returned by the remote.
	pub remote_mtime: Option<String>,
	pub remote_size: Option<u64>,
	/// Lowercase hex; empty for remote-native formats.
	pub remote_md5: String,
	pub remote_mime_type: Option<String>,
}

impl SyncEntry {
	pub fn has_local(&self) -> bool {
		self.local_mtime.is_some() || self.local_size.is_some()
	}

	pub fn has_remote(&self) -> bool {
		self.drive_file_id.is_some()
	}
}

/// Transient local-scan result for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
	pub relative_path: String,
	pub absolute_path: String,
	pub is_dir: bool,
	pub size: u64,
	/// Epoch seconds.
	pub mtime: i64,
	/// Lowercase hex digest; empty for directories.
	pub hash: String,
}

/// Transient remote-scan result for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
	pub relative_path: String,
	pub id: String,
	pub parent_id: String,
	pub is_dir: bool,
	pub size: u64,
	/// ISO-8601 UTC string as returned by the remote.
	pub modified_time: String,
	/// Lowercase hex; empty for remote-native formats without a checksum.
	pub md5_checksum: String,
	pub mime_type: String,
}

/// One unit of work produced by the diff engine, fused by rename detection,
/// and consumed by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Upload { path: String },
	Update { path: String },
	Download { path: String },
	DeleteLocal { path: String },
	DeleteRemote { path: String },
	MoveLocal { from: String, to: String },
	MoveRemote { from: String, to: String },
	MkdirLocal { path: String },
	MkdirRemote { path: String },
}

impl Action {
	/// The path this action is keyed by for depth-ordering purposes (the
	/// destination path for moves).
	pub fn path(&self) -> &str {
		match self {
			Action::Upload { path }
			| Action::Update { path }
			| Action::Download { path }
			| Action::DeleteLocal { path }
			| Action::DeleteRemote { path }
			| Action::MkdirLocal { path }
			| Action::MkdirRemote { path } => path,
			Action::MoveLocal { to, .. } | Action::MoveRemote { to, .. } => to,
		}
	}

	/// Path depth (number of `/`-separated segments), used to order
	/// mkdir/delete phases.
	pub fn depth(&self) -> usize {
		self.path().split('/').filter(|s| !s.is_empty()).count()
	}

	/// Whether this action kind is allowed in push mode.
	pub fn allowed_in_push(&self) -> bool {
		matches!(
			self,
			Action::Upload { .. }
				| Action::Update { .. }
				| Action::DeleteRemote { .. }
				| Action::MkdirRemote { .. }
				| Action::MoveRemote { .. }
		)
	}

	/// Whether this action kind is allowed in pull mode.
	pub fn allowed_in_pull(&self) -> bool {
		matches!(
			self,
			Action::Download { .. }
				| Action::DeleteLocal { .. }
				| Action::MkdirLocal { .. }
				| Action::MoveLocal { .. }
		)
	}
}

/// Kind of an unresolved three-way disagreement at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
	BothModified,
	LocalDeletedRemoteModified,
	RemoteDeletedLocalModified,
	TypeMismatch,
}

/// An unresolved disagreement at a path, carrying the three facets so a
/// resolver (or a human) can decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
	pub path: String,
	pub kind: ConflictKind,
	pub local: Option<LocalEntry>,
	pub remote: Option<RemoteEntry>,
	pub prev: Option<SyncEntry>,
}

/// The triple of mappings the diff engine compares, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
	pub local: BTreeMap<String, LocalEntry>,
	pub remote: BTreeMap<String, RemoteEntry>,
	pub prev: BTreeMap<String, SyncEntry>,
}

/// Counts of actions actually executed by an Apply, returned alongside the
/// updated plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
	pub uploads: usize,
	pub updates: usize,
	pub downloads: usize,
	pub deletes: usize,
	pub moves: usize,
	pub mkdirs: usize,
}


// vim: ts=4
