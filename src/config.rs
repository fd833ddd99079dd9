//! Per-run options and the small strategy enums used across the engine.
//!
//! `SyncConfig` itself (the persisted profile) lives in `types.rs` next to
//! the other row types; this module holds the process-level knobs that are
//! *not* persisted, plus the direction/policy enums, following the
//! teacher's `FromStr`/`Display`/serde idiom for small strategy types
//! (`strategies.rs`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-invocation options. Not part of the persisted `SyncConfig` row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
	/// Worker count for each concurrent transfer phase. Values `<= 0` are
	/// treated as 1.
	pub concurrency: i32,
	/// Prefer the incremental remote scan when a change token is present.
	pub use_changes: bool,
	/// Whether the diff engine should emit delete actions for paths that
	/// disappeared on one side.
	pub include_deletes: bool,
	/// Compute the plan and summary without touching local or remote state.
	pub dry_run: bool,
	/// Skip the batched delete confirmation and proceed as if it answered
	/// yes.
	pub force: bool,
}

impl Options {
	/// Effective worker count for a concurrent phase (never less than 1).
	pub fn workers(&self) -> usize {
		if self.concurrency <= 0 {
			1
		} else {
			self.concurrency as usize
		}
	}
}

impl Default for Options {
	fn default() -> Self {
		Options { concurrency: 1, use_changes: true, include_deletes: false, dry_run: false, force: false }
	}
}

/// Sync direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
	Push,
	Pull,
	Bidirectional,
}

impl fmt::Display for SyncDirection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			SyncDirection::Push => "push",
			SyncDirection::Pull => "pull",
			SyncDirection::Bidirectional => "bidirectional",
		};
		write!(f, "{}", s)
	}
}

impl FromStr for SyncDirection {
	type Err = crate::error::UnknownPolicy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"push" => Ok(SyncDirection::Push),
			"pull" => Ok(SyncDirection::Pull),
			"bidirectional" => Ok(SyncDirection::Bidirectional),
			other => Err(crate::error::UnknownPolicy(other.to_string())),
		}
	}
}

/// Conflict resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
	LocalWins,
	RemoteWins,
	RenameBoth,
}

impl fmt::Display for ConflictPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConflictPolicy::LocalWins => "local-wins",
			ConflictPolicy::RemoteWins => "remote-wins",
			ConflictPolicy::RenameBoth => "rename-both",
		};
		write!(f, "{}", s)
	}
}

impl FromStr for ConflictPolicy {
	type Err = crate::error::UnknownPolicy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"local-wins" => Ok(ConflictPolicy::LocalWins),
			"remote-wins" => Ok(ConflictPolicy::RemoteWins),
			"rename-both" => Ok(ConflictPolicy::RenameBoth),
			other => Err(crate::error::UnknownPolicy(other.to_string())),
		}
	}
}


// vim: ts=4
