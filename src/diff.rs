//! Diff Engine (§4.5): three-way compare over the union of snapshot keys,
//! in ascending lexicographic order, producing typed actions and
//! conflicts, then filtered by sync direction.

use crate::config::SyncDirection;
use crate::types::{Action, Conflict, ConflictKind, Snapshot};
use std::collections::BTreeSet;

/// Result of running the diff engine over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
	pub actions: Vec<Action>,
	pub conflicts: Vec<Conflict>,
}

/// Three-way compare. `include_deletes` governs whether a one-sided
/// disappearance that matches the previous state is reported as a delete
/// or silently skipped (§4.5).
pub fn diff(snapshot: &Snapshot, direction: SyncDirection, include_deletes: bool) -> DiffResult {
	let mut result = DiffResult::default();

	let mut keys: BTreeSet<&str> = BTreeSet::new();
	keys.extend(snapshot.local.keys().map(String::as_str));
	keys.extend(snapshot.remote.keys().map(String::as_str));
	keys.extend(snapshot.prev.keys().map(String::as_str));

	for path in keys {
		let local = snapshot.local.get(path);
		let remote = snapshot.remote.get(path);
		let prev = snapshot.prev.get(path);

		if let (Some(l), Some(r)) = (local, remote) {
			if l.is_dir != r.is_dir {
				result.conflicts.push(Conflict {
					path: path.to_string(),
					kind: ConflictKind::TypeMismatch,
					local: Some(l.clone()),
					remote: Some(r.clone()),
					prev: prev.cloned(),
				});
				continue;
			}
		}

		let local_changed = local.map(|l| is_local_changed(l, prev)).unwrap_or(false);
		let remote_changed = remote.map(|r| is_remote_changed(r, prev)).unwrap_or(false);

		match (local, remote) {
			(Some(_), Some(_)) => {
				if local_changed && remote_changed {
					result.conflicts.push(Conflict {
						path: path.to_string(),
						kind: ConflictKind::BothModified,
						local: local.cloned(),
						remote: remote.cloned(),
						prev: prev.cloned(),
					});
				} else if local_changed {
					result.actions.push(Action::Update { path: path.to_string() });
				} else if remote_changed {
					result.actions.push(Action::Download { path: path.to_string() });
				}
			}

			(Some(l), None) => {
				if l.is_dir {
					let prev_was_dir = prev.map(|p| p.is_dir).unwrap_or(false);
					if !prev_was_dir {
						result.actions.push(Action::MkdirRemote { path: path.to_string() });
					} else if include_deletes {
						result.actions.push(Action::DeleteLocal { path: path.to_string() });
					}
				} else if prev.map(|p| p.has_remote()).unwrap_or(false) {
					if local_changed {
						result.conflicts.push(Conflict {
							path: path.to_string(),
							kind: ConflictKind::RemoteDeletedLocalModified,
							local: local.cloned(),
							remote: None,
							prev: prev.cloned(),
						});
					} else if include_deletes {
						result.actions.push(Action::DeleteLocal { path: path.to_string() });
					} else {
						result.actions.push(Action::Upload { path: path.to_string() });
					}
				} else {
					result.actions.push(Action::Upload { path: path.to_string() });
				}
			}

			(None, Some(r)) => {
				if r.is_dir {
					let prev_was_dir = prev.map(|p| p.is_dir).unwrap_or(false);
					if !prev_was_dir {
						result.actions.push(Action::MkdirLocal { path: path.to_string() });
					} else if include_deletes {
						result.actions.push(Action::DeleteRemote { path: path.to_string() });
					}
				} else if prev.map(|p| p.has_local()).unwrap_or(false) {
					if remote_changed {
						result.conflicts.push(Conflict {
							path: path.to_string(),
							kind: ConflictKind::LocalDeletedRemoteModified,
							local: None,
							remote: remote.cloned(),
							prev: prev.cloned(),
						});
					} else if include_deletes {
						result.actions.push(Action::DeleteRemote { path: path.to_string() });
					} else {
						result.actions.push(Action::Download { path: path.to_string() });
					}
				} else {
					result.actions.push(Action::Download { path: path.to_string() });
				}
			}

			(None, None) => {
				// Both missing but prev present: synchronized deletion, no action.
			}
		}
	}

	result.actions.retain(|a| match direction {
		SyncDirection::Push => a.allowed_in_push(),
		SyncDirection::Pull => a.allowed_in_pull(),
		SyncDirection::Bidirectional => true,
	});

	result
}

fn is_local_changed(local: &crate::types::LocalEntry, prev: Option<&crate::types::SyncEntry>) -> bool {
	match prev {
		None => true,
		Some(p) => {
			if local.is_dir != p.is_dir {
				return true;
			}
			if local.is_dir {
				return false;
			}
			let size_or_mtime_changed = p.local_size != Some(local.size) || p.local_mtime != Some(local.mtime);
			if !size_or_mtime_changed {
				return false;
			}
			if !p.content_hash.is_empty() && !local.hash.is_empty() {
				p.content_hash != local.hash
			} else {
				true
			}
		}
	}
}

fn is_remote_changed(remote: &crate::types::RemoteEntry, prev: Option<&crate::types::SyncEntry>) -> bool {
	match prev {
		None => true,
		Some(p) => {
			if remote.is_dir != p.is_dir {
				return true;
			}
			if remote.is_dir {
				return false;
			}
			if !remote.md5_checksum.is_empty() && !p.remote_md5.is_empty() {
				remote.md5_checksum != p.remote_md5
			} else if !remote.modified_time.is_empty() && p.remote_mtime.is_some() {
				Some(&remote.modified_time) != p.remote_mtime.as_ref()
			} else {
				Some(remote.size) != p.remote_size
			}
		}
	}
}


// vim: ts=4
