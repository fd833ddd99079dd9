//! Rename Detection (§4.6): collapses an Upload+DeleteRemote pair that share
//! a content hash into a single MoveRemote, and a Download-or-MkdirLocal
//! paired with a DeleteLocal that share a drive file id into a single
//! MoveLocal. Ambiguous ties (more than one candidate for the same key) are
//! left unfused; running the pass twice over its own output is a no-op.

use std::collections::{HashMap, HashSet};

use crate::types::{Action, Snapshot};

pub fn detect_renames(actions: Vec<Action>, snapshot: &Snapshot) -> Vec<Action> {
	let actions = fuse_local_renames(actions, snapshot);
	fuse_remote_renames(actions, snapshot)
}

/// Local file renamed/moved: disappears from one path, reappears at
/// another with the same content hash. Fuses the resulting Upload (new
/// path) and DeleteRemote (old path) into one MoveRemote.
fn fuse_local_renames(actions: Vec<Action>, snapshot: &Snapshot) -> Vec<Action> {
	// Collect every disappeared-entry hash, then keep only the hashes with
	// exactly one candidate: a hash shared by two or more deletions is
	// ambiguous and must be left unfused (§4.6).
	let mut by_hash: HashMap<&str, Vec<&str>> = HashMap::new();
	for action in &actions {
		if let Action::DeleteRemote { path } = action {
			if let Some(prev) = snapshot.prev.get(path) {
				if !prev.is_dir && !prev.content_hash.is_empty() {
					by_hash.entry(prev.content_hash.as_str()).or_default().push(path.as_str());
				}
			}
		}
	}
	let candidates_by_hash: HashMap<&str, &str> =
		by_hash.into_iter().filter(|(_, paths)| paths.len() == 1).map(|(hash, paths)| (hash, paths[0])).collect();

	let mut consumed_delete_remote: HashSet<String> = HashSet::new();
	let mut consumed_upload: HashSet<String> = HashSet::new();
	let mut moves = Vec::new();

	for action in &actions {
		if let Action::Upload { path } = action {
			let local = match snapshot.local.get(path) {
				Some(l) if !l.hash.is_empty() => l,
				_ => continue,
			};
			let old_path = match candidates_by_hash.get(local.hash.as_str()) {
				Some(p) => *p,
				None => continue,
			};
			if old_path == path.as_str() || consumed_delete_remote.contains(old_path) {
				continue;
			}
			moves.push(Action::MoveRemote { from: old_path.to_string(), to: path.clone() });
			consumed_delete_remote.insert(old_path.to_string());
			consumed_upload.insert(path.clone());
		}
	}

	let mut result: Vec<Action> = actions
		.into_iter()
		.filter(|a| match a {
			Action::Upload { path } => !consumed_upload.contains(path),
			Action::DeleteRemote { path } => !consumed_delete_remote.contains(path),
			_ => true,
		})
		.collect();
	result.extend(moves);
	result
}

/// Remote file or folder renamed/moved: disappears from one path,
/// reappears at another with the same drive file id. Fuses the resulting
/// Download-or-MkdirLocal (new path) and DeleteLocal (old path) into one
/// MoveLocal.
fn fuse_remote_renames(actions: Vec<Action>, snapshot: &Snapshot) -> Vec<Action> {
	let mut candidates_by_id: HashMap<&str, &str> = HashMap::new();
	for action in &actions {
		if let Action::DeleteLocal { path } = action {
			if let Some(prev) = snapshot.prev.get(path) {
				if let Some(id) = &prev.drive_file_id {
					candidates_by_id.entry(id.as_str()).or_insert(path.as_str());
				}
			}
		}
	}

	let mut consumed_delete_local: HashSet<String> = HashSet::new();
	let mut consumed_new_path: HashSet<String> = HashSet::new();
	let mut moves = Vec::new();

	for action in &actions {
		let new_path = match action {
			Action::Download { path } | Action::MkdirLocal { path } => path,
			_ => continue,
		};
		let remote = match snapshot.remote.get(new_path) {
			Some(r) => r,
			None => continue,
		};
		let old_path = match candidates_by_id.get(remote.id.as_str()) {
			Some(p) => *p,
			None => continue,
		};
		if old_path == new_path.as_str() || consumed_delete_local.contains(old_path) {
			continue;
		}
		moves.push(Action::MoveLocal { from: old_path.to_string(), to: new_path.clone() });
		consumed_delete_local.insert(old_path.to_string());
		consumed_new_path.insert(new_path.clone());
	}

	let mut result: Vec<Action> = actions
		.into_iter()
		.filter(|a| match a {
			Action::DeleteLocal { path } => !consumed_delete_local.contains(path),
			Action::Download { path } | Action::MkdirLocal { path } => !consumed_new_path.contains(path),
			_ => true,
		})
		.collect();
	result.extend(moves);
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{LocalEntry, RemoteEntry, SyncEntry};

	fn snapshot_with_local_rename() -> Snapshot {
		let mut snap = Snapshot::default();
		snap.local.insert(
			"new.txt".to_string(),
			LocalEntry { relative_path: "new.txt".to_string(), absolute_path: "new.txt".to_string(), is_dir: false, size: 5, mtime: 100, hash: "H1".to_string() },
		);
		snap.prev.insert(
			"old.txt".to_string(),
			SyncEntry { relative_path: "old.txt".to_string(), content_hash: "H1".to_string(), drive_file_id: Some("F1".to_string()), ..Default::default() },
		);
		snap
	}

	#[test]
	fn fuses_local_rename_into_move_remote() {
		let snap = snapshot_with_local_rename();
		let actions = vec![Action::Upload { path: "new.txt".to_string() }, Action::DeleteRemote { path: "old.txt".to_string() }];
		let result = detect_renames(actions, &snap);
		assert_eq!(result, vec![Action::MoveRemote { from: "old.txt".to_string(), to: "new.txt".to_string() }]);
	}

	#[test]
	fn fuses_remote_rename_into_move_local() {
		let mut snap = Snapshot::default();
		snap.remote.insert(
			"new.txt".to_string(),
			RemoteEntry { relative_path: "new.txt".to_string(), id: "F1".to_string(), parent_id: String::new(), is_dir: false, size: 5, modified_time: String::new(), md5_checksum: "M1".to_string(), mime_type: "text/plain".to_string() },
		);
		snap.prev.insert(
			"old.txt".to_string(),
			SyncEntry { relative_path: "old.txt".to_string(), drive_file_id: Some("F1".to_string()), ..Default::default() },
		);

		let actions = vec![Action::Download { path: "new.txt".to_string() }, Action::DeleteLocal { path: "old.txt".to_string() }];
		let result = detect_renames(actions, &snap);
		assert_eq!(result, vec![Action::MoveLocal { from: "old.txt".to_string(), to: "new.txt".to_string() }]);
	}

	#[test]
	fn ambiguous_ties_are_left_unfused() {
		let mut snap = snapshot_with_local_rename();
		snap.local.insert(
			"new2.txt".to_string(),
			LocalEntry { relative_path: "new2.txt".to_string(), absolute_path: "new2.txt".to_string(), is_dir: false, size: 5, mtime: 100, hash: "H1".to_string() },
		);

		let actions = vec![
			Action::Upload { path: "new.txt".to_string() },
			Action::Upload { path: "new2.txt".to_string() },
			Action::DeleteRemote { path: "old.txt".to_string() },
		];
		let result = detect_renames(actions, &snap);
		assert_eq!(result.iter().filter(|a| matches!(a, Action::MoveRemote { .. })).count(), 1);
		assert_eq!(result.iter().filter(|a| matches!(a, Action::Upload { .. })).count(), 1);
	}

	#[test]
	fn detection_is_idempotent() {
		let snap = snapshot_with_local_rename();
		let actions = vec![Action::Upload { path: "new.txt".to_string() }, Action::DeleteRemote { path: "old.txt".to_string() }];
		let once = detect_renames(actions, &snap);
		let twice = detect_renames(once.clone(), &snap);
		assert_eq!(once, twice);
	}
}

// vim: ts=4
