//! Conflict Resolver (§4.7): turns each unresolved three-way disagreement
//! into zero or more actions, dispatched on the conflict kind and the
//! configured policy. `rename-both` only has bespoke behavior for
//! `BothModified` — renaming each side aside so neither edit is lost; every
//! other conflict kind falls back to `local-wins` under that policy.

use crate::config::ConflictPolicy;
use crate::types::{Action, Conflict, ConflictKind};

pub fn resolve_all(conflicts: &[Conflict], policy: ConflictPolicy) -> Vec<Action> {
	conflicts.iter().flat_map(|c| resolve(c, policy)).collect()
}

pub fn resolve(conflict: &Conflict, policy: ConflictPolicy) -> Vec<Action> {
	let path = conflict.path.clone();
	let local_is_dir = conflict.local.as_ref().map(|l| l.is_dir).unwrap_or(false);
	let remote_is_dir = conflict.remote.as_ref().map(|r| r.is_dir).unwrap_or(false);

	// `rename-both` only has bespoke behavior for `BothModified`; every
	// other conflict kind falls back to `local-wins` (§4.7).
	if conflict.kind == ConflictKind::BothModified && policy == ConflictPolicy::RenameBoth {
		let local_name = insert_suffix(&path, "local");
		let remote_name = insert_suffix(&path, "remote");
		return vec![
			Action::MoveLocal { from: path.clone(), to: local_name.clone() },
			Action::MoveRemote { from: path, to: remote_name.clone() },
			Action::Upload { path: local_name },
			Action::Download { path: remote_name },
		];
	}
	let policy = if policy == ConflictPolicy::RenameBoth { ConflictPolicy::LocalWins } else { policy };

	match conflict.kind {
		ConflictKind::BothModified => match policy {
			ConflictPolicy::LocalWins => vec![Action::Update { path }],
			ConflictPolicy::RemoteWins => vec![Action::Download { path }],
			ConflictPolicy::RenameBoth => unreachable!("handled above"),
		},

		ConflictKind::LocalDeletedRemoteModified => match policy {
			ConflictPolicy::LocalWins => vec![Action::DeleteRemote { path }],
			ConflictPolicy::RemoteWins => vec![Action::Download { path }],
			ConflictPolicy::RenameBoth => unreachable!("rename-both folded into local-wins above"),
		},

		ConflictKind::RemoteDeletedLocalModified => match policy {
			ConflictPolicy::LocalWins => vec![Action::Upload { path }],
			ConflictPolicy::RemoteWins => vec![Action::DeleteLocal { path }],
			ConflictPolicy::RenameBoth => unreachable!("rename-both folded into local-wins above"),
		},

		ConflictKind::TypeMismatch => match policy {
			ConflictPolicy::LocalWins => {
				let mut actions = vec![Action::DeleteRemote { path: path.clone() }];
				actions.push(if local_is_dir { Action::MkdirRemote { path } } else { Action::Upload { path } });
				actions
			}
			ConflictPolicy::RemoteWins => {
				let mut actions = vec![Action::DeleteLocal { path: path.clone() }];
				actions.push(if remote_is_dir { Action::MkdirLocal { path } } else { Action::Download { path } });
				actions
			}
			ConflictPolicy::RenameBoth => unreachable!("rename-both folded into local-wins above"),
		},
	}
}

/// Inserts `suffix` before the file extension (`doc.md` -> `doc.local.md`),
/// or appends it when there is none (`README` -> `README.local`).
fn insert_suffix(path: &str, suffix: &str) -> String {
	match path.rsplit_once('/') {
		Some((dir, file)) => format!("{}/{}", dir, suffix_filename(file, suffix)),
		None => suffix_filename(path, suffix),
	}
}

fn suffix_filename(file: &str, suffix: &str) -> String {
	match file.rfind('.') {
		Some(idx) if idx > 0 => format!("{}.{}{}", &file[..idx], suffix, &file[idx..]),
		_ => format!("{}.{}", file, suffix),
	}
}


// vim: ts=4
