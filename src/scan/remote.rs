//! Remote Scanner (§4.4): BFS full enumeration, and an incremental mode
//! driven by the remote's change-token feed with a depth-limited
//! parent-path reconstruction and full-scan fallback.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::SyncError;
use crate::remote::{ChangeRecord, RemoteDriver, RemoteNode, ResourceKeyCache};
use crate::types::{RemoteEntry, SyncEntry};

/// Parent-walk depth limit past which the incremental scanner gives up and
/// falls back to a full enumeration (§4.4, §9).
const MAX_PARENT_WALK_DEPTH: usize = 50;

fn to_entry(relative_path: String, node: &RemoteNode) -> RemoteEntry {
	RemoteEntry {
		relative_path,
		id: node.id.clone(),
		parent_id: node.parents.first().cloned().unwrap_or_default(),
		is_dir: node.is_dir(),
		size: node.size,
		modified_time: node.modified_time.clone(),
		md5_checksum: node.md5_checksum.clone(),
		mime_type: node.mime_type.clone(),
	}
}

/// Full BFS enumeration from `root_id`.
pub async fn scan_remote_full(
	driver: &dyn RemoteDriver,
	resource_keys: &dyn ResourceKeyCache,
	root_id: &str,
) -> Result<BTreeMap<String, RemoteEntry>, SyncError> {
	let mut out = BTreeMap::new();
	let mut queue = VecDeque::new();
	queue.push_back((root_id.to_string(), String::new()));

	while let Some((parent_id, parent_path)) = queue.pop_front() {
		let mut page_token = None;
		loop {
			let page = driver.list_children(&parent_id, page_token.as_deref()).await.map_err(|e| {
				SyncError::Scan { path: Some(parent_path.clone()), source: e }
			})?;

			for node in &page.items {
				if let Some(key) = &node.resource_key {
					resource_keys.update_from_api_response(&node.id, key);
				}

				let relative_path = if parent_path.is_empty() {
					node.name.clone()
				} else {
					format!("{}/{}", parent_path, node.name)
				};

				if node.is_dir() {
					queue.push_back((node.id.clone(), relative_path.clone()));
				}

				out.insert(relative_path.clone(), to_entry(relative_path, node));
			}

			page_token = page.next_page_token;
			if page_token.is_none() {
				break;
			}
		}
	}

	Ok(out)
}

/// Outcome of the incremental scan: either a rebuilt remote map with the
/// change-token to persist, or a signal that the caller must fall back to
/// a full enumeration.
pub enum RemoteScanOutcome {
	Incremental { entries: BTreeMap<String, RemoteEntry>, new_change_token: String },
	FallbackToFull,
}

/// Incremental scan seeded from `prev` (the previous index entries) and
/// driven by the change feed starting at `change_token`. `root_id` is the
/// config's remote root id, mapped to the empty relative path so top-level
/// changes resolve the same way `scan_remote_full`'s BFS does.
pub async fn scan_remote_incremental(
	driver: &dyn RemoteDriver,
	resource_keys: &dyn ResourceKeyCache,
	root_id: &str,
	change_token: &str,
	prev: &BTreeMap<String, SyncEntry>,
) -> Result<RemoteScanOutcome, SyncError> {
	let mut by_path: BTreeMap<String, RemoteEntry> = BTreeMap::new();
	let mut id_to_path: HashMap<String, String> = HashMap::new();
	let mut id_to_parent: HashMap<String, String> = HashMap::new();

	id_to_path.insert(root_id.to_string(), String::new());

	for (path, entry) in prev {
		if let Some(file_id) = &entry.drive_file_id {
			by_path.insert(
				path.clone(),
				RemoteEntry {
					relative_path: path.clone(),
					id: file_id.clone(),
					parent_id: entry.drive_parent_id.clone().unwrap_or_default(),
					is_dir: entry.is_dir,
					size: entry.remote_size.unwrap_or(0),
					modified_time: entry.remote_mtime.clone().unwrap_or_default(),
					md5_checksum: entry.remote_md5.clone(),
					mime_type: entry.remote_mime_type.clone().unwrap_or_default(),
				},
			);
			id_to_path.insert(file_id.clone(), path.clone());
			if let Some(parent_id) = &entry.drive_parent_id {
				id_to_parent.insert(file_id.clone(), parent_id.clone());
			}
		}
	}

	let mut page_token = None;
	let mut token = change_token.to_string();
	loop {
		let page = match driver.list_changes(&token, page_token.as_deref()).await {
			Ok(p) => p,
			Err(e) => {
				return Err(SyncError::ChangeFeedStale { message: e.to_string() });
			}
		};

		for change in &page.items {
			if let Err(()) = apply_change(driver, resource_keys, root_id, change, &mut by_path, &mut id_to_path, &mut id_to_parent).await {
				return Ok(RemoteScanOutcome::FallbackToFull);
			}
		}

		page_token = page.next_page_token;
		if page_token.is_none() {
			break;
		}
	}

	let new_start = driver
		.new_start_page_token(&token)
		.await
		.map_err(|e| SyncError::Scan { path: None, source: e })?;
	token = new_start;

	Ok(RemoteScanOutcome::Incremental { entries: by_path, new_change_token: token })
}

async fn apply_change(
	driver: &dyn RemoteDriver,
	resource_keys: &dyn ResourceKeyCache,
	root_id: &str,
	change: &ChangeRecord,
	by_path: &mut BTreeMap<String, RemoteEntry>,
	id_to_path: &mut HashMap<String, String>,
	id_to_parent: &mut HashMap<String, String>,
) -> Result<(), ()> {
	let removed = change.removed || change.file.as_ref().map(|f| f.parents.is_empty()).unwrap_or(true);

	if removed {
		if let Some(old_path) = id_to_path.remove(&change.file_id) {
			remove_subtree(by_path, &old_path);
		}
		return Ok(());
	}

	let node = change.file.as_ref().expect("non-removed change carries a file");
	if let Some(key) = &node.resource_key {
		resource_keys.update_from_api_response(&node.id, key);
	}

	let parent_id = node.parents.first().cloned().unwrap_or_default();
	let parent_path = match resolve_parent_path(driver, root_id, &parent_id, id_to_path, id_to_parent).await {
		Some(path) => path,
		None => return Err(()),
	};

	let new_path = if parent_path.is_empty() { node.name.clone() } else { format!("{}/{}", parent_path, node.name) };

	if let Some(old_path) = id_to_path.get(&change.file_id).cloned() {
		if old_path != new_path {
			relocate_subtree(by_path, &old_path, &new_path, node.is_dir());
		}
	}

	id_to_path.insert(change.file_id.clone(), new_path.clone());
	id_to_parent.insert(change.file_id.clone(), parent_id);
	by_path.insert(new_path.clone(), to_entry(new_path, node));

	Ok(())
}

/// Walk parent ids toward the root using the id→path cache, bounded by
/// `MAX_PARENT_WALK_DEPTH`. `root_id` short-circuits directly to the empty
/// relative path, matching `scan_remote_full`'s BFS seed. Returns `None`
/// (triggering full-scan fallback) if the walk cannot reach the root
/// within the depth limit or a parent is unreachable.
async fn resolve_parent_path(
	driver: &dyn RemoteDriver,
	root_id: &str,
	parent_id: &str,
	id_to_path: &HashMap<String, String>,
	id_to_parent: &HashMap<String, String>,
) -> Option<String> {
	if parent_id.is_empty() || parent_id == root_id {
		return Some(String::new());
	}
	if let Some(path) = id_to_path.get(parent_id) {
		return Some(path.clone());
	}

	let mut current = parent_id.to_string();
	let mut chain = Vec::new();
	for _ in 0..MAX_PARENT_WALK_DEPTH {
		if current == root_id {
			return Some(chain.into_iter().rev().collect::<Vec<_>>().join("/"));
		}
		if let Some(path) = id_to_path.get(&current) {
			let mut full = path.clone();
			for name in chain.iter().rev() {
				full = if full.is_empty() { name.clone() } else { format!("{}/{}", full, name) };
			}
			return Some(full);
		}

		let node = driver.get_node(&current).await.ok()?;
		chain.push(node.name.clone());

		match id_to_parent.get(&current).cloned() {
			Some(next) => current = next,
			None => match node.parents.first() {
				Some(next) => current = next.clone(),
				None => return Some(chain.into_iter().rev().collect::<Vec<_>>().join("/")),
			},
		}
	}

	None
}

fn remove_subtree(by_path: &mut BTreeMap<String, RemoteEntry>, path: &str) {
	let prefix = format!("{}/", path);
	by_path.retain(|k, _| k != path && !k.starts_with(&prefix));
}

fn relocate_subtree(by_path: &mut BTreeMap<String, RemoteEntry>, old_path: &str, new_path: &str, is_dir: bool) {
	if !is_dir {
		by_path.remove(old_path);
		return;
	}

	let prefix = format!("{}/", old_path);
	let moved: Vec<(String, RemoteEntry)> = by_path
		.iter()
		.filter(|(k, _)| k.starts_with(&prefix))
		.map(|(k, v)| {
			let suffix = &k[prefix.len()..];
			(format!("{}/{}", new_path, suffix), v.clone())
		})
		.collect();

	by_path.retain(|k, _| k != old_path && !k.starts_with(&prefix));
	for (k, mut v) in moved {
		v.relative_path = k.clone();
		by_path.insert(k, v);
	}
}


// vim: ts=4
