//! Executor (§4.8): runs a filtered, rename-fused, conflict-resolved action
//! list in eleven ordered phases. Structural phases (mkdir, move) run
//! sequentially in path-depth order so parents exist before children;
//! transfer phases (upload, update, download) run with bounded
//! concurrency; delete phases run last, deepest paths first, gated by a
//! caller-supplied confirmation unless `Options.force` is set.
//!
//! The executor owns a `SyncState` (local map, remote map, both
//! path-keyed) for the duration of a run and mutates it as each action
//! completes, so the post-apply state handed back to the caller is
//! reachable from the pre-apply state by the executed actions alone —
//! no re-scan is needed to discover what changed (§3's reachability
//! invariant).

use std::collections::BTreeMap;
use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::config::Options;
use crate::error::SyncError;
use crate::remote::{FilesManager, FoldersManager, RemoteNode};
use crate::types::{Action, LocalEntry, RemoteEntry, Summary};
use crate::util::hash_hex;

/// The executor's live view of both trees, seeded from the plan's
/// snapshot and updated in place as actions complete.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
	pub local: BTreeMap<String, LocalEntry>,
	pub remote: BTreeMap<String, RemoteEntry>,
}

fn rekey_prefix<T: Clone>(map: &mut BTreeMap<String, T>, from: &str, to: &str, relabel: impl Fn(&mut T, &str)) {
	let matching: Vec<String> = map
		.keys()
		.filter(|k| k.as_str() == from || k.starts_with(&format!("{}/", from)))
		.cloned()
		.collect();

	for old_key in matching {
		let new_key = if old_key == from { to.to_string() } else { format!("{}{}", to, &old_key[from.len()..]) };
		if let Some(mut value) = map.remove(&old_key) {
			relabel(&mut value, &new_key);
			map.insert(new_key, value);
		}
	}
}

pub struct ExecutorContext<'a> {
	pub local_root: &'a Path,
	pub remote_root_id: &'a str,
	pub files: &'a dyn FilesManager,
	pub folders: &'a dyn FoldersManager,
	pub options: Options,
}

/// Runs the full phase sequence, consuming and returning `state`.
/// `confirm_deletes` is invoked at most once, with the combined batch of
/// `DeleteLocal`/`DeleteRemote` actions, and must return `true` for the
/// run to proceed past it; it is skipped entirely (treated as confirmed)
/// when `Options.force` is set or the batch is empty.
pub async fn execute(
	actions: Vec<Action>,
	ctx: &ExecutorContext<'_>,
	mut state: SyncState,
	confirm_deletes: &(dyn Fn(&[Action]) -> bool + Sync),
) -> Result<(SyncState, Summary), SyncError> {
	let mut by_kind = PhaseBuckets::default();
	for action in actions {
		by_kind.push(action);
	}

	let mut summary = Summary::default();

	if ctx.options.dry_run {
		summary.mkdirs = by_kind.mkdir_remote.len() + by_kind.mkdir_local.len();
		summary.moves = by_kind.move_remote.len() + by_kind.move_local.len();
		summary.uploads = by_kind.upload.len();
		summary.updates = by_kind.update.len();
		summary.downloads = by_kind.download.len();
		summary.deletes = by_kind.delete_local.len() + by_kind.delete_remote.len();
		return Ok((state, summary));
	}

	let remote = Mutex::new(std::mem::take(&mut state.remote));

	run_mkdir_remote(&by_kind.mkdir_remote, ctx, &remote).await?;
	summary.mkdirs += by_kind.mkdir_remote.len();

	state.remote = remote.into_inner();
	run_mkdir_local(&by_kind.mkdir_local, ctx, &mut state.local)?;
	summary.mkdirs += by_kind.mkdir_local.len();

	let remote = Mutex::new(std::mem::take(&mut state.remote));
	run_move_remote(&by_kind.move_remote, ctx, &remote).await?;
	summary.moves += by_kind.move_remote.len();
	state.remote = remote.into_inner();

	run_move_local(&by_kind.move_local, ctx, &mut state.local)?;
	summary.moves += by_kind.move_local.len();

	let remote = Mutex::new(std::mem::take(&mut state.remote));
	let local = Mutex::new(std::mem::take(&mut state.local));

	summary.uploads += run_transfers(&by_kind.upload, ctx, &remote, &local, TransferKind::Upload).await?;
	summary.updates += run_transfers(&by_kind.update, ctx, &remote, &local, TransferKind::Update).await?;
	summary.downloads += run_transfers(&by_kind.download, ctx, &remote, &local, TransferKind::Download).await?;

	state.remote = remote.into_inner();
	state.local = local.into_inner();

	let mut deletes = by_kind.delete_local.clone();
	deletes.extend(by_kind.delete_remote.iter().cloned());
	if !deletes.is_empty() && !ctx.options.force && !confirm_deletes(&deletes) {
		return Err(SyncError::Cancelled);
	}

	run_delete_local(&by_kind.delete_local, ctx, &mut state.local)?;
	summary.deletes += by_kind.delete_local.len();

	let remote = Mutex::new(std::mem::take(&mut state.remote));
	run_delete_remote(&by_kind.delete_remote, ctx, &remote).await?;
	summary.deletes += by_kind.delete_remote.len();
	state.remote = remote.into_inner();

	Ok((state, summary))
}

#[derive(Default)]
struct PhaseBuckets {
	mkdir_remote: Vec<Action>,
	mkdir_local: Vec<Action>,
	move_remote: Vec<Action>,
	move_local: Vec<Action>,
	upload: Vec<Action>,
	update: Vec<Action>,
	download: Vec<Action>,
	delete_local: Vec<Action>,
	delete_remote: Vec<Action>,
}

impl PhaseBuckets {
	fn push(&mut self, action: Action) {
		match action {
			Action::MkdirRemote { .. } => self.mkdir_remote.push(action),
			Action::MkdirLocal { .. } => self.mkdir_local.push(action),
			Action::MoveRemote { .. } => self.move_remote.push(action),
			Action::MoveLocal { .. } => self.move_local.push(action),
			Action::Upload { .. } => self.upload.push(action),
			Action::Update { .. } => self.update.push(action),
			Action::Download { .. } => self.download.push(action),
			Action::DeleteLocal { .. } => self.delete_local.push(action),
			Action::DeleteRemote { .. } => self.delete_remote.push(action),
		}
	}
}

fn sorted_by_depth_asc(actions: &[Action]) -> Vec<&Action> {
	let mut out: Vec<&Action> = actions.iter().collect();
	out.sort_by_key(|a| a.depth());
	out
}

fn sorted_by_depth_desc(actions: &[Action]) -> Vec<&Action> {
	let mut out: Vec<&Action> = actions.iter().collect();
	out.sort_by_key(|a| std::cmp::Reverse(a.depth()));
	out
}

fn parent_path(path: &str) -> &str {
	path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn file_name(path: &str) -> &str {
	path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn no_remote_id(what: &str) -> SyncError {
	SyncError::Transfer {
		path: what.to_string(),
		source: crate::error::boxed_error(std::io::Error::new(std::io::ErrorKind::NotFound, "no remote id for path")),
	}
}

/// Resolves the drive id of `path`'s parent directory, creating any
/// missing ancestors (recursively) along the way.
async fn ensure_remote_parent(
	path: &str,
	ctx: &ExecutorContext<'_>,
	remote: &Mutex<BTreeMap<String, RemoteEntry>>,
) -> Result<String, SyncError> {
	let parent = parent_path(path);
	if parent.is_empty() {
		return Ok(ctx.remote_root_id.to_string());
	}
	{
		let guard = remote.lock().await;
		if let Some(r) = guard.get(parent) {
			return Ok(r.id.clone());
		}
	}

	let grandparent_id = Box::pin(ensure_remote_parent(parent, ctx, remote)).await?;
	let id = ctx
		.folders
		.create(file_name(parent), &grandparent_id)
		.await
		.map_err(|e| SyncError::Transfer { path: parent.to_string(), source: e })?;

	let mut guard = remote.lock().await;
	guard.insert(
		parent.to_string(),
		RemoteEntry {
			relative_path: parent.to_string(),
			id: id.clone(),
			parent_id: grandparent_id,
			is_dir: true,
			size: 0,
			modified_time: String::new(),
			md5_checksum: String::new(),
			mime_type: RemoteNode::FOLDER_MIME_TYPE.to_string(),
		},
	);
	Ok(id)
}

async fn run_mkdir_remote(actions: &[Action], ctx: &ExecutorContext<'_>, remote: &Mutex<BTreeMap<String, RemoteEntry>>) -> Result<(), SyncError> {
	for action in sorted_by_depth_asc(actions) {
		if let Action::MkdirRemote { path } = action {
			let parent_id = ensure_remote_parent(path, ctx, remote).await?;
			let id = ctx
				.folders
				.create(file_name(path), &parent_id)
				.await
				.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;
			let mut guard = remote.lock().await;
			guard.insert(
				path.clone(),
				RemoteEntry {
					relative_path: path.clone(),
					id,
					parent_id,
					is_dir: true,
					size: 0,
					modified_time: String::new(),
					md5_checksum: String::new(),
					mime_type: RemoteNode::FOLDER_MIME_TYPE.to_string(),
				},
			);
		}
	}
	Ok(())
}

fn run_mkdir_local(actions: &[Action], ctx: &ExecutorContext<'_>, local: &mut BTreeMap<String, LocalEntry>) -> Result<(), SyncError> {
	for action in sorted_by_depth_asc(actions) {
		if let Action::MkdirLocal { path } = action {
			let abs = ctx.local_root.join(path);
			std::fs::create_dir_all(&abs).map_err(SyncError::from)?;
			let mtime = std::fs::metadata(&abs).ok().and_then(|m| mtime_epoch_seconds(&m)).unwrap_or(0);
			local.insert(path.clone(), LocalEntry { relative_path: path.clone(), absolute_path: abs.display().to_string(), is_dir: true, size: 0, mtime, hash: String::new() });
		}
	}
	Ok(())
}

async fn run_move_remote(actions: &[Action], ctx: &ExecutorContext<'_>, remote: &Mutex<BTreeMap<String, RemoteEntry>>) -> Result<(), SyncError> {
	for action in actions {
		if let Action::MoveRemote { from, to } = action {
			let id = {
				let guard = remote.lock().await;
				guard.get(from.as_str()).map(|r| r.id.clone())
			};
			let id = id.ok_or_else(|| no_remote_id(from))?;
			let new_parent_id = ensure_remote_parent(to, ctx, remote).await?;
			ctx.files
				.move_with_safety(&id, &new_parent_id, file_name(to))
				.await
				.map_err(|e| SyncError::Transfer { path: to.clone(), source: e })?;

			let mut guard = remote.lock().await;
			rekey_prefix(&mut guard, from, to, |entry, new_path| entry.relative_path = new_path.to_string());
			if let Some(entry) = guard.get_mut(to.as_str()) {
				entry.parent_id = new_parent_id;
			}
		}
	}
	Ok(())
}

fn run_move_local(actions: &[Action], ctx: &ExecutorContext<'_>, local: &mut BTreeMap<String, LocalEntry>) -> Result<(), SyncError> {
	for action in actions {
		if let Action::MoveLocal { from, to } = action {
			let from_abs = ctx.local_root.join(from);
			let to_abs = ctx.local_root.join(to);
			if let Some(parent) = to_abs.parent() {
				std::fs::create_dir_all(parent).map_err(SyncError::from)?;
			}
			std::fs::rename(&from_abs, &to_abs).map_err(SyncError::from)?;

			let to_display = to_abs.display().to_string();
			rekey_prefix(local, from, to, |entry, new_path| {
				entry.relative_path = new_path.to_string();
			});
			if let Some(entry) = local.get_mut(to.as_str()) {
				entry.absolute_path = to_display;
			}
		}
	}
	Ok(())
}

enum TransferKind {
	Upload,
	Update,
	Download,
}

async fn run_transfers(
	actions: &[Action],
	ctx: &ExecutorContext<'_>,
	remote: &Mutex<BTreeMap<String, RemoteEntry>>,
	local: &Mutex<BTreeMap<String, LocalEntry>>,
	kind: TransferKind,
) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}

	let workers = ctx.options.workers();
	let results: Vec<Result<(), SyncError>> = stream::iter(actions.iter())
		.map(|action| async move {
			match (&kind, action) {
				(TransferKind::Upload, Action::Upload { path }) => {
					let parent_id = ensure_remote_parent(path, ctx, remote).await?;
					let abs = ctx.local_root.join(path);
					let result = ctx
						.files
						.upload(&abs.display().to_string(), &parent_id, file_name(path))
						.await
						.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;
					let mut guard = remote.lock().await;
					guard.insert(
						path.clone(),
						RemoteEntry {
							relative_path: path.clone(),
							id: result.id,
							parent_id,
							is_dir: false,
							size: result.size,
							modified_time: result.modified_time,
							md5_checksum: result.md5_checksum,
							mime_type: result.mime_type,
						},
					);
					Ok(())
				}
				(TransferKind::Update, Action::Update { path }) => {
					let (id, parent_id) = {
						let guard = remote.lock().await;
						let r = guard.get(path.as_str());
						(r.map(|r| r.id.clone()), r.map(|r| r.parent_id.clone()).unwrap_or_default())
					};
					let id = id.ok_or_else(|| no_remote_id(path))?;
					let abs = ctx.local_root.join(path);
					let result = ctx
						.files
						.update_content(&id, &abs.display().to_string())
						.await
						.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;
					let mut guard = remote.lock().await;
					guard.insert(
						path.clone(),
						RemoteEntry {
							relative_path: path.clone(),
							id: result.id,
							parent_id,
							is_dir: false,
							size: result.size,
							modified_time: result.modified_time,
							md5_checksum: result.md5_checksum,
							mime_type: result.mime_type,
						},
					);
					Ok(())
				}
				(TransferKind::Download, Action::Download { path }) => {
					let id = {
						let guard = remote.lock().await;
						guard.get(path.as_str()).map(|r| r.id.clone())
					};
					let id = id.ok_or_else(|| no_remote_id(path))?;
					let abs = ctx.local_root.join(path);
					if let Some(parent) = abs.parent() {
						std::fs::create_dir_all(parent).map_err(SyncError::from)?;
					}
					ctx.files
						.download(&id, &abs.display().to_string())
						.await
						.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;

					let remote_modified = {
						let guard = remote.lock().await;
						guard.get(path.as_str()).map(|r| r.modified_time.clone()).unwrap_or_default()
					};
					if let Some(instant) = parse_rfc3339(&remote_modified) {
						let _ = filetime::set_file_mtime(&abs, instant);
					}

					let contents = std::fs::read(&abs).map_err(SyncError::from)?;
					let hash = hash_hex(&contents);
					let metadata = std::fs::metadata(&abs).map_err(SyncError::from)?;
					let mtime = mtime_epoch_seconds(&metadata).unwrap_or(0);

					let mut guard = local.lock().await;
					guard.insert(
						path.clone(),
						LocalEntry { relative_path: path.clone(), absolute_path: abs.display().to_string(), is_dir: false, size: metadata.len(), mtime, hash },
					);
					Ok(())
				}
				_ => Ok(()),
			}
		})
		.buffer_unordered(workers)
		.collect()
		.await;

	let mut count = 0;
	for r in results {
		r?;
		count += 1;
	}
	Ok(count)
}

fn run_delete_local(actions: &[Action], ctx: &ExecutorContext<'_>, local: &mut BTreeMap<String, LocalEntry>) -> Result<(), SyncError> {
	for action in sorted_by_depth_desc(actions) {
		if let Action::DeleteLocal { path } = action {
			let abs = ctx.local_root.join(path);
			match std::fs::symlink_metadata(&abs) {
				Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&abs).map_err(SyncError::from)?,
				Ok(_) => std::fs::remove_file(&abs).map_err(SyncError::from)?,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
				Err(e) => return Err(SyncError::from(e)),
			}
			local.retain(|k, _| k != path && !k.starts_with(&format!("{}/", path)));
		}
	}
	Ok(())
}

async fn run_delete_remote(actions: &[Action], ctx: &ExecutorContext<'_>, remote: &Mutex<BTreeMap<String, RemoteEntry>>) -> Result<(), SyncError> {
	for action in sorted_by_depth_desc(actions) {
		if let Action::DeleteRemote { path } = action {
			let entry = {
				let guard = remote.lock().await;
				guard.get(path.as_str()).cloned()
			};
			let entry = match entry {
				Some(e) => e,
				None => continue,
			};
			if entry.is_dir {
				ctx.folders.delete_with_safety(&entry.id, true).await.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;
			} else {
				ctx.files.delete_with_safety(&entry.id, false).await.map_err(|e| SyncError::Transfer { path: path.clone(), source: e })?;
			}
			let mut guard = remote.lock().await;
			guard.retain(|k, _| k != path && !k.starts_with(&format!("{}/", path)));
		}
	}
	Ok(())
}

fn mtime_epoch_seconds(metadata: &std::fs::Metadata) -> Option<i64> {
	metadata.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs() as i64)
}

/// Parses an RFC-3339/ISO-8601 timestamp as returned by the remote driver
/// into a `filetime::FileTime`. Returns `None` for anything unparseable,
/// matching §4.8 phase 9's "if parseable" qualifier.
fn parse_rfc3339(s: &str) -> Option<filetime::FileTime> {
	let parsed = chrono::DateTime::parse_from_rfc3339(s).ok()?;
	Some(filetime::FileTime::from_unix_time(parsed.timestamp(), parsed.timestamp_subsec_nanos()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn actions_bucket_by_kind() {
		let mut buckets = PhaseBuckets::default();
		buckets.push(Action::Upload { path: "a".to_string() });
		buckets.push(Action::MkdirRemote { path: "b".to_string() });
		assert_eq!(buckets.upload.len(), 1);
		assert_eq!(buckets.mkdir_remote.len(), 1);
	}

	#[test]
	fn depth_sort_orders_shallow_first() {
		let actions = vec![Action::MkdirLocal { path: "a/b/c".to_string() }, Action::MkdirLocal { path: "a".to_string() }];
		let sorted = sorted_by_depth_asc(&actions);
		assert_eq!(sorted[0].path(), "a");
	}

	#[test]
	fn parent_path_splits_on_last_slash() {
		assert_eq!(parent_path("a/b/c.txt"), "a/b");
		assert_eq!(parent_path("c.txt"), "");
	}

	#[test]
	fn rekey_prefix_renames_single_entry_and_descendants() {
		let mut map: BTreeMap<String, LocalEntry> = BTreeMap::new();
		map.insert("dir".to_string(), LocalEntry { relative_path: "dir".to_string(), absolute_path: String::new(), is_dir: true, size: 0, mtime: 0, hash: String::new() });
		map.insert("dir/a.txt".to_string(), LocalEntry { relative_path: "dir/a.txt".to_string(), absolute_path: String::new(), is_dir: false, size: 1, mtime: 0, hash: String::new() });
		map.insert("other.txt".to_string(), LocalEntry { relative_path: "other.txt".to_string(), absolute_path: String::new(), is_dir: false, size: 1, mtime: 0, hash: String::new() });

		rekey_prefix(&mut map, "dir", "moved", |e, p| e.relative_path = p.to_string());

		assert!(map.contains_key("moved"));
		assert!(map.contains_key("moved/a.txt"));
		assert!(!map.contains_key("dir"));
		assert!(!map.contains_key("dir/a.txt"));
		assert!(map.contains_key("other.txt"));
		assert_eq!(map.get("moved/a.txt").unwrap().relative_path, "moved/a.txt");
	}

	#[test]
	fn parse_rfc3339_rejects_garbage() {
		assert!(parse_rfc3339("not-a-date").is_none());
		assert!(parse_rfc3339("2024-01-01T00:00:00Z").is_some());
	}
}

// vim: ts=4
