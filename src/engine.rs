//! Engine Facade (§4.9): composes the scanners, diff engine, rename
//! detector, conflict resolver, and executor into the two operations a
//! caller actually needs — `plan` (read-only) and `apply` (plan, then
//! execute, then persist).

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ConflictPolicy, Options, SyncDirection};
use crate::conflict::resolve_all;
use crate::diff::diff;
use crate::error::SyncError;
use crate::exclude::ExcludeMatcher;
use crate::index::SyncIndex;
use crate::remote::{FilesManager, FoldersManager, RemoteDriver, ResourceKeyCache};
use crate::rename::detect_renames;
use crate::scan::{scan_local, scan_remote_full, scan_remote_incremental, RemoteScanOutcome};
use crate::types::{Action, Conflict, LocalEntry, RemoteEntry, Snapshot, SyncConfig, SyncEntry, Summary};

/// Result of a read-only planning pass: the action list (already
/// rename-fused and with conflict-resolver actions folded in, filtered to
/// the config's direction), plus the unresolved conflicts for audit, plus
/// the snapshot the plan was computed from.
pub struct Plan {
	pub actions: Vec<Action>,
	pub conflicts: Vec<Conflict>,
	pub snapshot: Snapshot,
	pub new_change_token: Option<String>,
}

/// Bundles the external collaborators the engine needs but never owns.
pub struct Engine<'a> {
	pub driver: &'a dyn RemoteDriver,
	pub files: &'a dyn FilesManager,
	pub folders: &'a dyn FoldersManager,
	pub resource_keys: &'a dyn ResourceKeyCache,
}

impl<'a> Engine<'a> {
	pub async fn plan(&self, index: &SyncIndex, cfg: &SyncConfig, opts: Options) -> Result<Plan, SyncError> {
		cfg.validate().map_err(|message| SyncError::Validation { message })?;
		let direction = SyncDirection::from_str(&cfg.direction)?;
		let policy = ConflictPolicy::from_str(&cfg.conflict_policy)?;

		let prev_entries = index.list_entries(&cfg.id).map_err(|source| SyncError::IndexWrite { source })?;
		let prev: BTreeMap<String, SyncEntry> = prev_entries.into_iter().map(|e| (e.relative_path.clone(), e)).collect();

		let exclude = ExcludeMatcher::new(&cfg.exclude_patterns);
		let local_root = Path::new(&cfg.local_root);
		let local = scan_local(local_root, &exclude, &prev)?;

		let (remote, new_change_token) = self.scan_remote(cfg, &opts, &prev).await?;

		let snapshot = Snapshot { local, remote, prev };
		let diff_result = diff(&snapshot, direction, opts.include_deletes);
		let mut actions = detect_renames(diff_result.actions, &snapshot);

		let conflict_actions: Vec<Action> = resolve_all(&diff_result.conflicts, policy)
			.into_iter()
			.filter(|a| match direction {
				SyncDirection::Push => a.allowed_in_push(),
				SyncDirection::Pull => a.allowed_in_pull(),
				SyncDirection::Bidirectional => true,
			})
			.collect();
		actions.extend(conflict_actions);

		Ok(Plan { actions, conflicts: diff_result.conflicts, snapshot, new_change_token })
	}

	async fn scan_remote(
		&self,
		cfg: &SyncConfig,
		opts: &Options,
		prev: &BTreeMap<String, SyncEntry>,
	) -> Result<(BTreeMap<String, RemoteEntry>, Option<String>), SyncError> {
		if opts.use_changes && !cfg.last_change_token.is_empty() {
			match scan_remote_incremental(self.driver, self.resource_keys, &cfg.remote_root_id, &cfg.last_change_token, prev).await? {
				RemoteScanOutcome::Incremental { entries, new_change_token } => {
					return Ok((entries, Some(new_change_token)));
				}
				RemoteScanOutcome::FallbackToFull => {}
			}
		}

		let entries = scan_remote_full(self.driver, self.resource_keys, &cfg.remote_root_id).await?;
		let token = self
			.driver
			.fresh_start_page_token()
			.await
			.map_err(|source| SyncError::Scan { path: None, source })?;
		Ok((entries, Some(token)))
	}

	/// Executes `plan.actions` against the executor's own view of both
	/// trees (seeded from `plan.snapshot`), then, unless `Options.dry_run`,
	/// persists the resulting post-apply state and the change token the
	/// plan observed. On execution failure the index is left untouched:
	/// the prior state remains authoritative (§4.2, §4.9).
	pub async fn apply(
		&self,
		index: &SyncIndex,
		cfg: &SyncConfig,
		plan: &Plan,
		opts: Options,
		confirm_deletes: &(dyn Fn(&[Action]) -> bool + Sync),
	) -> Result<Summary, SyncError> {
		let local_root = Path::new(&cfg.local_root);
		let exec_ctx = crate::executor::ExecutorContext {
			local_root,
			remote_root_id: &cfg.remote_root_id,
			files: self.files,
			folders: self.folders,
			options: opts,
		};
		let initial_state = crate::executor::SyncState { local: plan.snapshot.local.clone(), remote: plan.snapshot.remote.clone() };

		let (final_state, summary) = crate::executor::execute(plan.actions.clone(), &exec_ctx, initial_state, confirm_deletes).await?;

		if opts.dry_run {
			return Ok(summary);
		}

		let entries = merge_entries(&final_state.local, &final_state.remote);
		index.replace_entries(&cfg.id, &entries).map_err(|source| SyncError::IndexWrite { source })?;

		let mut updated_cfg = cfg.clone();
		updated_cfg.last_sync_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
		if let Some(token) = &plan.new_change_token {
			if !token.is_empty() {
				updated_cfg.last_change_token = token.clone();
			}
		}
		index.upsert_config(&updated_cfg).map_err(|source| SyncError::IndexWrite { source })?;

		Ok(summary)
	}
}

fn merge_entries(local: &BTreeMap<String, LocalEntry>, remote: &BTreeMap<String, RemoteEntry>) -> Vec<SyncEntry> {
	let mut paths: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
	paths.extend(local.keys().map(String::as_str));
	paths.extend(remote.keys().map(String::as_str));

	paths
		.into_iter()
		.map(|path| {
			let l = local.get(path);
			let r = remote.get(path);
			SyncEntry {
				relative_path: path.to_string(),
				is_dir: l.map(|l| l.is_dir).or_else(|| r.map(|r| r.is_dir)).unwrap_or(false),
				local_mtime: l.map(|l| l.mtime),
				local_size: l.map(|l| l.size),
				content_hash: l.map(|l| l.hash.clone()).unwrap_or_default(),
				drive_file_id: r.map(|r| r.id.clone()),
				drive_parent_id: r.map(|r| r.parent_id.clone()),
				remote_mtime: r.map(|r| r.modified_time.clone()),
				remote_size: r.map(|r| r.size),
				remote_md5: r.map(|r| r.md5_checksum.clone()).unwrap_or_default(),
				remote_mime_type: r.map(|r| r.mime_type.clone()),
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_entries_prefers_union_of_both_sides() {
		let mut local = BTreeMap::new();
		local.insert(
			"a.txt".to_string(),
			LocalEntry { relative_path: "a.txt".to_string(), absolute_path: "a.txt".to_string(), is_dir: false, size: 3, mtime: 10, hash: "H".to_string() },
		);
		let mut remote = BTreeMap::new();
		remote.insert(
			"b.txt".to_string(),
			RemoteEntry { relative_path: "b.txt".to_string(), id: "F1".to_string(), parent_id: String::new(), is_dir: false, size: 4, modified_time: "t".to_string(), md5_checksum: "M".to_string(), mime_type: "text/plain".to_string() },
		);

		let merged = merge_entries(&local, &remote);
		assert_eq!(merged.len(), 2);
		assert!(merged.iter().any(|e| e.relative_path == "a.txt" && e.content_hash == "H"));
		assert!(merged.iter().any(|e| e.relative_path == "b.txt" && e.drive_file_id.as_deref() == Some("F1")));
	}
}

// vim: ts=4
