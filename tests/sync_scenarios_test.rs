//! End-to-end sync scenarios (§8): drives the full `Engine::plan` /
//! `Engine::apply` pipeline — local scanner, fake remote driver, diff,
//! rename detection, conflict resolution, executor, and index persistence —
//! against a real temp directory and a real `SyncIndex`, rather than
//! exercising any one module in isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use filetime::FileTime;
use tempfile::TempDir;

use drivesync::config::Options;
use drivesync::engine::Engine;
use drivesync::index::SyncIndex;
use drivesync::remote::{
	ChangeRecord, FilesManager, FoldersManager, NoopResourceKeyCache, Page, RemoteDriver, RemoteNode, RemoteResult, TransferResult,
};
use drivesync::util::hash_hex;
use drivesync::{Action, SyncConfig, SyncError};

const ROOT_ID: &str = "root";

#[derive(Clone)]
struct FakeNode {
	id: String,
	name: String,
	parent_id: String,
	is_dir: bool,
	size: u64,
	modified_time: String,
	md5: String,
	content: Vec<u8>,
}

/// In-memory stand-in for the Files/Folders managers and the remote driver
/// (§6): one flat id-keyed map, with `parent_id` establishing the tree.
struct FakeRemote {
	nodes: Mutex<HashMap<String, FakeNode>>,
	counter: AtomicU64,
}

impl FakeRemote {
	fn new() -> Self {
		let mut nodes = HashMap::new();
		nodes.insert(
			ROOT_ID.to_string(),
			FakeNode {
				id: ROOT_ID.to_string(),
				name: String::new(),
				parent_id: String::new(),
				is_dir: true,
				size: 0,
				modified_time: String::new(),
				md5: String::new(),
				content: Vec::new(),
			},
		);
		FakeRemote { nodes: Mutex::new(nodes), counter: AtomicU64::new(1) }
	}

	fn next_id(&self) -> String {
		format!("id{}", self.counter.fetch_add(1, Ordering::SeqCst))
	}

	fn seed_file(&self, parent_id: &str, name: &str, content: &[u8]) -> String {
		let id = self.next_id();
		let md5 = hash_hex(content);
		let size = content.len() as u64;
		self.nodes.lock().unwrap().insert(
			id.clone(),
			FakeNode {
				id: id.clone(),
				name: name.to_string(),
				parent_id: parent_id.to_string(),
				is_dir: false,
				size,
				modified_time: "2024-01-01T00:00:00Z".to_string(),
				md5,
				content: content.to_vec(),
			},
		);
		id
	}

	fn rename_node(&self, id: &str, new_name: &str) {
		let mut nodes = self.nodes.lock().unwrap();
		if let Some(n) = nodes.get_mut(id) {
			n.name = new_name.to_string();
		}
	}

	fn mime_for(is_dir: bool) -> &'static str {
		if is_dir {
			RemoteNode::FOLDER_MIME_TYPE
		} else {
			"text/plain"
		}
	}

	fn to_node(n: &FakeNode) -> RemoteNode {
		RemoteNode {
			id: n.id.clone(),
			name: n.name.clone(),
			mime_type: Self::mime_for(n.is_dir).to_string(),
			size: n.size,
			modified_time: n.modified_time.clone(),
			md5_checksum: n.md5.clone(),
			parents: vec![n.parent_id.clone()],
			resource_key: None,
		}
	}
}

fn not_found() -> Box<dyn std::error::Error + Send + Sync> {
	Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "no such node"))
}

#[async_trait]
impl RemoteDriver for FakeRemote {
	async fn list_children(&self, parent_id: &str, _page_token: Option<&str>) -> RemoteResult<Page<RemoteNode>> {
		let nodes = self.nodes.lock().unwrap();
		let items = nodes.values().filter(|n| n.parent_id == parent_id).map(FakeRemote::to_node).collect();
		Ok(Page { items, next_page_token: None })
	}

	async fn list_changes(&self, _change_token: &str, _page_token: Option<&str>) -> RemoteResult<Page<ChangeRecord>> {
		Ok(Page { items: Vec::new(), next_page_token: None })
	}

	async fn new_start_page_token(&self, _change_token: &str) -> RemoteResult<String> {
		Ok("token-next".to_string())
	}

	async fn fresh_start_page_token(&self) -> RemoteResult<String> {
		Ok("token-fresh".to_string())
	}

	async fn get_node(&self, id: &str) -> RemoteResult<RemoteNode> {
		let nodes = self.nodes.lock().unwrap();
		nodes.get(id).map(FakeRemote::to_node).ok_or_else(not_found)
	}
}

#[async_trait]
impl FilesManager for FakeRemote {
	async fn upload(&self, abs_path: &str, parent_id: &str, name: &str) -> RemoteResult<TransferResult> {
		let content = std::fs::read(abs_path)?;
		let id = self.seed_file(parent_id, name, &content);
		let nodes = self.nodes.lock().unwrap();
		let n = nodes.get(&id).unwrap();
		Ok(TransferResult { id: n.id.clone(), size: n.size, modified_time: n.modified_time.clone(), md5_checksum: n.md5.clone(), mime_type: "text/plain".to_string() })
	}

	async fn update_content(&self, id: &str, abs_path: &str) -> RemoteResult<TransferResult> {
		let content = std::fs::read(abs_path)?;
		let md5 = hash_hex(&content);
		let size = content.len() as u64;
		let mut nodes = self.nodes.lock().unwrap();
		let n = nodes.get_mut(id).ok_or_else(not_found)?;
		n.content = content;
		n.size = size;
		n.md5 = md5;
		n.modified_time = "2024-01-02T00:00:00Z".to_string();
		Ok(TransferResult { id: n.id.clone(), size: n.size, modified_time: n.modified_time.clone(), md5_checksum: n.md5.clone(), mime_type: "text/plain".to_string() })
	}

	async fn download(&self, id: &str, output_path: &str) -> RemoteResult<()> {
		let nodes = self.nodes.lock().unwrap();
		let n = nodes.get(id).ok_or_else(not_found)?;
		std::fs::write(output_path, &n.content)?;
		Ok(())
	}

	async fn move_with_safety(&self, id: &str, new_parent_id: &str, new_name: &str) -> RemoteResult<TransferResult> {
		let mut nodes = self.nodes.lock().unwrap();
		let n = nodes.get_mut(id).ok_or_else(not_found)?;
		n.parent_id = new_parent_id.to_string();
		n.name = new_name.to_string();
		Ok(TransferResult { id: n.id.clone(), size: n.size, modified_time: n.modified_time.clone(), md5_checksum: n.md5.clone(), mime_type: "text/plain".to_string() })
	}

	async fn delete_with_safety(&self, id: &str, _is_permanent: bool) -> RemoteResult<()> {
		self.nodes.lock().unwrap().remove(id);
		Ok(())
	}
}

#[async_trait]
impl FoldersManager for FakeRemote {
	async fn create(&self, name: &str, parent_id: &str) -> RemoteResult<String> {
		let id = self.next_id();
		self.nodes.lock().unwrap().insert(
			id.clone(),
			FakeNode {
				id: id.clone(),
				name: name.to_string(),
				parent_id: parent_id.to_string(),
				is_dir: true,
				size: 0,
				modified_time: String::new(),
				md5: String::new(),
				content: Vec::new(),
			},
		);
		Ok(id)
	}

	async fn delete_with_safety(&self, id: &str, _recursive: bool) -> RemoteResult<()> {
		self.nodes.lock().unwrap().remove(id);
		Ok(())
	}
}

fn cfg(id: &str, local_root: &std::path::Path, direction: &str, policy: &str) -> SyncConfig {
	SyncConfig {
		id: id.to_string(),
		local_root: local_root.display().to_string(),
		remote_root_id: ROOT_ID.to_string(),
		exclude_patterns: Vec::new(),
		conflict_policy: policy.to_string(),
		direction: direction.to_string(),
		last_sync_time: 0,
		last_change_token: String::new(),
	}
}

fn always_confirm(_actions: &[Action]) -> bool {
	true
}

fn never_confirm(_actions: &[Action]) -> bool {
	false
}

/// S1 — push a new local file: expect a single Upload, then after Apply the
/// index carries one row with both facets populated and a non-zero
/// `last_sync_time`.
#[tokio::test]
async fn s1_push_new_file_uploads_and_persists() {
	let local = TempDir::new().unwrap();
	std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

	let remote = FakeRemote::new();
	let index_dir = TempDir::new().unwrap();
	let index = SyncIndex::open(&index_dir.path().join("index.redb")).unwrap();
	let engine = Engine { driver: &remote, files: &remote, folders: &remote, resource_keys: &NoopResourceKeyCache };
	let config = cfg("cfg1", local.path(), "push", "local-wins");

	let plan = engine.plan(&index, &config, Options::default()).await.unwrap();
	assert_eq!(plan.actions, vec![Action::Upload { path: "a.txt".to_string() }]);
	assert!(plan.conflicts.is_empty());

	let summary = engine.apply(&index, &config, &plan, Options::default(), &always_confirm).await.unwrap();
	assert_eq!(summary.uploads, 1);

	let entries = index.list_entries(&config.id).unwrap();
	assert_eq!(entries.len(), 1);
	let entry = &entries[0];
	assert_eq!(entry.relative_path, "a.txt");
	assert!(entry.drive_file_id.is_some());
	assert_eq!(entry.content_hash, hash_hex(b"hello"));

	let updated_cfg = index.get_config(&config.id).unwrap().unwrap();
	assert!(updated_cfg.last_sync_time > 0);

	// Replanning immediately afterwards should be a no-op: local and remote
	// now agree with the persisted previous state.
	let plan2 = engine.plan(&index, &updated_cfg, Options::default()).await.unwrap();
	assert!(plan2.actions.is_empty());
	assert!(plan2.conflicts.is_empty());
}

/// S3 — a remote-side rename (old.txt -> new.txt, same drive file id) with
/// local unchanged: expect rename detection to fuse the Download+DeleteLocal
/// pair into one MoveLocal, and Apply to leave the local tree with only the
/// new name.
#[tokio::test]
async fn s3_remote_rename_fuses_into_move_local() {
	let local = TempDir::new().unwrap();
	let content = b"some content";
	std::fs::write(local.path().join("old.txt"), content).unwrap();
	let mtime = FileTime::from_unix_time(1_700_000_000, 0);
	filetime::set_file_mtime(local.path().join("old.txt"), mtime).unwrap();

	let remote = FakeRemote::new();
	let file_id = remote.seed_file(ROOT_ID, "old.txt", content);
	remote.rename_node(&file_id, "new.txt");

	let index_dir = TempDir::new().unwrap();
	let index = SyncIndex::open(&index_dir.path().join("index.redb")).unwrap();
	let config = cfg("cfg3", local.path(), "bidirectional", "local-wins");
	index.upsert_config(&config).unwrap();
	index
		.replace_entries(
			&config.id,
			&[drivesync::SyncEntry {
				relative_path: "old.txt".to_string(),
				is_dir: false,
				local_mtime: Some(1_700_000_000),
				local_size: Some(content.len() as u64),
				content_hash: hash_hex(content),
				drive_file_id: Some(file_id.clone()),
				drive_parent_id: Some(ROOT_ID.to_string()),
				remote_mtime: Some("2024-01-01T00:00:00Z".to_string()),
				remote_size: Some(content.len() as u64),
				remote_md5: hash_hex(content),
				remote_mime_type: Some("text/plain".to_string()),
			}],
		)
		.unwrap();

	let engine = Engine { driver: &remote, files: &remote, folders: &remote, resource_keys: &NoopResourceKeyCache };
	let opts = Options { include_deletes: true, ..Options::default() };
	let plan = engine.plan(&index, &config, opts).await.unwrap();

	assert_eq!(plan.actions, vec![Action::MoveLocal { from: "old.txt".to_string(), to: "new.txt".to_string() }]);
	assert!(plan.conflicts.is_empty());

	engine.apply(&index, &config, &plan, opts, &always_confirm).await.unwrap();

	assert!(!local.path().join("old.txt").exists());
	assert_eq!(std::fs::read(local.path().join("new.txt")).unwrap(), content);
}

/// S6 — a previously-synced file was deleted on the remote while the local
/// copy is unchanged; pull mode with `include_deletes=true`, `force=false`,
/// and a confirmation helper that declines. Apply must return a
/// cancellation error and leave the index untouched.
#[tokio::test]
async fn s6_destructive_delete_cancellation_leaves_index_untouched() {
	let local = TempDir::new().unwrap();
	// `x` was synced before and is still present locally, unchanged; the
	// remote copy has since been deleted (not seeded into the fake remote).
	let content = b"will be deleted remotely";
	std::fs::write(local.path().join("x"), content).unwrap();
	let mtime = FileTime::from_unix_time(1000, 0);
	filetime::set_file_mtime(local.path().join("x"), mtime).unwrap();

	let remote = FakeRemote::new();

	let index_dir = TempDir::new().unwrap();
	let index = SyncIndex::open(&index_dir.path().join("index.redb")).unwrap();
	let config = cfg("cfg6", local.path(), "pull", "local-wins");
	index.upsert_config(&config).unwrap();
	let prior_entries = vec![drivesync::SyncEntry {
		relative_path: "x".to_string(),
		is_dir: false,
		local_mtime: Some(1000),
		local_size: Some(content.len() as u64),
		content_hash: hash_hex(content),
		drive_file_id: Some("was-f1".to_string()),
		drive_parent_id: Some(ROOT_ID.to_string()),
		remote_mtime: Some("2024-01-01T00:00:00Z".to_string()),
		remote_size: Some(content.len() as u64),
		remote_md5: hash_hex(content),
		remote_mime_type: Some("text/plain".to_string()),
	}];
	index.replace_entries(&config.id, &prior_entries).unwrap();

	let engine = Engine { driver: &remote, files: &remote, folders: &remote, resource_keys: &NoopResourceKeyCache };
	let opts = Options { include_deletes: true, force: false, ..Options::default() };
	let plan = engine.plan(&index, &config, opts).await.unwrap();
	assert_eq!(plan.actions, vec![Action::DeleteLocal { path: "x".to_string() }]);

	let result = engine.apply(&index, &config, &plan, opts, &never_confirm).await;
	assert!(matches!(result, Err(SyncError::Cancelled)));

	let entries_after = index.list_entries(&config.id).unwrap();
	assert_eq!(entries_after, prior_entries);
}

/// S5 — both sides modified a previously synced file under `rename-both`:
/// expect both copies preserved under suffixed names, with the new content
/// uploaded/downloaded to the right side.
#[tokio::test]
async fn s5_both_modified_rename_both_keeps_both_copies() {
	let local = TempDir::new().unwrap();
	std::fs::write(local.path().join("notes.md"), b"local edit").unwrap();
	let mtime = FileTime::from_unix_time(2_000_000_000, 0);
	filetime::set_file_mtime(local.path().join("notes.md"), mtime).unwrap();

	let remote = FakeRemote::new();
	let file_id = remote.seed_file(ROOT_ID, "notes.md", b"remote edit");

	let index_dir = TempDir::new().unwrap();
	let index = SyncIndex::open(&index_dir.path().join("index.redb")).unwrap();
	let config = cfg("cfg5", local.path(), "bidirectional", "rename-both");
	index.upsert_config(&config).unwrap();
	index
		.replace_entries(
			&config.id,
			&[drivesync::SyncEntry {
				relative_path: "notes.md".to_string(),
				is_dir: false,
				local_mtime: Some(1_000_000_000),
				local_size: Some(9),
				content_hash: hash_hex(b"original."),
				drive_file_id: Some(file_id.clone()),
				drive_parent_id: Some(ROOT_ID.to_string()),
				remote_mtime: Some("2023-01-01T00:00:00Z".to_string()),
				remote_size: Some(9),
				remote_md5: hash_hex(b"original."),
				remote_mime_type: Some("text/plain".to_string()),
			}],
		)
		.unwrap();

	let engine = Engine { driver: &remote, files: &remote, folders: &remote, resource_keys: &NoopResourceKeyCache };
	let plan = engine.plan(&index, &config, Options::default()).await.unwrap();

	assert!(plan.actions.contains(&Action::MoveLocal { from: "notes.md".to_string(), to: "notes.local.md".to_string() }));
	assert!(plan.actions.contains(&Action::MoveRemote { from: "notes.md".to_string(), to: "notes.remote.md".to_string() }));
	assert!(plan.actions.contains(&Action::Upload { path: "notes.local.md".to_string() }));
	assert!(plan.actions.contains(&Action::Download { path: "notes.remote.md".to_string() }));
	assert_eq!(plan.actions.len(), 4);
}
