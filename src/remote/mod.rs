//! External collaborator contracts (§6): the engine depends only on these
//! traits, never on a specific remote implementation, following the
//! teacher's `#[async_trait] pub trait SyncProtocol` pattern
//! (`protocol/traits.rs`) of isolating all transport behind one trait.

use async_trait::async_trait;
use std::error::Error;

pub type RemoteResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// One child observed while listing a remote node, or one change observed
/// from the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
	pub id: String,
	pub name: String,
	pub mime_type: String,
	pub size: u64,
	pub modified_time: String,
	pub md5_checksum: String,
	pub parents: Vec<String>,
	pub resource_key: Option<String>,
}

impl RemoteNode {
	/// Directory detection is by a sentinel mime type for container nodes.
	pub const FOLDER_MIME_TYPE: &'static str = "application/vnd.drive.folder";

	pub fn is_dir(&self) -> bool {
		self.mime_type == Self::FOLDER_MIME_TYPE
	}
}

/// A page of children, or of change-feed records.
pub struct Page<T> {
	pub items: Vec<T>,
	pub next_page_token: Option<String>,
}

/// One change-feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
	pub file_id: String,
	pub removed: bool,
	pub file: Option<RemoteNode>,
}

/// Metadata returned by a transfer operation, used to refresh a
/// `RemoteEntry`/`SyncEntry` remote facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
	pub id: String,
	pub size: u64,
	pub modified_time: String,
	pub md5_checksum: String,
	pub mime_type: String,
}

/// Paged listing, change-feed, and id-lookup operations used by the Remote
/// Scanner.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
	/// List immediate children of `parent_id`, one page at a time.
	async fn list_children(&self, parent_id: &str, page_token: Option<&str>) -> RemoteResult<Page<RemoteNode>>;

	/// Page through the change feed starting at `change_token`.
	async fn list_changes(&self, change_token: &str, page_token: Option<&str>) -> RemoteResult<Page<ChangeRecord>>;

	/// The `new_start_page_token` to persist once a change-feed page
	/// sequence has been fully consumed.
	async fn new_start_page_token(&self, change_token: &str) -> RemoteResult<String>;

	/// Fetch a fresh start-page-token, used to anchor the window observed
	/// by the next run after a full-scan fallback (§4.4).
	async fn fresh_start_page_token(&self) -> RemoteResult<String>;

	/// Fetch a single node's identifying fields by id.
	async fn get_node(&self, id: &str) -> RemoteResult<RemoteNode>;
}

/// Files manager collaborator (§6).
#[async_trait]
pub trait FilesManager: Send + Sync {
	async fn upload(&self, abs_path: &str, parent_id: &str, name: &str) -> RemoteResult<TransferResult>;
	async fn update_content(&self, id: &str, abs_path: &str) -> RemoteResult<TransferResult>;
	async fn download(&self, id: &str, output_path: &str) -> RemoteResult<()>;
	async fn move_with_safety(&self, id: &str, new_parent_id: &str, new_name: &str) -> RemoteResult<TransferResult>;
	async fn delete_with_safety(&self, id: &str, is_permanent: bool) -> RemoteResult<()>;
}

/// Folders manager collaborator (§6).
#[async_trait]
pub trait FoldersManager: Send + Sync {
	async fn create(&self, name: &str, parent_id: &str) -> RemoteResult<String>;
	async fn delete_with_safety(&self, id: &str, recursive: bool) -> RemoteResult<()>;
}

/// Resource-key cache collaborator (§6): scanners opportunistically feed it
/// whenever a key is observed; it has its own internal reader-writer lock.
pub trait ResourceKeyCache: Send + Sync {
	fn update_from_api_response(&self, file_id: &str, resource_key: &str);
	fn get(&self, file_id: &str) -> Option<String>;
}

/// A no-op resource-key cache, for callers that don't need one.
#[derive(Default)]
pub struct NoopResourceKeyCache;

impl ResourceKeyCache for NoopResourceKeyCache {
	fn update_from_api_response(&self, _file_id: &str, _resource_key: &str) {}
	fn get(&self, _file_id: &str) -> Option<String> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn folder_mime_type_is_recognized_as_dir() {
		let node = RemoteNode {
			id: "1".to_string(),
			name: "dir".to_string(),
			mime_type: RemoteNode::FOLDER_MIME_TYPE.to_string(),
			size: 0,
			modified_time: String::new(),
			md5_checksum: String::new(),
			parents: vec![],
			resource_key: None,
		};
		assert!(node.is_dir());
	}

	#[test]
	fn noop_resource_key_cache_always_returns_none() {
		let cache = NoopResourceKeyCache::default();
		cache.update_from_api_response("f1", "key");
		assert_eq!(cache.get("f1"), None);
	}
}

// vim: ts=4
