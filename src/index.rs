//! Sync Index: an embedded relational store keyed by `(config_id,
//! relative_path)`, generalizing the teacher's single-table `ChildCache`
//! (`cache.rs`) into the `sync_configs` + `sync_entries` schema of §4.2,
//! with secondary lookups by content hash and by drive file id.
//!
//! Concurrency: redb serializes writers itself; this store additionally
//! holds its `Database` behind nothing extra, matching §5's "single
//! connection, single-writer" requirement — callers are expected to drive
//! one `SyncIndex` per config file.

use redb::{MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};
use std::error::Error;
use std::path::Path;

use crate::types::{SyncConfig, SyncEntry};

const CONFIGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_configs");
const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_entries");
const HASH_INDEX: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("entries_by_hash");
const FILE_ID_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entries_by_file_id");

fn entry_key(config_id: &str, relative_path: &str) -> String {
	format!("{}\0{}", config_id, relative_path)
}

fn hash_key(config_id: &str, hash: &str) -> String {
	format!("{}\0{}", config_id, hash)
}

fn file_id_key(config_id: &str, file_id: &str) -> String {
	format!("{}\0{}", config_id, file_id)
}

/// Embedded relational store backing one or more `SyncConfig` profiles.
pub struct SyncIndex {
	db: redb::Database,
}

impl SyncIndex {
	/// Open or create the index file. Parent directory is created with
	/// mode 0700 and the database file with mode 0600 on Unix, matching
	/// §4.2/§5's permission requirements.
	pub fn open(db_path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
		if let Some(parent) = db_path.parent() {
			std::fs::create_dir_all(parent)?;
			set_dir_mode(parent, 0o700)?;
		}

		let db = redb::Database::create(db_path)?;
		{
			let write_txn = db.begin_write()?;
			let _ = write_txn.open_table(CONFIGS_TABLE)?;
			let _ = write_txn.open_table(ENTRIES_TABLE)?;
			let _ = write_txn.open_multimap_table(HASH_INDEX)?;
			let _ = write_txn.open_table(FILE_ID_INDEX)?;
			write_txn.commit()?;
		}
		set_file_mode(db_path, 0o600)?;

		Ok(SyncIndex { db })
	}

	pub fn upsert_config(&self, cfg: &SyncConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
		let bytes = bincode::serialize(cfg)?;
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(CONFIGS_TABLE)?;
			table.insert(cfg.id.as_str(), bytes.as_slice())?;
		}
		write_txn.commit()?;
		Ok(())
	}

	pub fn get_config(&self, id: &str) -> Result<Option<SyncConfig>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(CONFIGS_TABLE)?;
		match table.get(id)? {
			Some(v) => Ok(Some(bincode::deserialize(&v.value().to_vec())?)),
			None => Ok(None),
		}
	}

	pub fn list_configs(&self) -> Result<Vec<SyncConfig>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(CONFIGS_TABLE)?;
		let mut out = Vec::new();
		for row in table.iter()? {
			let (_, v) = row?;
			out.push(bincode::deserialize(&v.value().to_vec())?);
		}
		Ok(out)
	}

	pub fn config_exists(&self, id: &str) -> Result<bool, Box<dyn Error + Send + Sync>> {
		Ok(self.get_config(id)?.is_some())
	}

	pub fn delete_config(&self, id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
		self.delete_entries(id)?;
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(CONFIGS_TABLE)?;
			table.remove(id)?;
		}
		write_txn.commit()?;
		Ok(())
	}

	pub fn list_entries(&self, config_id: &str) -> Result<Vec<SyncEntry>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(ENTRIES_TABLE)?;
		let prefix = format!("{}\0", config_id);
		let mut out = Vec::new();
		for row in table.iter()? {
			let (k, v) = row?;
			if k.value().starts_with(&prefix) {
				out.push(bincode::deserialize(&v.value().to_vec())?);
			}
		}
		Ok(out)
	}

	pub fn get_entry_by_path(
		&self,
		config_id: &str,
		relative_path: &str,
	) -> Result<Option<SyncEntry>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(ENTRIES_TABLE)?;
		let key = entry_key(config_id, relative_path);
		match table.get(key.as_str())? {
			Some(v) => Ok(Some(bincode::deserialize(&v.value().to_vec())?)),
			None => Ok(None),
		}
	}

	pub fn get_entry_by_file_id(
		&self,
		config_id: &str,
		file_id: &str,
	) -> Result<Option<SyncEntry>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let idx = read_txn.open_table(FILE_ID_INDEX)?;
		let key = file_id_key(config_id, file_id);
		let relative_path = match idx.get(key.as_str())? {
			Some(v) => v.value().to_string(),
			None => return Ok(None),
		};
		drop(idx);
		self.get_entry_by_path_in_txn(&read_txn, config_id, &relative_path)
	}

	pub fn list_entries_by_hash(
		&self,
		config_id: &str,
		hash: &str,
	) -> Result<Vec<SyncEntry>, Box<dyn Error + Send + Sync>> {
		let read_txn = self.db.begin_read()?;
		let idx = read_txn.open_multimap_table(HASH_INDEX)?;
		let key = hash_key(config_id, hash);
		let mut paths = Vec::new();
		for v in idx.get(key.as_str())? {
			paths.push(v?.value().to_string());
		}
		drop(idx);
		let mut out = Vec::new();
		for path in paths {
			if let Some(entry) = self.get_entry_by_path_in_txn(&read_txn, config_id, &path)? {
				out.push(entry);
			}
		}
		Ok(out)
	}

	fn get_entry_by_path_in_txn(
		&self,
		read_txn: &redb::ReadTransaction,
		config_id: &str,
		relative_path: &str,
	) -> Result<Option<SyncEntry>, Box<dyn Error + Send + Sync>> {
		let table = read_txn.open_table(ENTRIES_TABLE)?;
		let key = entry_key(config_id, relative_path);
		match table.get(key.as_str())? {
			Some(v) => Ok(Some(bincode::deserialize(&v.value().to_vec())?)),
			None => Ok(None),
		}
	}

	/// Single transaction: delete all rows for `config_id` and insert the
	/// new set. Used at the end of Apply so the index reflects reality; a
	/// write that cannot commit leaves the prior state intact (§4.2).
	pub fn replace_entries(
		&self,
		config_id: &str,
		entries: &[SyncEntry],
	) -> Result<(), Box<dyn Error + Send + Sync>> {
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(ENTRIES_TABLE)?;
			let mut hash_idx = write_txn.open_multimap_table(HASH_INDEX)?;
			let mut id_idx = write_txn.open_table(FILE_ID_INDEX)?;

			let prefix = format!("{}\0", config_id);
			let stale: Vec<String> = table
				.iter()?
				.filter_map(|row| {
					let (k, _) = row.ok()?;
					let k = k.value().to_string();
					if k.starts_with(&prefix) {
						Some(k)
					} else {
						None
					}
				})
				.collect();
			for key in &stale {
				if let Some(v) = table.get(key.as_str())? {
					let old: SyncEntry = bincode::deserialize(&v.value().to_vec())?;
					drop(v);
					if !old.content_hash.is_empty() {
						hash_idx.remove(hash_key(config_id, &old.content_hash).as_str(), old.relative_path.as_str())?;
					}
					if let Some(file_id) = &old.drive_file_id {
						id_idx.remove(file_id_key(config_id, file_id).as_str())?;
					}
				}
				table.remove(key.as_str())?;
			}

			for entry in entries {
				let key = entry_key(config_id, &entry.relative_path);
				let bytes = bincode::serialize(entry)?;
				table.insert(key.as_str(), bytes.as_slice())?;
				if !entry.content_hash.is_empty() {
					hash_idx.insert(
						hash_key(config_id, &entry.content_hash).as_str(),
						entry.relative_path.as_str(),
					)?;
				}
				if let Some(file_id) = &entry.drive_file_id {
					id_idx.insert(file_id_key(config_id, file_id).as_str(), entry.relative_path.as_str())?;
				}
			}
		}
		write_txn.commit()?;
		Ok(())
	}

	pub fn delete_entries(&self, config_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
		self.replace_entries(config_id, &[])
	}
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, mode: u32) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
	Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn sample_config(id: &str) -> SyncConfig {
		SyncConfig {
			id: id.to_string(),
			local_root: "/tmp/root".to_string(),
			remote_root_id: "root-id".to_string(),
			exclude_patterns: vec![],
			conflict_policy: "local-wins".to_string(),
			direction: "bidirectional".to_string(),
			last_sync_time: 0,
			last_change_token: String::new(),
		}
	}

	fn sample_entry(path: &str, hash: &str, file_id: Option<&str>) -> SyncEntry {
		SyncEntry {
			relative_path: path.to_string(),
			is_dir: false,
			local_mtime: Some(1000),
			local_size: Some(12),
			content_hash: hash.to_string(),
			drive_file_id: file_id.map(|s| s.to_string()),
			drive_parent_id: None,
			remote_mtime: None,
			remote_size: None,
			remote_md5: String::new(),
			remote_mime_type: None,
		}
	}

	#[test]
	fn upsert_and_get_config_round_trips() {
		let tmp = TempDir::new().unwrap();
		let index = SyncIndex::open(&tmp.path().join("sync.db")).unwrap();
		let cfg = sample_config("c1");
		index.upsert_config(&cfg).unwrap();
		assert_eq!(index.get_config("c1").unwrap(), Some(cfg));
		assert!(index.config_exists("c1").unwrap());
		assert!(!index.config_exists("c2").unwrap());
	}

	#[test]
	fn replace_entries_is_transactional_and_queryable() {
		let tmp = TempDir::new().unwrap();
		let index = SyncIndex::open(&tmp.path().join("sync.db")).unwrap();
		let entries = vec![
			sample_entry("a.txt", "HASH1", Some("F1")),
			sample_entry("b.txt", "HASH2", Some("F2")),
		];
		index.replace_entries("c1", &entries).unwrap();

		let listed = index.list_entries("c1").unwrap();
		assert_eq!(listed.len(), 2);

		let by_path = index.get_entry_by_path("c1", "a.txt").unwrap().unwrap();
		assert_eq!(by_path.content_hash, "HASH1");

		let by_file_id = index.get_entry_by_file_id("c1", "F2").unwrap().unwrap();
		assert_eq!(by_file_id.relative_path, "b.txt");

		let by_hash = index.list_entries_by_hash("c1", "HASH1").unwrap();
		assert_eq!(by_hash.len(), 1);
		assert_eq!(by_hash[0].relative_path, "a.txt");
	}

	#[test]
	fn replace_entries_drops_stale_rows_and_index_entries() {
		let tmp = TempDir::new().unwrap();
		let index = SyncIndex::open(&tmp.path().join("sync.db")).unwrap();
		index.replace_entries("c1", &[sample_entry("a.txt", "HASH1", Some("F1"))]).unwrap();
		index.replace_entries("c1", &[sample_entry("b.txt", "HASH2", Some("F2"))]).unwrap();

		assert_eq!(index.get_entry_by_path("c1", "a.txt").unwrap(), None);
		assert_eq!(index.get_entry_by_file_id("c1", "F1").unwrap(), None);
		assert!(index.list_entries_by_hash("c1", "HASH1").unwrap().is_empty());
		assert_eq!(index.list_entries("c1").unwrap().len(), 1);
	}

	#[test]
	fn entries_are_scoped_per_config() {
		let tmp = TempDir::new().unwrap();
		let index = SyncIndex::open(&tmp.path().join("sync.db")).unwrap();
		index.replace_entries("c1", &[sample_entry("a.txt", "H", None)]).unwrap();
		index.replace_entries("c2", &[sample_entry("a.txt", "H", None)]).unwrap();

		assert_eq!(index.list_entries("c1").unwrap().len(), 1);
		assert_eq!(index.list_entries("c2").unwrap().len(), 1);

		index.delete_entries("c1").unwrap();
		assert!(index.list_entries("c1").unwrap().is_empty());
		assert_eq!(index.list_entries("c2").unwrap().len(), 1);
	}
}

// vim: ts=4
