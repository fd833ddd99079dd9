//! Local Scanner (§4.3): depth-first walk of the local root, hash reuse via
//! the sync index, BLAKE3 hashing on cache miss.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::SyncError;
use crate::exclude::ExcludeMatcher;
use crate::types::{LocalEntry, SyncEntry};
use crate::util::hash_hex;

/// Walk `root`, reporting one `LocalEntry` per non-excluded path.
///
/// Symbolic links are not followed: a symlinked directory short-circuits
/// the descent (it is skipped, not recursed into) and a symlinked file is
/// skipped entirely. `prev` supplies the previously indexed entries for
/// this config, used to decide whether a file's content hash can be
/// reused (§4.3: reuse only when `(local_size, local_mtime)` match the
/// stored values exactly).
pub fn scan_local(
	root: &Path,
	exclude: &ExcludeMatcher,
	prev: &BTreeMap<String, SyncEntry>,
) -> Result<BTreeMap<String, LocalEntry>, SyncError> {
	let mut out = BTreeMap::new();
	walk(root, root, exclude, prev, &mut out)?;
	Ok(out)
}

fn walk(
	root: &Path,
	dir: &Path,
	exclude: &ExcludeMatcher,
	prev: &BTreeMap<String, SyncEntry>,
	out: &mut BTreeMap<String, LocalEntry>,
) -> Result<(), SyncError> {
	let read_dir = fs::read_dir(dir).map_err(|e| SyncError::Scan {
		path: Some(dir.display().to_string()),
		source: Box::new(e),
	})?;

	for entry in read_dir {
		let entry = entry.map_err(|e| SyncError::Scan { path: None, source: Box::new(e) })?;
		let path = entry.path();
		let relative = crate::util::normalize_relative(
			path.strip_prefix(root).unwrap_or(&path),
		);

		let file_type = entry.file_type().map_err(|e| SyncError::Scan {
			path: Some(relative.clone()),
			source: Box::new(e),
		})?;

		if file_type.is_symlink() {
			continue;
		}

		let is_dir = file_type.is_dir();
		if exclude.is_excluded(&relative, is_dir) {
			continue;
		}

		let metadata = entry.metadata().map_err(|e| SyncError::Scan {
			path: Some(relative.clone()),
			source: Box::new(e),
		})?;
		let mtime = mtime_epoch_seconds(&metadata);

		if is_dir {
			out.insert(
				relative.clone(),
				LocalEntry {
					relative_path: relative,
					absolute_path: path.display().to_string(),
					is_dir: true,
					size: 0,
					mtime,
					hash: String::new(),
				},
			);
			walk(root, &path, exclude, prev, out)?;
			continue;
		}

		let size = metadata.len();
		let hash = match prev.get(&relative) {
			Some(p) if p.local_size == Some(size) && p.local_mtime == Some(mtime) && !p.content_hash.is_empty() => {
				p.content_hash.clone()
			}
			_ => {
				let contents = fs::read(&path).map_err(|e| SyncError::Scan {
					path: Some(relative.clone()),
					source: Box::new(e),
				})?;
				hash_hex(&contents)
			}
		};

		out.insert(
			relative.clone(),
			LocalEntry { relative_path: relative, absolute_path: path.display().to_string(), is_dir: false, size, mtime, hash },
		);
	}

	Ok(())
}

fn mtime_epoch_seconds(metadata: &fs::Metadata) -> i64 {
	metadata
		.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::TempDir;

	#[test]
	fn scans_files_and_directories() {
		let tmp = TempDir::new().unwrap();
		std::fs::create_dir(tmp.path().join("sub")).unwrap();
		let mut f = std::fs::File::create(tmp.path().join("sub/a.txt")).unwrap();
		f.write_all(b"hello").unwrap();
		drop(f);

		let exclude = ExcludeMatcher::new(&[]);
		let result = scan_local(tmp.path(), &exclude, &BTreeMap::new()).unwrap();

		assert!(result.get("sub").unwrap().is_dir);
		let file = result.get("sub/a.txt").unwrap();
		assert!(!file.is_dir);
		assert_eq!(file.size, 5);
		assert_eq!(file.hash.len(), 64);
	}

	#[test]
	fn excluded_paths_never_appear() {
		let tmp = TempDir::new().unwrap();
		std::fs::create_dir(tmp.path().join("node_modules")).unwrap();
		std::fs::File::create(tmp.path().join("node_modules/pkg.js")).unwrap();
		std::fs::File::create(tmp.path().join("keep.txt")).unwrap();

		let exclude = ExcludeMatcher::new(&[]);
		let result = scan_local(tmp.path(), &exclude, &BTreeMap::new()).unwrap();

		assert!(!result.contains_key("node_modules"));
		assert!(!result.contains_key("node_modules/pkg.js"));
		assert!(result.contains_key("keep.txt"));
	}

	#[test]
	fn reuses_hash_when_size_and_mtime_match_prev() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("a.txt");
		std::fs::write(&path, b"hello").unwrap();
		let mtime = mtime_epoch_seconds(&std::fs::metadata(&path).unwrap());

		let mut prev = BTreeMap::new();
		prev.insert(
			"a.txt".to_string(),
			SyncEntry {
				relative_path: "a.txt".to_string(),
				is_dir: false,
				local_mtime: Some(mtime),
				local_size: Some(5),
				content_hash: "stale-but-reused".to_string(),
				..Default::default()
			},
		);

		let exclude = ExcludeMatcher::new(&[]);
		let result = scan_local(tmp.path(), &exclude, &prev).unwrap();
		assert_eq!(result.get("a.txt").unwrap().hash, "stale-but-reused");
	}

	#[test]
	fn zero_byte_file_has_well_defined_hash() {
		let tmp = TempDir::new().unwrap();
		std::fs::File::create(tmp.path().join("empty.txt")).unwrap();

		let exclude = ExcludeMatcher::new(&[]);
		let result = scan_local(tmp.path(), &exclude, &BTreeMap::new()).unwrap();
		assert_eq!(result.get("empty.txt").unwrap().hash.len(), 64);
	}
}

// vim: ts=4
