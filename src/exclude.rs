//! Exclude pattern matching: decide whether a relative path is ignored.
//!
//! A pure function of `(pattern list, path, is_dir)` (§8 property 7). Three
//! pattern kinds, per §4.1:
//! - trailing `/` — matches a directory name and every descendant;
//! - containing any of `* ? [ ]` — glob, matched against both the full
//!   relative path and the basename;
//! - literal — matches full path, directory-prefix, or file basename.

use globset::Glob;
use std::path::Path;

/// VCS metadata, OS thumbnail files, temp/log files, common dependency
/// directories, and credential files — applied in addition to whatever
/// patterns the caller supplies.
pub const DEFAULT_EXCLUDES: &[&str] = &[
	".git/",
	".svn/",
	".hg/",
	".DS_Store",
	"Thumbs.db",
	"desktop.ini",
	"*.tmp",
	"*.swp",
	"*.swo",
	"*~",
	".nfs*",
	"node_modules/",
	"target/",
	".venv/",
	"vendor/",
	".env",
	"*.pem",
	"id_rsa",
];

/// Pure exclude matcher over a fixed pattern list.
pub struct ExcludeMatcher {
	patterns: Vec<String>,
}

impl ExcludeMatcher {
	/// Build a matcher from the caller's patterns plus the built-in
	/// default list.
	pub fn new(patterns: &[String]) -> Self {
		let mut all: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
		all.extend(patterns.iter().cloned());
		ExcludeMatcher { patterns: all }
	}

	/// Whether `path` (slash-separated, root-relative) is excluded.
	pub fn is_excluded(&self, path: &str, is_dir: bool) -> bool {
		is_excluded(&self.patterns, path, is_dir)
	}
}

/// Free-function form of the matcher, for direct use in tests or callers
/// that don't want to build an `ExcludeMatcher`.
pub fn is_excluded(patterns: &[String], path: &str, is_dir: bool) -> bool {
	let basename = path.rsplit('/').next().unwrap_or(path);

	for pattern in patterns {
		if let Some(dir_name) = pattern.strip_suffix('/') {
			if path_has_dir_component(path, dir_name) {
				return true;
			}
			continue;
		}

		if pattern.contains(['*', '?', '[', ']']) {
			if let Ok(glob) = Glob::new(pattern) {
				let matcher = glob.compile_matcher();
				if matcher.is_match(path) || matcher.is_match(basename) {
					return true;
				}
			}
			continue;
		}

		// Literal: full path, directory-prefix, or basename.
		if pattern == path || basename == pattern.as_str() {
			return true;
		}
		if path.starts_with(&format!("{}/", pattern)) {
			return true;
		}
	}

	let _ = is_dir; // kind (a)/(c) apply identically to files and directories
	false
}

/// True if `path` contains `dir_name` as one of its directory components,
/// i.e. `path` is `dir_name`, starts with `dir_name/`, or has `/dir_name/`
/// or a trailing `/dir_name` somewhere in the middle.
fn path_has_dir_component(path: &str, dir_name: &str) -> bool {
	Path::new(path).components().any(|c| c.as_os_str() == dir_name)
}


// vim: ts=4
