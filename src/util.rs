//! Small shared helpers.
#![allow(dead_code)]

/// Hash a buffer with BLAKE3 and return its lowercase hex digest.
///
/// BLAKE3 is fixed for the lifetime of a config: `content_hash`/`remote_md5`
/// reuse (§4.3) is only valid when computed consistently, so this is the one
/// place the algorithm is named.
pub fn hash_hex(buf: &[u8]) -> String {
	hex::encode(blake3::hash(buf).as_bytes())
}

/// Hash a buffer with BLAKE3 and return the raw 32-byte digest.
pub fn hash_binary(buf: &[u8]) -> [u8; 32] {
	*blake3::hash(buf).as_bytes()
}

/// Clean a path into a slash-separated, root-relative string with `.`
/// segments removed, matching the Local Scanner's reporting convention.
pub fn normalize_relative(path: &std::path::Path) -> String {
	let mut parts = Vec::new();
	for component in path.components() {
		match component {
			std::path::Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
			std::path::Component::CurDir => {}
			_ => parts.push(component.as_os_str().to_string_lossy().into_owned()),
		}
	}
	parts.join("/")
}


// vim: ts=4
