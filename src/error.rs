//! Error types for drivesync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for sync operations
///
/// Unifies the abstract error kinds of the engine: validation, scanning,
/// transfer, cancellation, and index persistence. `ConflictUnresolved` is
/// deliberately not a variant here — unresolved conflicts are returned as
/// part of a `Plan`, not as an error.
#[derive(Debug)]
pub enum SyncError {
	/// Empty or otherwise invalid required config fields.
	Validation { message: String },

	/// Local filesystem I/O, or remote listing/change-feed failure.
	Scan { path: Option<String>, source: Box<dyn Error + Send + Sync> },

	/// The remote change token is no longer usable and the fallback full
	/// scan itself failed (the common case, a usable fallback, never
	/// surfaces this — it is handled internally by the remote scanner).
	ChangeFeedStale { message: String },

	/// Upload/update/download failure returned by the files manager.
	Transfer { path: String, source: Box<dyn Error + Send + Sync> },

	/// A destructive batch was declined by the confirmation helper.
	Cancelled,

	/// Persistence of the new index failed; the prior index state remains
	/// authoritative and the run is reported as failed.
	IndexWrite { source: Box<dyn Error + Send + Sync> },

	/// I/O error not otherwise classified above.
	Io(io::Error),

	/// Generic error message, for conditions with no dedicated variant.
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Validation { message } => write!(f, "invalid configuration: {}", message),
			SyncError::Scan { path: Some(path), source } => {
				write!(f, "scan failed at {}: {}", path, source)
			}
			SyncError::Scan { path: None, source } => write!(f, "scan failed: {}", source),
			SyncError::ChangeFeedStale { message } => {
				write!(f, "change feed stale and fallback scan failed: {}", message)
			}
			SyncError::Transfer { path, source } => {
				write!(f, "transfer failed for {}: {}", path, source)
			}
			SyncError::Cancelled => write!(f, "operation cancelled by user"),
			SyncError::IndexWrite { source } => write!(f, "failed to persist sync index: {}", source),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(message: String) -> Self {
		SyncError::Other { message }
	}
}

/// Helper to reduce `Box::new(e) as Box<dyn Error + Send + Sync>` boilerplate.
#[inline]
pub fn boxed_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
	Box::new(e)
}

/// Returned by the conflict resolver when the caller-supplied policy string
/// does not name one of the three known policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown conflict policy: {}", self.0)
	}
}

impl Error for UnknownPolicy {}

impl From<UnknownPolicy> for SyncError {
	fn from(e: UnknownPolicy) -> Self {
		SyncError::Validation { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn displays_validation_error() {
		let err = SyncError::Validation { message: "local root is empty".to_string() };
		assert!(err.to_string().contains("local root is empty"));
	}

	#[test]
	fn io_error_converts() {
		let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
		let err: SyncError = io_err.into();
		assert!(matches!(err, SyncError::Io(_)));
	}

	#[test]
	fn unknown_policy_converts_to_validation() {
		let err: SyncError = UnknownPolicy("yolo-wins".to_string()).into();
		assert!(matches!(err, SyncError::Validation { .. }));
	}
}

// vim: ts=4
