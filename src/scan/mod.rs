//! Local and remote tree enumeration (§4.3, §4.4).

pub mod local;
pub mod remote;

pub use local::scan_local;
pub use remote::{scan_remote_full, scan_remote_incremental, RemoteScanOutcome};
